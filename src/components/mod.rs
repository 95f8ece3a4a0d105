//! The component contract and the built-in device models.
//!
//! Every device implements [`Component`]. The solver core only ever talks
//! to devices through this trait:
//! - `update` pushes currents into nodes from the voltages at the start of
//!   the step (forward Euler);
//! - the `sn_*` family is used by supernodes for components bound as links;
//! - the remaining hooks are lifecycle callbacks invoked by the simulator.
//!
//! Built-in models:
//! - Linear: Resistor, Capacitor, Inductor
//! - Ideal links: Wire, Ammeter
//! - Sources: VoltageDc, VoltageAc, VoltageSquare, VoltageDcRes, VoltageAcRes, CurrentDc
//! - Output: CsvPrinter

mod config;
mod linear;
mod printer;
mod registry;
mod sources;
mod wire;

pub use config::{ConfigContext, ConfigLog, LogLevel, LogLine};
pub use linear::{Capacitor, Inductor, Resistor};
pub use printer::{CsvPrinter, PrintMode, Sampling};
pub use registry::{Constructor, Registry};
pub use sources::{CurrentDc, VoltageAc, VoltageAcRes, VoltageDc, VoltageDcRes, VoltageSquare};
pub use wire::{Ammeter, Wire};

use std::fmt;

use crate::circuit::{ComponentId, NodeId, Nodes, PrintFrame, PrintableInfo};
use crate::error::Result;
use crate::solver::{SimulatorConfig, SupernodeArena};

const DEFAULT_HELP: &str = "This component help string isn't defined.\n";

/// The capability set every device model implements.
pub trait Component: fmt::Debug {
    /// Instance label, unique within a circuit.
    fn label(&self) -> &str;

    /// Registry name of the model.
    fn model(&self) -> &'static str;

    /// Consume the argument tail, resolving nodes and printables.
    fn configure(&mut self, _ctx: &mut ConfigContext<'_>) {}

    /// Called once per run after nodes are cleared. Ideal devices bind here.
    fn setup(&mut self, _ctx: &mut SetupContext<'_>) {}

    /// Called once per run after every component ran `setup`.
    fn setup_printer(&mut self, _nodes: &Nodes, _printables: &[PrintableInfo]) -> Result<()> {
        Ok(())
    }

    /// Reset per-run simulation state.
    fn clear_variables(&mut self) {}

    /// Push currents into nodes from the voltages at the start of the step.
    fn update(&mut self, nodes: &mut Nodes, time: f64, last_time_step: f64);

    /// Called after time has advanced by `time_step`.
    fn post_update(&mut self, _time: f64, _time_step: f64) {}

    /// Coupling capacitance of a bound pair. Infinite marks an ideal link.
    fn sn_capacitance(&self, _pos: NodeId, _neg: NodeId) -> f64 {
        f64::INFINITY
    }

    /// Voltage an ideal link wants across `pos - neg`.
    fn sn_voltage(&self, _pos: NodeId, _neg: NodeId) -> f64 {
        0.0
    }

    /// Rate of change of [`Component::sn_voltage`].
    fn sn_voltage_derivative(&self, _pos: NodeId, _neg: NodeId) -> f64 {
        0.0
    }

    /// Difference between the imposed and the actual voltage of a pair.
    fn sn_voltage_error(&self, nodes: &Nodes, pos: NodeId, neg: NodeId) -> f64 {
        self.sn_voltage(pos, neg) - nodes.voltage_difference(pos, neg)
    }

    /// Current flowing through the element from `pos` to `neg` this step.
    fn sn_update(&mut self, _pos: NodeId, _neg: NodeId, _current: f64, _time_step: f64) {}

    /// Called at the top of every step with the state before the step.
    fn printer(
        &mut self,
        _frame: &PrintFrame<'_>,
        _time: f64,
        _time_step: f64,
        _iteration: u64,
    ) -> Result<()> {
        Ok(())
    }

    /// The run continues only while at least one component returns true.
    fn keep_simulation_alive(&self, _time: f64) -> bool {
        false
    }

    /// The loop sleeps while any component returns true.
    fn pause_simulation(&self, _time: f64) -> bool {
        false
    }

    /// Upper bound on the next step; 0 means no opinion.
    fn time_step_max(&self, _time: f64) -> f64 {
        0.0
    }

    /// Called once after the loop exits.
    fn simulation_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Value of a printable slot registered in `configure`.
    fn printable(&self, _slot: usize) -> f64 {
        0.0
    }

    fn help(&self) -> &'static str {
        DEFAULT_HELP
    }
}

/// Context passed to [`Component::setup`].
pub struct SetupContext<'a> {
    pub nodes: &'a mut Nodes,
    pub supernodes: &'a mut SupernodeArena,
    pub owner: ComponentId,
    pub config: &'a SimulatorConfig,
}

impl<'a> SetupContext<'a> {
    /// Register `(owner, pos, neg)` as a supernode link, creating or merging clusters.
    pub fn bind(&mut self, pos: NodeId, neg: NodeId) {
        self.supernodes.bind(self.nodes, pos, neg, self.owner);
    }
}

/// The two terminals of a two-node device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminals {
    pub positive: NodeId,
    pub negative: NodeId,
}

impl Terminals {
    pub fn new(positive: NodeId, negative: NodeId) -> Self {
        Self { positive, negative }
    }

    /// `+1.0` for `(positive, negative)`, `-1.0` for the reversed pair.
    ///
    /// # Panics
    ///
    /// Panics for any other pair: a supernode asked about a link this
    /// component never bound.
    pub fn orientation(&self, label: &str, pos: NodeId, neg: NodeId) -> f64 {
        if pos == self.positive && neg == self.negative {
            1.0
        } else if pos == self.negative && neg == self.positive {
            -1.0
        } else {
            panic!(
                "component '{}' queried for unbound pair ({}, {}), bound to ({}, {})",
                label, pos, neg, self.positive, self.negative
            );
        }
    }

    pub fn voltage(&self, nodes: &Nodes) -> f64 {
        nodes.voltage_difference(self.positive, self.negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation() {
        let t = Terminals::new(NodeId(1), NodeId(2));
        assert_eq!(t.orientation("X", NodeId(1), NodeId(2)), 1.0);
        assert_eq!(t.orientation("X", NodeId(2), NodeId(1)), -1.0);
    }

    #[test]
    #[should_panic(expected = "unbound pair")]
    fn test_orientation_rejects_foreign_pair() {
        let t = Terminals::new(NodeId(1), NodeId(2));
        t.orientation("X", NodeId(1), NodeId(3));
    }
}

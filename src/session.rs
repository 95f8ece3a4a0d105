//! Executes netlist commands against a circuit.

use log::{error, info};

use crate::circuit::Circuit;
use crate::components::Registry;
use crate::dsl::{self, Command, CommandKind, Netlist, NodeEdit, SimParam};
use crate::error::Result;
use crate::solver::{RunSummary, Simulator, SimulatorConfig};

/// A circuit under construction plus the parameters its runs will use.
///
/// Each `run` command borrows the circuit for a fresh [`Simulator`], so a
/// script may edit the circuit and run it again.
#[derive(Debug)]
pub struct Session<'r> {
    registry: &'r Registry,
    circuit: Circuit,
    config: SimulatorConfig,
    runs: Vec<RunSummary>,
}

impl<'r> Session<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, SimulatorConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: SimulatorConfig) -> Self {
        Self {
            registry,
            circuit: Circuit::new(),
            config,
            runs: Vec::new(),
        }
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Summaries of the runs performed so far.
    pub fn runs(&self) -> &[RunSummary] {
        &self.runs
    }

    /// Parse and execute a netlist script.
    pub fn execute_str(&mut self, input: &str) -> Result<()> {
        let netlist = dsl::parse(input)?;
        self.execute(&netlist)
    }

    /// Execute every command in order, stopping at the first failure.
    pub fn execute(&mut self, netlist: &Netlist) -> Result<()> {
        for command in &netlist.commands {
            self.execute_command(command).inspect_err(|e| {
                error!("line {}: {}", command.line, e);
            })?;
        }
        Ok(())
    }

    pub fn execute_command(&mut self, command: &Command) -> Result<()> {
        match &command.kind {
            CommandKind::Node { label, capacitance } => {
                self.circuit.add_node(label, *capacitance)?;
            }
            CommandKind::Component { label, model, args } => {
                self.circuit
                    .add_component_from_model(self.registry, label, model, args)?;
            }
            CommandKind::EditNode { label, edit } => match *edit {
                NodeEdit::Ground(value) => self.circuit.set_ground(label, value)?,
                NodeEdit::Hidden(value) => self.circuit.set_hidden(label, value)?,
                NodeEdit::Capacitance(value) => self.circuit.set_capacitance(label, value)?,
                NodeEdit::VoltageDifferenceMax(value) => {
                    self.circuit.set_voltage_difference_max(label, value)?
                }
            },
            CommandKind::Param { param, value } => {
                let config = self.config.clone();
                let config = match param {
                    SimParam::VoltageDifferenceMax => config.with_voltage_difference_max(*value),
                    SimParam::TimeStepMax => config.with_time_step_max(*value),
                    SimParam::Duration => config.with_duration(*value),
                };
                config.validate()?;
                self.config = config;
            }
            CommandKind::PrintVar { name, active } => {
                self.circuit.set_printable_active(name, *active)?;
            }
            CommandKind::Run => {
                self.run()?;
            }
        }
        Ok(())
    }

    /// Simulate the circuit as it stands with the current parameters.
    pub fn run(&mut self) -> Result<RunSummary> {
        info!("run {} starting", self.runs.len() + 1);
        let mut simulator = Simulator::with_config(&mut self.circuit, self.config.clone());
        let summary = simulator.simulate()?;
        self.runs.push(summary);
        Ok(summary)
    }
}

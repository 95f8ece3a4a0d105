//! Zero-volt ideal links: Wire and Ammeter.

use crate::circuit::{NodeId, Nodes};

use super::linear::configure_terminals;
use super::{Component, ConfigContext, SetupContext, Terminals};

const WIRE_HELP: &str = "wire

| argument | type   |
|----------|--------|
| node +   | string |
| node -   | string |

printables:
- i: current [A], positive when flowing from node + to node -
";

const AMMETER_HELP: &str = "ammeter

| argument | type   |
|----------|--------|
| node +   | string |
| node -   | string |

printables:
- i: current [A], positive when flowing from node + to node -
- q: charge that went through since the start of the run [C]
";

/// An ideal wire shorting two nodes.
#[derive(Debug, Clone)]
pub struct Wire {
    label: String,
    pub terminals: Terminals,
    current: f64,
}

impl Wire {
    pub fn new(label: impl Into<String>, positive: NodeId, negative: NodeId) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for Wire {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "wire"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        ctx.add_printable("i", "A", 0);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
    }

    fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, _time_step: f64) {
        self.current = self.terminals.orientation(&self.label, pos, neg) * current;
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        WIRE_HELP
    }
}

/// A wire that also accumulates the charge it carried.
#[derive(Debug, Clone)]
pub struct Ammeter {
    label: String,
    pub terminals: Terminals,
    current: f64,
    charge: f64,
}

impl Ammeter {
    const CURRENT: usize = 0;
    const CHARGE: usize = 1;

    pub fn new(label: impl Into<String>, positive: NodeId, negative: NodeId) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            current: 0.0,
            charge: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative)
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }
}

impl Component for Ammeter {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "ammeter"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        ctx.add_printable("i", "A", Self::CURRENT);
        ctx.add_printable("q", "C", Self::CHARGE);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
        self.charge = 0.0;
    }

    fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, time_step: f64) {
        self.current = self.terminals.orientation(&self.label, pos, neg) * current;
        self.charge += self.current * time_step;
    }

    fn printable(&self, slot: usize) -> f64 {
        match slot {
            Self::CHARGE => self.charge,
            _ => self.current,
        }
    }

    fn help(&self) -> &'static str {
        AMMETER_HELP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, Node};
    use crate::components::CurrentDc;
    use crate::solver::{Simulator, SimulatorConfig};
    use approx::assert_relative_eq;

    #[test]
    fn test_wire_is_ideal_zero_volt() {
        let w = Wire::new("W1", NodeId(0), NodeId(1));
        assert_eq!(w.sn_capacitance(NodeId(0), NodeId(1)), f64::INFINITY);
        assert_eq!(w.sn_voltage(NodeId(1), NodeId(0)), 0.0);

        let mut nodes = Nodes::new();
        nodes.push(Node::new("a", 1e-9));
        nodes.push(Node::new("b", 1e-9));
        nodes[NodeId(0)].increment_voltage(1.0);
        assert_eq!(w.sn_voltage_error(&nodes, NodeId(0), NodeId(1)), -1.0);
    }

    #[test]
    fn test_ammeter_measures_source_current() {
        let mut circuit = Circuit::new();
        let gnd = circuit.add_ground("gnd", 1e-9).unwrap();
        let a = circuit.add_node("a", 1e-9).unwrap();
        circuit
            .add_component(Box::new(CurrentDc::new("I1", gnd, a, 2e-3)))
            .unwrap();
        circuit
            .add_component(Box::new(Ammeter::new("A1", a, gnd)))
            .unwrap();
        let config = SimulatorConfig::new().with_duration(1e-6);
        let mut sim = Simulator::with_config(&mut circuit, config);
        sim.add_component(Box::new(KeepAlive)).unwrap();
        sim.simulate().unwrap();

        let id = circuit.find_component("A1").unwrap();
        let current = circuit.component(id).printable(Ammeter::CURRENT);
        let charge = circuit.component(id).printable(Ammeter::CHARGE);
        assert_relative_eq!(current, 2e-3, max_relative = 1e-6);
        assert_relative_eq!(charge, 2e-3 * 1e-6, max_relative = 0.15);
        assert_relative_eq!(circuit.voltage("a").unwrap(), 0.0, epsilon = 1e-9);
    }

    #[derive(Debug)]
    struct KeepAlive;

    impl Component for KeepAlive {
        fn label(&self) -> &str {
            "keepalive"
        }

        fn model(&self) -> &'static str {
            "keepalive"
        }

        fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

        fn keep_simulation_alive(&self, _time: f64) -> bool {
            true
        }
    }
}

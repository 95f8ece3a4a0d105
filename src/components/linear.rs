//! Linear passive components: Resistor, Capacitor, Inductor.

use crate::circuit::{NodeId, Nodes};

use super::{Component, ConfigContext, SetupContext, Terminals};

const RESISTOR_HELP: &str = "resistor

| argument   | type   |
|------------|--------|
| node +     | string |
| node -     | string |
| resistance | double |

printables:
- i: current [A], positive when flowing from node + to node -
";

const CAPACITOR_HELP: &str = "capacitor

| argument    | type   |
|-------------|--------|
| node +      | string |
| node -      | string |
| capacitance | double |

The capacitor is bound into a supernode as an ordinary link, so its
coupling is solved together with the node capacitances.

printables:
- i: current [A], positive when flowing from node + to node -
";

const INDUCTOR_HELP: &str = "inductor

| argument   | type   |
|------------|--------|
| node +     | string |
| node -     | string |
| inductance | double |
| resistance | double |

printables:
- i: current [A], positive when flowing from node + to node -
";

impl Terminals {
    /// Placeholder used before a model is configured.
    pub(crate) const UNSET: Terminals = Terminals {
        positive: NodeId(usize::MAX),
        negative: NodeId(usize::MAX),
    };
}

/// Resolve both terminals from the argument tail.
pub(crate) fn configure_terminals(ctx: &mut ConfigContext<'_>) -> Option<Terminals> {
    let positive = ctx.find_node();
    let negative = ctx.find_node();
    Some(Terminals::new(positive?, negative?))
}

/// A resistor: `i = (v+ - v-) / R`.
#[derive(Debug, Clone)]
pub struct Resistor {
    label: String,
    pub terminals: Terminals,
    pub resistance: f64,
    current: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(label: impl Into<String>, positive: NodeId, negative: NodeId, resistance: f64) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            resistance,
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 1e3)
    }

    /// Current computed in the last update.
    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for Resistor {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "resistor"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        if let Some(r) = ctx.required_value("resistance") {
            if r <= 0.0 {
                ctx.error("resistance must be greater than 0");
            }
            self.resistance = r;
        }
        ctx.add_printable("i", "A", 0);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
    }

    fn update(&mut self, nodes: &mut Nodes, _time: f64, _last_time_step: f64) {
        self.current = self.terminals.voltage(nodes) / self.resistance;
        nodes.transfer(self.terminals.positive, self.terminals.negative, self.current);
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        RESISTOR_HELP
    }
}

/// A capacitor bound as an ordinary supernode link.
///
/// The node capacitances are left untouched: the coupling stencil in the
/// supernode system is the capacitor's whole contribution, and the charge
/// it tracks is the integral of the current the supernode reports.
#[derive(Debug, Clone)]
pub struct Capacitor {
    label: String,
    pub terminals: Terminals,
    pub capacitance: f64,
    charge: f64,
    current: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(label: impl Into<String>, positive: NodeId, negative: NodeId, capacitance: f64) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            capacitance,
            charge: 0.0,
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 1e-3)
    }

    /// Voltage across the plates from the tracked charge.
    pub fn voltage(&self) -> f64 {
        self.charge / self.capacitance
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for Capacitor {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "capacitor"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.capacitance = ctx.value("capacitance", 1e-3);
        if self.capacitance <= 0.0 || !self.capacitance.is_finite() {
            ctx.error("capacitance must be finite and greater than 0");
        }
        ctx.add_printable("i", "A", 0);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.charge = 0.0;
        self.current = 0.0;
    }

    fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

    fn sn_capacitance(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg);
        self.capacitance
    }

    fn sn_voltage(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage()
    }

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, time_step: f64) {
        let current = self.terminals.orientation(&self.label, pos, neg) * current;
        self.current = current;
        self.charge += current * time_step;
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        CAPACITOR_HELP
    }
}

/// An inductor with optional series resistance.
///
/// The current state is advanced with forward Euler from the voltage seen
/// at the previous step.
#[derive(Debug, Clone)]
pub struct Inductor {
    label: String,
    pub terminals: Terminals,
    pub inductance: f64,
    pub resistance: f64,
    current: f64,
    v_prev: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(
        label: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        inductance: f64,
        resistance: f64,
    ) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            inductance,
            resistance,
            current: 0.0,
            v_prev: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 10e-3, 0.0)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for Inductor {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "inductor"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.inductance = ctx.value("inductance", 10e-3);
        self.resistance = ctx.value("resistance", 0.0);
        if self.inductance <= 0.0 {
            ctx.error("inductance must be greater than 0");
        }
        ctx.add_printable("i", "A", 0);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
        self.v_prev = 0.0;
    }

    fn update(&mut self, nodes: &mut Nodes, _time: f64, last_time_step: f64) {
        // di/dt = (v - i*R) / L
        self.current += (self.v_prev - self.current * self.resistance) * last_time_step / self.inductance;
        self.v_prev = self.terminals.voltage(nodes);
        nodes.transfer(self.terminals.positive, self.terminals.negative, self.current);
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        INDUCTOR_HELP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Node;
    use approx::assert_relative_eq;

    fn two_nodes() -> (Nodes, NodeId, NodeId) {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-6));
        let b = nodes.push(Node::new("b", 1e-6));
        (nodes, a, b)
    }

    #[test]
    fn test_resistor_current_balance() {
        let (mut nodes, a, b) = two_nodes();
        nodes[a].increment_voltage(2.0);

        let mut r = Resistor::new("R1", a, b, 1000.0);
        r.update(&mut nodes, 0.0, 0.0);

        assert_relative_eq!(r.current(), 2e-3);
        assert_relative_eq!(nodes[a].accumulated_current(), -2e-3);
        assert_eq!(
            nodes[a].accumulated_current() + nodes[b].accumulated_current(),
            0.0
        );
    }

    #[test]
    fn test_capacitor_tracks_charge() {
        let (_, a, b) = two_nodes();
        let mut c = Capacitor::new("C1", a, b, 1e-6);
        c.sn_update(a, b, 1e-3, 1e-3);
        assert_relative_eq!(c.voltage(), 1.0);
        assert_relative_eq!(c.sn_voltage(b, a), -1.0);

        c.sn_update(b, a, 1e-3, 1e-3);
        assert_relative_eq!(c.voltage(), 0.0);
        assert_relative_eq!(c.current(), -1e-3);
    }

    #[test]
    fn test_capacitor_is_ordinary_link() {
        let (_, a, b) = two_nodes();
        let c = Capacitor::new("C1", a, b, 4.7e-6);
        assert_eq!(c.sn_capacitance(a, b), 4.7e-6);
        assert!(c.sn_capacitance(b, a).is_finite());
    }

    #[test]
    fn test_inductor_ramps_current() {
        let (mut nodes, a, b) = two_nodes();
        nodes[a].increment_voltage(1.0);
        let mut l = Inductor::new("L1", a, b, 1e-3, 0.0);

        // First update only latches the voltage.
        l.update(&mut nodes, 0.0, 0.0);
        assert_eq!(l.current(), 0.0);

        nodes[a].begin_iteration();
        nodes[b].begin_iteration();
        l.update(&mut nodes, 1e-6, 1e-6);
        assert_relative_eq!(l.current(), 1e-3);
        assert_relative_eq!(nodes[b].accumulated_current(), 1e-3);
    }
}

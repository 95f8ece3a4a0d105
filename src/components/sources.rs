//! Voltage and current sources.
//!
//! The ideal voltage sources bind their terminals into a supernode and
//! impose a voltage (and its derivative) there. The `-res` variants are
//! Thevenin equivalents that only push current and never bind.

use std::f64::consts::PI;

use crate::circuit::{NodeId, Nodes};

use super::linear::configure_terminals;
use super::{Component, ConfigContext, SetupContext, Terminals};

const VOLTAGE_DC_HELP: &str = "voltage-dc

| argument | type   |
|----------|--------|
| node +   | string |
| node -   | string |
| voltage  | double |

printables:
- i: current [A], positive when flowing from node + to node -
  through the source
";

const VOLTAGE_DC_RES_HELP: &str = "voltage-dc-res

| argument   | type   |
|------------|--------|
| node +     | string |
| node -     | string |
| voltage    | double |
| resistance | double |

printables:
- i: current [A], positive when flowing from node + to node -
";

const VOLTAGE_AC_HELP: &str = "voltage-ac

| argument  | type   |
|-----------|--------|
| node +    | string |
| node -    | string |
| amplitude | double |
| frequency | double |
| phase     | double |
| offset    | double |

v(t) = amplitude * sin(2 pi (f t + phase / 360)) + offset

printables:
- i: current [A], positive when flowing from node + to node -
";

const VOLTAGE_AC_RES_HELP: &str = "voltage-ac-res

| argument   | type   |
|------------|--------|
| node +     | string |
| node -     | string |
| amplitude  | double |
| resistance | double |
| frequency  | double |
| phase      | double |
| offset     | double |

printables:
- i: current [A], positive when flowing from node + to node -
";

const VOLTAGE_SQUARE_HELP: &str = "voltage-square

| argument   | type   |
|------------|--------|
| node +     | string |
| node -     | string |
| volt low   | double |
| volt high  | double |
| frequency  | double |
| duty cycle | double |
| sw time %  | double |
| phase      | double |

Trapezoid wave. Each period starts with the falling edge; the edges
take `sw time %` of the period.

printables:
- i: current [A], positive when flowing from node + to node -
";

const CURRENT_DC_HELP: &str = "current-dc

| argument  | type   |
|-----------|--------|
| node from | string |
| node to   | string |
| current   | double |

printables:
- i: current [A], flowing from node from to node to
";

/// `A sin(2π(f t + phase/360)) + offset` and its time derivative.
fn sine(amplitude: f64, frequency: f64, phase: f64, offset: f64, time: f64) -> (f64, f64) {
    let angle = 2.0 * PI * (frequency * time + phase / 360.0);
    (
        amplitude * angle.sin() + offset,
        amplitude * angle.cos() * 2.0 * PI * frequency,
    )
}

/// Ideal DC voltage source.
#[derive(Debug, Clone)]
pub struct VoltageDc {
    label: String,
    pub terminals: Terminals,
    pub voltage: f64,
    current: f64,
}

impl VoltageDc {
    /// Create a new DC source imposing `v(positive) - v(negative) = voltage`.
    pub fn new(label: impl Into<String>, positive: NodeId, negative: NodeId, voltage: f64) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            voltage,
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 0.0)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for VoltageDc {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "voltage-dc"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.voltage = ctx.value("voltage", 0.0);
        ctx.add_printable("i", "A", 0);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
    }

    fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

    fn sn_voltage(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage
    }

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, _time_step: f64) {
        self.current = self.terminals.orientation(&self.label, pos, neg) * current;
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        VOLTAGE_DC_HELP
    }
}

/// DC voltage source with series resistance.
#[derive(Debug, Clone)]
pub struct VoltageDcRes {
    label: String,
    pub terminals: Terminals,
    pub voltage: f64,
    pub resistance: f64,
    current: f64,
}

impl VoltageDcRes {
    pub fn new(
        label: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        voltage: f64,
        resistance: f64,
    ) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            voltage,
            resistance,
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 0.0, 1.0)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for VoltageDcRes {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "voltage-dc-res"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.voltage = ctx.value("voltage", 0.0);
        self.resistance = ctx.value("resistance", 1.0);
        if self.resistance <= 0.0 {
            ctx.error("resistance must be greater than 0");
        }
        ctx.add_printable("i", "A", 0);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
    }

    fn update(&mut self, nodes: &mut Nodes, _time: f64, _last_time_step: f64) {
        self.current = (self.terminals.voltage(nodes) - self.voltage) / self.resistance;
        nodes.transfer(self.terminals.positive, self.terminals.negative, self.current);
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        VOLTAGE_DC_RES_HELP
    }
}

/// Ideal sine voltage source.
#[derive(Debug, Clone)]
pub struct VoltageAc {
    label: String,
    pub terminals: Terminals,
    pub amplitude: f64,
    pub frequency: f64,
    /// Phase in degrees
    pub phase: f64,
    pub offset: f64,
    voltage: f64,
    voltage_derivative: f64,
    current: f64,
}

impl VoltageAc {
    pub fn new(
        label: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        amplitude: f64,
        frequency: f64,
    ) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            amplitude,
            frequency,
            phase: 0.0,
            offset: 0.0,
            voltage: 0.0,
            voltage_derivative: 0.0,
            current: 0.0,
        }
    }

    /// Set the phase (degrees) and DC offset.
    pub fn with_phase_offset(mut self, phase: f64, offset: f64) -> Self {
        self.phase = phase;
        self.offset = offset;
        self
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 1.0, 60.0)
    }

    fn evaluate(&mut self, time: f64) {
        let (v, dv) = sine(self.amplitude, self.frequency, self.phase, self.offset, time);
        self.voltage = v;
        self.voltage_derivative = dv;
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for VoltageAc {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "voltage-ac"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.amplitude = ctx.value("amplitude", 1.0);
        self.frequency = ctx.value("frequency", 60.0);
        self.phase = ctx.value("phase", 0.0);
        self.offset = ctx.value("offset", 0.0);
        ctx.add_printable("i", "A", 0);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
        // the initial correction pass sees the t = 0 value
        self.evaluate(0.0);
    }

    fn update(&mut self, _nodes: &mut Nodes, time: f64, _last_time_step: f64) {
        self.evaluate(time);
    }

    fn sn_voltage(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage
    }

    fn sn_voltage_derivative(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage_derivative
    }

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, _time_step: f64) {
        self.current = self.terminals.orientation(&self.label, pos, neg) * current;
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        VOLTAGE_AC_HELP
    }
}

/// Sine voltage source with series resistance.
#[derive(Debug, Clone)]
pub struct VoltageAcRes {
    label: String,
    pub terminals: Terminals,
    pub amplitude: f64,
    pub resistance: f64,
    pub frequency: f64,
    pub phase: f64,
    pub offset: f64,
    current: f64,
}

impl VoltageAcRes {
    pub fn new(
        label: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        amplitude: f64,
        resistance: f64,
        frequency: f64,
    ) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            amplitude,
            resistance,
            frequency,
            phase: 0.0,
            offset: 0.0,
            current: 0.0,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 5.0, 1.0, 60.0)
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for VoltageAcRes {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "voltage-ac-res"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.amplitude = ctx.value("amplitude", 5.0);
        self.resistance = ctx.value("resistance", 1.0);
        self.frequency = ctx.value("frequency", 60.0);
        self.phase = ctx.value("phase", 0.0);
        self.offset = ctx.value("offset", 0.0);
        if self.resistance <= 0.0 {
            ctx.error("resistance must be greater than 0");
        }
        ctx.add_printable("i", "A", 0);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
    }

    fn update(&mut self, nodes: &mut Nodes, time: f64, _last_time_step: f64) {
        let (source, _) = sine(self.amplitude, self.frequency, self.phase, self.offset, time);
        self.current = (self.terminals.voltage(nodes) - source) / self.resistance;
        nodes.transfer(self.terminals.positive, self.terminals.negative, self.current);
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        VOLTAGE_AC_RES_HELP
    }
}

/// Ideal trapezoid voltage source.
#[derive(Debug, Clone)]
pub struct VoltageSquare {
    label: String,
    pub terminals: Terminals,
    pub voltage_low: f64,
    pub voltage_high: f64,
    pub frequency: f64,
    /// Fraction of the period spent high, in `(0, 1)`
    pub duty: f64,
    /// Fraction of the period taken by one edge
    pub slew: f64,
    /// Phase in degrees
    pub phase: f64,
    voltage: f64,
    voltage_derivative: f64,
    current: f64,
}

impl VoltageSquare {
    pub fn new(
        label: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        voltage_low: f64,
        voltage_high: f64,
        frequency: f64,
    ) -> Self {
        Self {
            label: label.into(),
            terminals: Terminals::new(positive, negative),
            voltage_low,
            voltage_high,
            frequency,
            duty: 0.5,
            slew: 0.01,
            phase: 0.0,
            voltage: 0.0,
            voltage_derivative: 0.0,
            current: 0.0,
        }
    }

    /// Set the duty cycle and edge time, both as fractions of the period.
    pub fn with_shape(mut self, duty: f64, slew: f64) -> Self {
        self.duty = duty;
        self.slew = slew;
        self
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 0.0, 1.0, 60.0)
    }

    fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Position inside the current period, in `[0, 1)`.
    fn cycle_position(&self, time: f64) -> f64 {
        let delay = self.phase / 360.0 / self.frequency;
        ((time + delay) / self.period()).rem_euclid(1.0)
    }

    /// Corners of the wave inside one period, as fractions.
    fn corners(&self) -> [f64; 4] {
        let time_low = 1.0 - self.duty;
        [self.slew, time_low, time_low + self.slew, 1.0]
    }

    fn evaluate(&mut self, time: f64) {
        let cycle = self.cycle_position(time);
        let [high_to_low, time_low, low_to_high, _] = self.corners();
        let slew_rate = (self.voltage_high - self.voltage_low) / (self.slew * self.period());

        let (v, dv) = if cycle < high_to_low {
            let t = cycle / self.slew;
            (self.voltage_high + (self.voltage_low - self.voltage_high) * t, -slew_rate)
        } else if cycle < time_low {
            (self.voltage_low, 0.0)
        } else if cycle < low_to_high {
            let t = (cycle - time_low) / self.slew;
            (self.voltage_low + (self.voltage_high - self.voltage_low) * t, slew_rate)
        } else {
            (self.voltage_high, 0.0)
        };
        self.voltage = v;
        self.voltage_derivative = dv;
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Component for VoltageSquare {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "voltage-square"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.terminals = terminals;
        self.voltage_low = ctx.value("volt low", 0.0);
        self.voltage_high = ctx.value("volt high", 1.0);
        self.frequency = ctx.value("frequency", 60.0);
        self.duty = ctx.value("duty cycle", 50.0) / 100.0;
        self.slew = ctx.value("sw time", 1.0) / 100.0;
        self.phase = ctx.value("phase", 0.0);

        if self.frequency <= 0.0 {
            ctx.error("frequency must be greater than 0");
        }
        if self.duty <= 0.0 || self.duty >= 1.0 {
            ctx.error("duty cycle must be between 0 and 100 %");
        }
        if self.slew <= 0.0 || self.slew > self.duty || self.slew > 1.0 - self.duty {
            ctx.error("sw time must be greater than 0 and fit inside both half periods");
        }
        ctx.add_printable("i", "A", 0);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        ctx.bind(self.terminals.positive, self.terminals.negative);
    }

    fn clear_variables(&mut self) {
        self.current = 0.0;
        self.evaluate(0.0);
    }

    fn update(&mut self, _nodes: &mut Nodes, time: f64, _last_time_step: f64) {
        self.evaluate(time);
    }

    fn sn_voltage(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage
    }

    fn sn_voltage_derivative(&self, pos: NodeId, neg: NodeId) -> f64 {
        self.terminals.orientation(&self.label, pos, neg) * self.voltage_derivative
    }

    fn sn_update(&mut self, pos: NodeId, neg: NodeId, current: f64, _time_step: f64) {
        self.current = self.terminals.orientation(&self.label, pos, neg) * current;
    }

    /// Land a step on the next corner of the wave.
    fn time_step_max(&self, time: f64) -> f64 {
        let cycle = self.cycle_position(time);
        let next = self
            .corners()
            .into_iter()
            .find(|&corner| corner - cycle > 1e-9)
            .unwrap_or(1.0 + self.slew);
        (next - cycle) * self.period()
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        VOLTAGE_SQUARE_HELP
    }
}

/// Ideal DC current source pushing current from one node into another.
#[derive(Debug, Clone)]
pub struct CurrentDc {
    label: String,
    pub from: NodeId,
    pub to: NodeId,
    pub current: f64,
}

impl CurrentDc {
    pub fn new(label: impl Into<String>, from: NodeId, to: NodeId, current: f64) -> Self {
        Self {
            label: label.into(),
            from,
            to,
            current,
        }
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        Self::new(label, Terminals::UNSET.positive, Terminals::UNSET.negative, 0.0)
    }
}

impl Component for CurrentDc {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "current-dc"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        let Some(terminals) = configure_terminals(ctx) else {
            return;
        };
        self.from = terminals.positive;
        self.to = terminals.negative;
        self.current = ctx.value("current", 0.0);
        ctx.add_printable("i", "A", 0);
    }

    fn update(&mut self, nodes: &mut Nodes, _time: f64, _last_time_step: f64) {
        nodes.transfer(self.from, self.to, self.current);
    }

    fn printable(&self, _slot: usize) -> f64 {
        self.current
    }

    fn help(&self) -> &'static str {
        CURRENT_DC_HELP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Node;
    use approx::assert_relative_eq;

    fn pair() -> (Nodes, NodeId, NodeId) {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-9));
        let b = nodes.push(Node::new("b", 1e-9));
        (nodes, a, b)
    }

    #[test]
    fn test_dc_orientation() {
        let (_, a, b) = pair();
        let mut v = VoltageDc::new("V1", a, b, 5.0);
        assert_eq!(v.sn_voltage(a, b), 5.0);
        assert_eq!(v.sn_voltage(b, a), -5.0);
        assert_eq!(v.sn_voltage_derivative(a, b), 0.0);

        v.sn_update(b, a, 2e-3, 1e-9);
        assert_eq!(v.current(), -2e-3);
    }

    #[test]
    fn test_dc_res_current() {
        let (mut nodes, a, b) = pair();
        nodes[a].increment_voltage(3.0);
        let mut v = VoltageDcRes::new("V1", a, b, 5.0, 100.0);
        v.update(&mut nodes, 0.0, 0.0);

        // the source pushes current into its positive node
        assert_relative_eq!(v.current(), -0.02);
        assert_relative_eq!(nodes[a].accumulated_current(), 0.02);
    }

    #[test]
    fn test_ac_waveform() {
        let (mut nodes, a, b) = pair();
        let mut v = VoltageAc::new("V1", a, b, 2.0, 50.0).with_phase_offset(90.0, 1.0);
        v.clear_variables();
        assert_relative_eq!(v.sn_voltage(a, b), 3.0, epsilon = 1e-12);
        assert_relative_eq!(v.sn_voltage_derivative(a, b), 0.0, epsilon = 1e-9);

        // quarter period later: zero crossing, falling
        v.update(&mut nodes, 5e-3, 0.0);
        assert_relative_eq!(v.sn_voltage(a, b), 1.0, epsilon = 1e-9);
        assert_relative_eq!(v.sn_voltage_derivative(a, b), -2.0 * 2.0 * PI * 50.0, max_relative = 1e-9);
    }

    #[test]
    fn test_square_edges() {
        let (mut nodes, a, b) = pair();
        // 1 kHz, 50 % duty, 10 % edges
        let mut v = VoltageSquare::new("V1", a, b, 0.0, 10.0, 1e3).with_shape(0.5, 0.1);

        v.update(&mut nodes, 0.05e-3, 0.0);
        assert_relative_eq!(v.voltage(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(v.sn_voltage_derivative(a, b), -1e5, max_relative = 1e-9);

        v.update(&mut nodes, 0.3e-3, 0.0);
        assert_eq!(v.voltage(), 0.0);
        assert_eq!(v.sn_voltage_derivative(a, b), 0.0);

        v.update(&mut nodes, 0.55e-3, 0.0);
        assert_relative_eq!(v.voltage(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(v.sn_voltage_derivative(a, b), 1e5, max_relative = 1e-9);

        v.update(&mut nodes, 0.8e-3, 0.0);
        assert_eq!(v.voltage(), 10.0);
    }

    #[test]
    fn test_square_lands_on_corners() {
        let (_, a, b) = pair();
        let v = VoltageSquare::new("V1", a, b, 0.0, 10.0, 1e3).with_shape(0.5, 0.1);
        assert_relative_eq!(v.time_step_max(0.0), 0.1e-3, max_relative = 1e-9);
        assert_relative_eq!(v.time_step_max(0.3e-3), 0.2e-3, max_relative = 1e-6);
        assert_relative_eq!(v.time_step_max(0.9e-3), 0.1e-3, max_relative = 1e-6);
    }

    #[test]
    fn test_current_source_balance() {
        let (mut nodes, a, b) = pair();
        let mut i = CurrentDc::new("I1", a, b, 1e-3);
        i.update(&mut nodes, 0.0, 0.0);
        assert_eq!(nodes[a].accumulated_current(), -1e-3);
        assert_eq!(nodes[b].accumulated_current(), 1e-3);
    }
}

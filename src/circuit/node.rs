//! Capacitive nodes and the node arena.
//!
//! A node stores charge; its voltage is always `charge / capacitance`.
//! Components push currents into the `current_in` accumulator during a step
//! and the accumulated current is integrated over the chosen time step.

use std::ops::{Index, IndexMut};

use super::types::{NodeId, SupernodeId};

/// A capacitive circuit node.
#[derive(Debug, Clone)]
pub struct Node {
    label: String,
    is_hidden: bool,

    voltage: f64,
    charge: f64,
    current_in: f64,

    capacitance: f64,
    is_ground: bool,
    /// Per-node override of the maximum voltage change per step
    voltage_difference_max: Option<f64>,
    /// Limit in effect for the current run
    effective_voltage_difference_max: f64,

    supernode: Option<SupernodeId>,
}

impl Node {
    /// Create a new node with the given capacitance (farads).
    pub fn new(label: impl Into<String>, capacitance: f64) -> Self {
        Self {
            label: label.into(),
            is_hidden: false,
            voltage: 0.0,
            charge: 0.0,
            current_in: 0.0,
            capacitance,
            is_ground: false,
            voltage_difference_max: None,
            effective_voltage_difference_max: 0.0,
            supernode: None,
        }
    }

    /// Create a ground reference node.
    pub fn ground(label: impl Into<String>, capacitance: f64) -> Self {
        let mut node = Self::new(label, capacitance);
        node.is_ground = true;
        node
    }

    /// Reset the current accumulator at the start of a step.
    pub fn begin_iteration(&mut self) {
        self.current_in = 0.0;
    }

    /// Integrate the accumulated current over `time_step`.
    pub fn apply_iteration(&mut self, time_step: f64) {
        self.charge += time_step * self.current_in;
        self.voltage = self.charge / self.capacitance();
    }

    /// Nudge the node voltage directly, without integrating over time.
    pub fn increment_voltage(&mut self, value: f64) {
        self.charge += self.capacitance * value;
        self.voltage = self.charge / self.capacitance();
    }

    /// Add current flowing into the node.
    pub fn current_in(&mut self, value: f64) {
        self.current_in += value;
    }

    /// Add current flowing out of the node.
    pub fn current_out(&mut self, value: f64) {
        self.current_in -= value;
    }

    /// Net current accumulated during this step.
    pub fn accumulated_current(&self) -> f64 {
        self.current_in
    }

    /// Impose a voltage derivative by rewriting the accumulator.
    pub fn set_voltage_derivative(&mut self, value: f64) {
        self.current_in = self.capacitance * value;
    }

    /// Voltage derivative implied by the accumulated current.
    ///
    /// Always zero for ground nodes.
    pub fn voltage_derivative(&self) -> f64 {
        self.current_in / self.capacitance()
    }

    /// Clear the electrical state and the supernode link.
    pub fn clear(&mut self) {
        self.voltage = 0.0;
        self.charge = 0.0;
        self.current_in = 0.0;
        self.supernode = None;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    /// Effective capacitance: infinite for ground nodes.
    pub fn capacitance(&self) -> f64 {
        if self.is_ground {
            f64::INFINITY
        } else {
            self.capacitance
        }
    }

    /// Configured capacitance, ignoring the ground flag.
    pub fn internal_capacitance(&self) -> f64 {
        self.capacitance
    }

    pub fn set_capacitance(&mut self, value: f64) {
        self.capacitance = value;
    }

    pub fn is_ground(&self) -> bool {
        self.is_ground
    }

    pub fn set_ground(&mut self, value: bool) {
        self.is_ground = value;
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn set_hidden(&mut self, value: bool) {
        self.is_hidden = value;
    }

    /// Override the global maximum voltage change per step for this node.
    pub fn set_voltage_difference_max(&mut self, value: f64) {
        self.voltage_difference_max = Some(value);
    }

    /// Resolve the limit for a run from the global default.
    pub fn resolve_voltage_difference_max(&mut self, default: f64) {
        self.effective_voltage_difference_max = self.voltage_difference_max.unwrap_or(default);
    }

    /// Maximum voltage change per step in effect for the current run.
    pub fn voltage_difference_max(&self) -> f64 {
        self.effective_voltage_difference_max
    }

    pub fn supernode(&self) -> Option<SupernodeId> {
        self.supernode
    }

    pub fn redirect_to_supernode(&mut self, supernode: SupernodeId) {
        self.supernode = Some(supernode);
    }

    pub fn is_redirecting_to_supernode(&self) -> bool {
        self.supernode.is_some()
    }
}

/// Arena of nodes addressed by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct Nodes {
    nodes: Vec<Node>,
}

impl Nodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn voltage(&self, id: NodeId) -> f64 {
        self.nodes[id.0].voltage()
    }

    /// `v(positive) - v(negative)`
    pub fn voltage_difference(&self, positive: NodeId, negative: NodeId) -> f64 {
        self.voltage(positive) - self.voltage(negative)
    }

    pub fn current_in(&mut self, id: NodeId, value: f64) {
        self.nodes[id.0].current_in(value);
    }

    pub fn current_out(&mut self, id: NodeId, value: f64) {
        self.nodes[id.0].current_out(value);
    }

    /// Push `current` from `from` into `to`, keeping the pair balanced.
    pub fn transfer(&mut self, from: NodeId, to: NodeId, current: f64) {
        self.current_out(from, current);
        self.current_in(to, current);
    }
}

impl Index<NodeId> for Nodes {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Nodes {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_iteration_keeps_voltage_consistent() {
        let mut node = Node::new("a", 1e-6);
        node.begin_iteration();
        node.current_in(2e-3);
        node.current_out(0.5e-3);
        node.apply_iteration(1e-6);

        assert_relative_eq!(node.charge(), 1.5e-9);
        assert_eq!(node.voltage(), node.charge() / node.capacitance());
        assert_relative_eq!(node.voltage(), 1.5e-3);
    }

    #[test]
    fn test_ground_is_immovable() {
        let mut node = Node::ground("gnd", 1e-6);
        node.current_in(1.0);
        assert_eq!(node.voltage_derivative(), 0.0);
        node.apply_iteration(1.0);
        assert_eq!(node.voltage(), 0.0);
    }

    #[test]
    fn test_voltage_derivative_roundtrip() {
        let mut node = Node::new("a", 2e-9);
        node.set_voltage_derivative(1e3);
        assert_relative_eq!(node.accumulated_current(), 2e-6);
        assert_relative_eq!(node.voltage_derivative(), 1e3);
    }

    #[test]
    fn test_clear_drops_state() {
        let mut node = Node::new("a", 1e-9);
        node.increment_voltage(3.0);
        node.redirect_to_supernode(SupernodeId(4));
        assert_relative_eq!(node.voltage(), 3.0);

        node.clear();
        assert_eq!(node.voltage(), 0.0);
        assert_eq!(node.charge(), 0.0);
        assert!(!node.is_redirecting_to_supernode());
    }

    #[test]
    fn test_transfer_is_balanced() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-9));
        let b = nodes.push(Node::new("b", 1e-9));
        nodes.transfer(a, b, 4e-3);

        let net = nodes[a].accumulated_current() + nodes[b].accumulated_current();
        assert_eq!(net, 0.0);
    }

    #[test]
    fn test_voltage_difference_max_override() {
        let mut node = Node::new("a", 1e-9);
        node.resolve_voltage_difference_max(50e-6);
        assert_eq!(node.voltage_difference_max(), 50e-6);

        node.set_voltage_difference_max(1e-3);
        node.resolve_voltage_difference_max(50e-6);
        assert_eq!(node.voltage_difference_max(), 1e-3);
    }
}

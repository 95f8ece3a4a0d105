//! Supernodes: clusters of nodes coupled through bound links.
//!
//! Components whose behaviour would be stiff under explicit integration
//! (wires, ideal sources, coupling capacitors) bind their terminal pair
//! during setup. Bound pairs that share a node end up in the same
//! supernode, whose extended linear system is inverted once per run and
//! then used every step to turn node currents into voltage derivatives.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::circuit::{validate_ideal_links, ComponentId, IdealLink, NodeId, Nodes, SupernodeId};
use crate::components::Component;
use crate::error::{Result, SimError};

use super::system::{ExtendedSystem, Row};

/// A bound terminal pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub component: ComponentId,
    pub pos: NodeId,
    pub neg: NodeId,
    /// Index among the ideal links, assigned by [`Supernode::init`]
    pub ideal: Option<usize>,
    /// Coupling capacitance cached by [`Supernode::init`]
    pub capacitance: f64,
}

/// One cluster of nodes and the links that tie them together.
#[derive(Debug, Clone)]
pub struct Supernode {
    id: SupernodeId,
    nodes: Vec<NodeId>,
    links: Vec<Link>,

    ideal_count: usize,
    inverse: DMatrix<f64>,
    repair: DMatrix<f64>,
    errors: DVector<f64>,
    input: DVector<f64>,
    output: DVector<f64>,
    // Kept apart from `input`/`output` so a repair between `update` and
    // `apply_iteration` leaves the solved link currents intact
    repair_input: DVector<f64>,
    repair_output: DVector<f64>,
}

impl Supernode {
    fn new(id: SupernodeId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            links: Vec::new(),
            ideal_count: 0,
            inverse: DMatrix::zeros(0, 0),
            repair: DMatrix::zeros(0, 0),
            errors: DVector::zeros(0),
            input: DVector::zeros(0),
            output: DVector::zeros(0),
            repair_input: DVector::zeros(0),
            repair_output: DVector::zeros(0),
        }
    }

    pub fn id(&self) -> SupernodeId {
        self.id
    }

    /// Member nodes in matrix row order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn ideal_count(&self) -> usize {
        self.ideal_count
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn node_index(&mut self, node: NodeId) -> usize {
        match self.nodes.iter().position(|&n| n == node) {
            Some(index) => index,
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn row(&self, nodes: &Nodes, node: NodeId) -> Row {
        if nodes[node].is_ground() {
            None
        } else {
            self.nodes.iter().position(|&n| n == node)
        }
    }

    fn add(&mut self, nodes: &mut Nodes, component: ComponentId, pos: NodeId, neg: NodeId) {
        self.node_index(pos);
        self.node_index(neg);
        self.links.push(Link {
            component,
            pos,
            neg,
            ideal: None,
            capacitance: f64::INFINITY,
        });
        nodes[pos].redirect_to_supernode(self.id);
        nodes[neg].redirect_to_supernode(self.id);
    }

    /// Take over every link of `other`.
    pub fn absorb(&mut self, nodes: &mut Nodes, other: Supernode) {
        debug!("{} absorbs {} ({} links)", self.id, other.id, other.links.len());
        for link in other.links {
            self.add(nodes, link.component, link.pos, link.neg);
        }
    }

    /// Build and invert the extended system. Called once per run.
    pub fn init(&mut self, nodes: &Nodes, components: &[Box<dyn Component>]) -> Result<()> {
        let mut ideal_count = 0;
        for link in &mut self.links {
            link.capacitance = components[link.component.0].sn_capacitance(link.pos, link.neg);
            link.ideal = if link.capacitance == f64::INFINITY {
                ideal_count += 1;
                Some(ideal_count - 1)
            } else {
                None
            };
        }
        self.ideal_count = ideal_count;

        let ideal_links: Vec<IdealLink<'_>> = self
            .links
            .iter()
            .filter(|l| l.ideal.is_some())
            .map(|l| IdealLink {
                label: components[l.component.0].label(),
                pos: l.pos,
                neg: l.neg,
            })
            .collect();
        validate_ideal_links(nodes, &ideal_links)?;

        let node_count = self.nodes.len();
        let mut system = ExtendedSystem::new(node_count, ideal_count);
        for (row, &id) in self.nodes.iter().enumerate() {
            if nodes[id].is_ground() {
                system.stamp_ground(row);
            } else {
                system.stamp_node(row, nodes[id].capacitance());
            }
        }
        for link in &self.links {
            let pos = self.row(nodes, link.pos);
            let neg = self.row(nodes, link.neg);
            match link.ideal {
                Some(k) => system.stamp_ideal_link(pos, neg, k),
                None => system.stamp_capacitance(pos, neg, link.capacitance),
            }
        }

        let singular = || SimError::SingularSupernode {
            nodes: node_count,
            ideal: ideal_count,
        };
        self.inverse = system.invert().ok_or_else(singular)?;

        self.repair = if ideal_count == 0 {
            DMatrix::zeros(0, 0)
        } else {
            // geometry (M×N): +1 at (k, pos), -1 at (k, neg)
            let mut geometry = DMatrix::<f64>::zeros(ideal_count, node_count);
            for link in &self.links {
                if let Some(k) = link.ideal {
                    if let Some(p) = self.row(nodes, link.pos) {
                        geometry[(k, p)] += 1.0;
                    }
                    if let Some(n) = self.row(nodes, link.neg) {
                        geometry[(k, n)] -= 1.0;
                    }
                }
            }
            // impact (N×M): node response to a unit ideal input
            let mut impact = DMatrix::<f64>::zeros(node_count, ideal_count);
            for k in 0..ideal_count {
                let response = &self.inverse * system.ideal_unit(k);
                impact
                    .column_mut(k)
                    .copy_from(&response.rows(0, node_count));
            }
            (geometry * impact).try_inverse().ok_or_else(singular)?
        };

        self.errors = DVector::zeros(ideal_count);
        self.input = DVector::zeros(system.size());
        self.output = DVector::zeros(system.size());
        self.repair_input = DVector::zeros(system.size());
        self.repair_output = DVector::zeros(system.size());

        debug!(
            "{} initialised: {} nodes, {} links ({} ideal)",
            self.id,
            node_count,
            self.links.len(),
            ideal_count
        );
        Ok(())
    }

    /// Solve the member derivatives from the currents pushed this step.
    pub fn update(&mut self, nodes: &mut Nodes, components: &[Box<dyn Component>]) {
        let node_count = self.nodes.len();
        for (row, &id) in self.nodes.iter().enumerate() {
            self.input[row] = if nodes[id].is_ground() {
                0.0
            } else {
                nodes[id].accumulated_current()
            };
        }
        for link in &self.links {
            if let Some(k) = link.ideal {
                self.input[node_count + k] =
                    -components[link.component.0].sn_voltage_derivative(link.pos, link.neg);
            }
        }

        self.output = &self.inverse * &self.input;

        for (row, &id) in self.nodes.iter().enumerate() {
            nodes[id].set_voltage_derivative(self.output[row]);
        }
    }

    /// Report link currents and integrate the member nodes over `time_step`.
    pub fn apply_iteration(
        &mut self,
        nodes: &mut Nodes,
        components: &mut [Box<dyn Component>],
        time_step: f64,
    ) {
        let node_count = self.nodes.len();
        for link in &self.links {
            let current = match link.ideal {
                // the solved unknown is the current injected into `pos`
                Some(k) => -self.output[node_count + k],
                None => {
                    (nodes[link.pos].voltage_derivative() - nodes[link.neg].voltage_derivative())
                        * link.capacitance
                }
            };
            components[link.component.0].sn_update(link.pos, link.neg, current, time_step);
        }
        for &id in &self.nodes {
            nodes[id].apply_iteration(time_step);
        }
    }

    /// Collect the voltage error of every ideal link; returns the largest magnitude.
    fn measure_errors(&mut self, nodes: &Nodes, components: &[Box<dyn Component>]) -> f64 {
        let mut worst = 0.0_f64;
        for link in &self.links {
            if let Some(k) = link.ideal {
                let error = components[link.component.0].sn_voltage_error(nodes, link.pos, link.neg);
                self.errors[k] = error;
                worst = worst.max(error.abs());
            }
        }
        worst
    }

    fn repair_errors(&mut self, nodes: &mut Nodes) {
        let node_count = self.nodes.len();
        self.repair_input.fill(0.0);
        let correction = &self.repair * &self.errors;
        self.repair_input
            .rows_mut(node_count, self.ideal_count)
            .copy_from(&correction);
        self.repair_output = &self.inverse * &self.repair_input;

        for (row, &id) in self.nodes.iter().enumerate() {
            if !nodes[id].is_ground() {
                nodes[id].increment_voltage(self.repair_output[row]);
            }
        }
    }

    /// Pull every ideal link back onto its imposed voltage.
    pub fn fix_divergence(&mut self, nodes: &mut Nodes, components: &[Box<dyn Component>]) {
        if self.ideal_count == 0 {
            return;
        }
        let worst = self.measure_errors(nodes, components);
        trace!("{} repair, worst error {:.3e} V", self.id, worst);
        self.repair_errors(nodes);
    }

    /// Repair only when some ideal link drifted by more than `threshold`.
    ///
    /// Returns true when a repair was applied.
    pub fn fix_divergence_if(
        &mut self,
        nodes: &mut Nodes,
        components: &[Box<dyn Component>],
        threshold: f64,
    ) -> bool {
        if self.ideal_count == 0 {
            return false;
        }
        let worst = self.measure_errors(nodes, components);
        if worst > threshold {
            trace!("{} repair, worst error {:.3e} V", self.id, worst);
            self.repair_errors(nodes);
            true
        } else {
            false
        }
    }
}

/// Arena owning every supernode created during a run.
///
/// Absorbed supernodes stay in the arena empty; [`SupernodeArena::live`]
/// lists the ones still referenced by some node.
#[derive(Debug, Clone, Default)]
pub struct SupernodeArena {
    supernodes: Vec<Supernode>,
}

impl SupernodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.supernodes.clear();
    }

    pub fn len(&self) -> usize {
        self.supernodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supernodes.is_empty()
    }

    pub fn get(&self, id: SupernodeId) -> Option<&Supernode> {
        self.supernodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: SupernodeId) -> Option<&mut Supernode> {
        self.supernodes.get_mut(id.0)
    }

    /// Bind `(pos, neg)` on behalf of `component`, creating or merging clusters.
    pub fn bind(&mut self, nodes: &mut Nodes, pos: NodeId, neg: NodeId, component: ComponentId) {
        let target = match (nodes[pos].supernode(), nodes[neg].supernode()) {
            (None, None) => {
                let id = SupernodeId(self.supernodes.len());
                self.supernodes.push(Supernode::new(id));
                debug!("{} created by {}", id, component);
                id
            }
            (Some(id), None) | (None, Some(id)) => id,
            (Some(a), Some(b)) if a == b => a,
            (Some(a), Some(b)) => {
                let absorbed = std::mem::replace(&mut self.supernodes[b.0], Supernode::new(b));
                self.supernodes[a.0].absorb(nodes, absorbed);
                a
            }
        };
        self.supernodes[target.0].add(nodes, component, pos, neg);
    }

    /// Distinct supernodes referenced by nodes, in node order.
    pub fn live(&self, nodes: &Nodes) -> Vec<SupernodeId> {
        let mut live = Vec::new();
        for (_, node) in nodes.iter() {
            if let Some(id) = node.supernode() {
                if !live.contains(&id) {
                    live.push(id);
                }
            }
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Node;
    use crate::components::{Ammeter, Capacitor, VoltageDc, Wire};
    use approx::assert_relative_eq;

    fn arena_with(
        nodes: &mut Nodes,
        components: &[Box<dyn Component>],
        pairs: &[(usize, NodeId, NodeId)],
    ) -> SupernodeArena {
        let mut arena = SupernodeArena::new();
        for &(c, pos, neg) in pairs {
            arena.bind(nodes, pos, neg, ComponentId(c));
        }
        for id in arena.live(nodes) {
            arena
                .get_mut(id)
                .unwrap()
                .init(nodes, components)
                .unwrap();
        }
        arena
    }

    #[test]
    fn test_bind_creates_and_merges() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-9));
        let b = nodes.push(Node::new("b", 1e-9));
        let c = nodes.push(Node::new("c", 1e-9));
        let d = nodes.push(Node::new("d", 1e-9));

        let mut arena = SupernodeArena::new();
        arena.bind(&mut nodes, a, b, ComponentId(0));
        arena.bind(&mut nodes, c, d, ComponentId(1));
        assert_eq!(arena.live(&nodes).len(), 2);

        arena.bind(&mut nodes, b, c, ComponentId(2));
        let live = arena.live(&nodes);
        assert_eq!(live.len(), 1);
        let sn = arena.get(live[0]).unwrap();
        assert_eq!(sn.links().len(), 3);
        assert_eq!(sn.nodes().len(), 4);
        for id in [a, b, c, d] {
            assert_eq!(nodes[id].supernode(), Some(live[0]));
        }
    }

    #[test]
    fn test_wire_equalises_after_one_correction() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-6));
        let b = nodes.push(Node::new("b", 1e-6));
        nodes[a].increment_voltage(2.0);

        let components: Vec<Box<dyn Component>> = vec![Box::new(Wire::new("W1", a, b))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, b)]);
        let id = arena.live(&nodes)[0];
        arena.get_mut(id).unwrap().fix_divergence(&mut nodes, &components);

        assert_relative_eq!(nodes.voltage(a), 1.0, epsilon = 1e-12);
        assert_relative_eq!(nodes.voltage(b), 1.0, epsilon = 1e-12);
        // charge is conserved by the repair
        assert_relative_eq!(nodes[a].charge() + nodes[b].charge(), 2e-6, epsilon = 1e-18);
    }

    #[test]
    fn test_wire_equalises_unequal_nodes_charged_on_either_side() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-6));
        let b = nodes.push(Node::new("b", 2e-6));
        nodes[b].increment_voltage(4.5);

        let components: Vec<Box<dyn Component>> = vec![Box::new(Wire::new("W1", a, b))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, b)]);
        let id = arena.live(&nodes)[0];
        arena.get_mut(id).unwrap().fix_divergence(&mut nodes, &components);

        // 9 µC shared over 3 µF
        assert_relative_eq!(nodes.voltage(a), 3.0, epsilon = 1e-12);
        assert_relative_eq!(nodes.voltage(b), 3.0, epsilon = 1e-12);
        assert_relative_eq!(nodes[a].charge() + nodes[b].charge(), 9e-6, epsilon = 1e-18);
    }

    #[test]
    fn test_repair_keeps_solved_link_current() {
        let mut nodes = Nodes::new();
        let gnd = nodes.push(Node::ground("gnd", 1e-9));
        let a = nodes.push(Node::new("a", 1e-6));

        let mut components: Vec<Box<dyn Component>> =
            vec![Box::new(Ammeter::new("A1", a, gnd))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, gnd)]);
        let id = arena.live(&nodes)[0];
        let sn = arena.get_mut(id).unwrap();

        nodes[a].begin_iteration();
        nodes[a].current_in(2e-3);
        sn.update(&mut nodes, &components);
        sn.apply_iteration(&mut nodes, &mut components, 1e-6);
        let clean = components[0].printable(0);
        assert_relative_eq!(clean, 2e-3, max_relative = 1e-9);

        // drift the node so the next step repairs before applying
        nodes[a].increment_voltage(1e-3);
        nodes[a].begin_iteration();
        nodes[a].current_in(2e-3);
        sn.update(&mut nodes, &components);
        assert!(sn.fix_divergence_if(&mut nodes, &components, 1e-6));
        sn.apply_iteration(&mut nodes, &mut components, 1e-6);

        assert_relative_eq!(components[0].printable(0), clean, max_relative = 1e-9);
        assert_relative_eq!(components[0].printable(1), 2.0 * 2e-3 * 1e-6, max_relative = 1e-9);
        assert_relative_eq!(nodes.voltage(a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correction_is_idempotent() {
        let mut nodes = Nodes::new();
        let gnd = nodes.push(Node::ground("gnd", 1e-9));
        let a = nodes.push(Node::new("a", 1e-9));

        let components: Vec<Box<dyn Component>> =
            vec![Box::new(VoltageDc::new("V1", a, gnd, 5.0))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, gnd)]);
        let id = arena.live(&nodes)[0];
        let sn = arena.get_mut(id).unwrap();

        sn.fix_divergence(&mut nodes, &components);
        assert_relative_eq!(nodes.voltage(a), 5.0, epsilon = 1e-12);

        sn.fix_divergence(&mut nodes, &components);
        assert_relative_eq!(nodes.voltage(a), 5.0, epsilon = 1e-12);
        assert!(!sn.fix_divergence_if(&mut nodes, &components, 1e-9));
        assert_eq!(nodes.voltage(gnd), 0.0);
    }

    #[test]
    fn test_update_splits_current_across_wire() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-6));
        let b = nodes.push(Node::new("b", 3e-6));

        let mut components: Vec<Box<dyn Component>> = vec![Box::new(Wire::new("W1", a, b))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, b)]);
        let id = arena.live(&nodes)[0];
        let sn = arena.get_mut(id).unwrap();

        nodes[a].current_in(4e-3);
        sn.update(&mut nodes, &components);
        // both nodes move together: 4 mA into 4 µF
        assert_relative_eq!(nodes[a].voltage_derivative(), 1e3, epsilon = 1e-9);
        assert_relative_eq!(nodes[b].voltage_derivative(), 1e3, epsilon = 1e-9);

        sn.apply_iteration(&mut nodes, &mut components, 1e-6);
        assert_relative_eq!(nodes.voltage(a), 1e-3, epsilon = 1e-12);
        assert_relative_eq!(nodes.voltage(b), 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_capacitor_link_couples_without_ideal_rows() {
        let mut nodes = Nodes::new();
        let gnd = nodes.push(Node::ground("gnd", 1e-9));
        let a = nodes.push(Node::new("a", 1e-9));

        let mut components: Vec<Box<dyn Component>> =
            vec![Box::new(Capacitor::new("C1", a, gnd, 1e-6))];
        let mut arena = arena_with(&mut nodes, &components, &[(0, a, gnd)]);
        let id = arena.live(&nodes)[0];
        let sn = arena.get_mut(id).unwrap();
        assert_eq!(sn.ideal_count(), 0);

        nodes[a].current_in(1e-3);
        sn.update(&mut nodes, &components);
        // 1 mA into 1 µF + 1 nF
        assert_relative_eq!(nodes[a].voltage_derivative(), 1e-3 / 1.001e-6, max_relative = 1e-9);
        sn.apply_iteration(&mut nodes, &mut components, 1e-6);
        assert_relative_eq!(nodes.voltage(a), 1e-9 / 1.001e-6, max_relative = 1e-9);
    }

    #[test]
    fn test_ideal_loop_is_rejected() {
        let mut nodes = Nodes::new();
        let a = nodes.push(Node::new("a", 1e-9));
        let b = nodes.push(Node::new("b", 1e-9));

        let components: Vec<Box<dyn Component>> = vec![
            Box::new(Wire::new("W1", a, b)),
            Box::new(Wire::new("W2", b, a)),
        ];
        let mut arena = SupernodeArena::new();
        arena.bind(&mut nodes, a, b, ComponentId(0));
        arena.bind(&mut nodes, b, a, ComponentId(1));
        let id = arena.live(&nodes)[0];
        let err = arena
            .get_mut(id)
            .unwrap()
            .init(&nodes, &components)
            .unwrap_err();
        assert!(matches!(err, SimError::IdealLoop { .. }));
    }
}

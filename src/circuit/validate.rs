//! Topology validation for supernode clusters.

use std::collections::HashMap;

use crate::error::{Result, SimError};

use super::node::Nodes;
use super::types::NodeId;

/// An ideal link as seen by validation.
#[derive(Debug, Clone, Copy)]
pub struct IdealLink<'a> {
    pub label: &'a str,
    pub pos: NodeId,
    pub neg: NodeId,
}

/// Disjoint-set forest over node ids.
#[derive(Debug, Default)]
struct DisjointSet {
    parent: HashMap<usize, usize>,
}

impl DisjointSet {
    fn find(&mut self, x: usize) -> usize {
        let parent = *self.parent.entry(x).or_insert(x);
        if parent == x {
            return x;
        }
        let root = self.find(parent);
        self.parent.insert(x, root);
        root
    }

    /// Returns false when both were already in the same set.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent.insert(ra, rb);
        true
    }
}

/// Reject ideal links that close a loop.
///
/// Every ground node is treated as one vertex, so an ideal link between
/// two grounds, or two ideal paths from one node to ground, is a loop.
/// Such a loop over-constrains the cluster: its extended system is singular.
pub fn validate_ideal_links(nodes: &Nodes, links: &[IdealLink<'_>]) -> Result<()> {
    const GROUND: usize = usize::MAX;
    let vertex = |id: NodeId| if nodes[id].is_ground() { GROUND } else { id.0 };

    let mut set = DisjointSet::default();
    for link in links {
        if !set.union(vertex(link.pos), vertex(link.neg)) {
            return Err(SimError::IdealLoop {
                component: link.label.to_string(),
                pos: nodes[link.pos].label().to_string(),
                neg: nodes[link.neg].label().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Node;

    fn link(label: &str, pos: NodeId, neg: NodeId) -> IdealLink<'_> {
        IdealLink { label, pos, neg }
    }

    #[test]
    fn test_chain_is_valid() {
        let mut nodes = Nodes::new();
        let gnd = nodes.push(Node::ground("gnd", 1e-9));
        let a = nodes.push(Node::new("a", 1e-9));
        let b = nodes.push(Node::new("b", 1e-9));

        let links = [link("V1", a, gnd), link("W1", a, b)];
        assert!(validate_ideal_links(&nodes, &links).is_ok());
    }

    #[test]
    fn test_loop_through_ground() {
        let mut nodes = Nodes::new();
        let g1 = nodes.push(Node::ground("g1", 1e-9));
        let g2 = nodes.push(Node::ground("g2", 1e-9));
        let a = nodes.push(Node::new("a", 1e-9));

        let links = [link("V1", a, g1), link("V2", a, g2)];
        match validate_ideal_links(&nodes, &links) {
            Err(SimError::IdealLoop { component, .. }) => assert_eq!(component, "V2"),
            other => panic!("expected IdealLoop, got {:?}", other),
        }
    }

    #[test]
    fn test_grounds_shorted() {
        let mut nodes = Nodes::new();
        let g1 = nodes.push(Node::ground("g1", 1e-9));
        let g2 = nodes.push(Node::ground("g2", 1e-9));

        let links = [link("W1", g1, g2)];
        assert!(validate_ideal_links(&nodes, &links).is_err());
    }
}

//! Circuit container: nodes, components and printables.

use std::collections::HashMap;

use log::info;

use super::node::{Node, Nodes};
use super::printable::PrintableInfo;
use super::types::{ComponentId, NodeId};
use crate::components::{Component, ConfigContext, ConfigLog, Registry};
use crate::error::{Result, SimError};

/// A configured circuit, ready to be borrowed by a simulator.
#[derive(Debug, Default)]
pub struct Circuit {
    /// Node arena
    pub(crate) nodes: Nodes,

    /// Mapping from node labels to node IDs
    pub(crate) node_map: HashMap<String, NodeId>,

    /// All components, addressed by [`ComponentId`]
    pub(crate) components: Vec<Box<dyn Component>>,

    /// Mapping from component labels to component IDs
    pub(crate) component_map: HashMap<String, ComponentId>,

    /// Every printable registered by a component, active or not
    pub(crate) printables: Vec<PrintableInfo>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given capacitance (farads).
    pub fn add_node(&mut self, label: &str, capacitance: f64) -> Result<NodeId> {
        if self.node_map.contains_key(label) {
            return Err(SimError::DuplicateNode {
                name: label.to_string(),
            });
        }
        check_capacitance(capacitance)?;
        let id = self.nodes.push(Node::new(label, capacitance));
        self.node_map.insert(label.to_string(), id);
        Ok(id)
    }

    /// Add a ground reference node.
    pub fn add_ground(&mut self, label: &str, capacitance: f64) -> Result<NodeId> {
        let id = self.add_node(label, capacitance)?;
        self.nodes[id].set_ground(true);
        Ok(id)
    }

    pub fn set_ground(&mut self, label: &str, value: bool) -> Result<()> {
        let id = self.node_id(label)?;
        self.nodes[id].set_ground(value);
        Ok(())
    }

    pub fn set_hidden(&mut self, label: &str, value: bool) -> Result<()> {
        let id = self.node_id(label)?;
        self.nodes[id].set_hidden(value);
        Ok(())
    }

    pub fn set_capacitance(&mut self, label: &str, value: f64) -> Result<()> {
        check_capacitance(value)?;
        let id = self.node_id(label)?;
        self.nodes[id].set_capacitance(value);
        Ok(())
    }

    /// Override the maximum per-step voltage change of one node.
    pub fn set_voltage_difference_max(&mut self, label: &str, value: f64) -> Result<()> {
        if value <= 0.0 || !value.is_finite() {
            return Err(SimError::invalid_parameter(
                "vd-max",
                format!("must be finite and greater than 0, got {}", value),
            ));
        }
        let id = self.node_id(label)?;
        self.nodes[id].set_voltage_difference_max(value);
        Ok(())
    }

    /// Add an already-built component.
    pub fn add_component(&mut self, component: Box<dyn Component>) -> Result<ComponentId> {
        let label = component.label().to_string();
        if self.component_map.contains_key(&label) {
            return Err(SimError::DuplicateComponent { name: label });
        }
        let id = ComponentId(self.components.len());
        self.components.push(component);
        self.component_map.insert(label, id);
        Ok(id)
    }

    /// Build `model` from the registry and configure it from `args`.
    ///
    /// When the component reports an error, every printable it registered
    /// is removed again and the configuration log is returned inside
    /// [`SimError::Configuration`].
    pub fn add_component_from_model(
        &mut self,
        registry: &Registry,
        label: &str,
        model: &str,
        args: &str,
    ) -> Result<(ComponentId, ConfigLog)> {
        if self.component_map.contains_key(label) {
            return Err(SimError::DuplicateComponent {
                name: label.to_string(),
            });
        }
        let mut component = registry
            .build(model, label)
            .ok_or_else(|| SimError::UnknownModel {
                model: model.to_string(),
            })?;

        let printable_count = self.printables.len();
        let id = ComponentId(self.components.len());

        let mut ctx = ConfigContext::new(
            &self.node_map,
            &mut self.printables,
            id,
            label,
            args,
        );
        component.configure(&mut ctx);
        let log = ctx.finish();
        log.emit(label, model);

        if !log.is_ok() {
            self.printables.truncate(printable_count);
            return Err(SimError::Configuration {
                component: label.to_string(),
                model: model.to_string(),
                errors: log.errors(),
            });
        }

        info!("added component {} ({})", label, model);
        self.components.push(component);
        self.component_map.insert(label.to_string(), id);
        Ok((id, log))
    }

    /// Activate or deactivate a printable by name.
    pub fn set_printable_active(&mut self, name: &str, value: bool) -> Result<()> {
        let printable = self
            .printables
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SimError::PrintableNotFound {
                name: name.to_string(),
            })?;
        printable.is_active = value;
        Ok(())
    }

    /// Find a node ID by label.
    pub fn find_node(&self, label: &str) -> Option<NodeId> {
        self.node_map.get(label).copied()
    }

    fn node_id(&self, label: &str) -> Result<NodeId> {
        self.find_node(label).ok_or_else(|| SimError::NodeNotFound {
            node: label.to_string(),
        })
    }

    pub fn find_component(&self, label: &str) -> Option<ComponentId> {
        self.component_map.get(label).copied()
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Voltage of the node with the given label.
    pub fn voltage(&self, label: &str) -> Option<f64> {
        self.find_node(label).map(|id| self.nodes.voltage(id))
    }

    pub fn components(&self) -> &[Box<dyn Component>] {
        &self.components
    }

    pub fn component(&self, id: ComponentId) -> &dyn Component {
        self.components[id.0].as_ref()
    }

    pub fn printables(&self) -> &[PrintableInfo] {
        &self.printables
    }

    /// Current value of a printable by name.
    pub fn printable_value(&self, name: &str) -> Option<f64> {
        self.printables
            .iter()
            .find(|p| p.name == name)
            .map(|p| self.components[p.owner.0].printable(p.slot))
    }
}

fn check_capacitance(value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid_parameter(
            "capacitance",
            format!("must be finite and greater than 0, got {}", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit() -> (Circuit, Registry) {
        let mut circuit = Circuit::new();
        circuit.add_node("a", 1e-9).unwrap();
        circuit.add_node("b", 1e-9).unwrap();
        (circuit, Registry::with_builtin())
    }

    #[test]
    fn test_add_node_rejects_bad_input() {
        let (mut circuit, _) = circuit();
        assert!(matches!(
            circuit.add_node("a", 1e-9),
            Err(SimError::DuplicateNode { .. })
        ));
        assert!(circuit.add_node("c", 0.0).is_err());
        assert!(circuit.add_node("d", -1e-9).is_err());
        assert_eq!(circuit.nodes().len(), 2);
    }

    #[test]
    fn test_add_component_from_model() {
        let (mut circuit, registry) = circuit();
        let (id, log) = circuit
            .add_component_from_model(&registry, "R1", "resistor", "a b 1k")
            .unwrap();
        assert!(log.is_ok());
        assert_eq!(circuit.find_component("R1"), Some(id));
        assert_eq!(circuit.printables()[0].name, "R1:i");

        assert!(matches!(
            circuit.add_component_from_model(&registry, "R1", "resistor", "a b 1k"),
            Err(SimError::DuplicateComponent { .. })
        ));
        assert!(matches!(
            circuit.add_component_from_model(&registry, "X1", "flux-capacitor", ""),
            Err(SimError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_failed_configuration_rolls_back() {
        let (mut circuit, registry) = circuit();
        let err = circuit
            .add_component_from_model(&registry, "R1", "resistor", "a missing 1k")
            .unwrap_err();
        match err {
            SimError::Configuration { errors, .. } => {
                assert!(errors[0].contains("missing"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(circuit.components().is_empty());
        assert!(circuit.printables().is_empty());
        assert_eq!(circuit.nodes().len(), 2);
    }

    #[test]
    fn test_printable_activation() {
        let (mut circuit, registry) = circuit();
        circuit
            .add_component_from_model(&registry, "W1", "wire", "a b")
            .unwrap();
        circuit.set_printable_active("W1:i", true).unwrap();
        assert!(circuit.printables()[0].is_active);
        assert!(matches!(
            circuit.set_printable_active("W1:v", true),
            Err(SimError::PrintableNotFound { .. })
        ));
    }

    #[test]
    fn test_node_edits() {
        let (mut circuit, _) = circuit();
        circuit.set_ground("a", true).unwrap();
        circuit.set_hidden("b", true).unwrap();
        circuit.set_capacitance("b", 2e-9).unwrap();
        let a = circuit.find_node("a").unwrap();
        let b = circuit.find_node("b").unwrap();
        assert!(circuit.node(a).is_ground());
        assert!(circuit.node(b).is_hidden());
        assert_eq!(circuit.node(b).capacitance(), 2e-9);
        assert!(circuit.set_capacitance("b", 0.0).is_err());
        assert!(matches!(
            circuit.set_ground("zz", true),
            Err(SimError::NodeNotFound { .. })
        ));
    }
}

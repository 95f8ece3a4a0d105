//! Printable values exposed by components.
//!
//! A component registers named slots during configuration. Before the
//! printer hooks run, the simulator samples every active slot into a
//! [`PrintFrame`] so printers can read values owned by other components.

use super::node::Nodes;
use super::types::ComponentId;

/// A named value owned by a component.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintableInfo {
    /// Full name, conventionally `<component label>:<quantity>`
    pub name: String,
    /// Unit symbol shown in printer headers
    pub unit: &'static str,
    /// Component that owns the value
    pub owner: ComponentId,
    /// Slot passed back to [`Component::printable`](crate::components::Component::printable)
    pub slot: usize,
    /// Only active printables are handed to the simulator
    pub is_active: bool,
}

/// Snapshot of node voltages and active printable values for one step.
#[derive(Debug, Clone, Copy)]
pub struct PrintFrame<'a> {
    pub nodes: &'a Nodes,
    pub printables: &'a [PrintableInfo],
    pub values: &'a [f64],
}

impl<'a> PrintFrame<'a> {
    /// Value of the printable at `index` in [`PrintFrame::printables`].
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }
}

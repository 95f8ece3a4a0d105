//! Circuit representation.
//!
//! This module holds the configured state a simulator runs on: the node
//! arena, the component list and the printable table. The [`Circuit`]
//! struct owns all of it; a [`Simulator`](crate::solver::Simulator)
//! borrows it for the duration of a run.

mod graph;
mod node;
mod printable;
mod types;
mod validate;

pub use graph::Circuit;
pub use node::{Node, Nodes};
pub use printable::{PrintFrame, PrintableInfo};
pub use types::*;
pub use validate::{validate_ideal_links, IdealLink};

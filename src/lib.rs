//! # Capsim Core
//!
//! A transient circuit simulator that models every node as a capacitor and
//! integrates charge with an adaptive time step.
//!
//! This library provides:
//! - A line-oriented netlist language for describing circuits and runs
//! - A node/component graph with a model registry
//! - Algebraic supernodes that keep ideal links (wires, voltage sources)
//!   exact while the rest of the circuit integrates explicitly
//! - A CSV printer for node voltages and component quantities
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`circuit`] - Nodes, the circuit graph and ideal-link validation
//! - [`components`] - The component trait, device models and the registry
//! - [`solver`] - Supernodes and the adaptive-step simulator
//! - [`session`] - Executes netlist commands
//!
//! ## Usage
//!
//! ```bash
//! capsim circuit.net --duration 5m -v
//! ```
//!
//! ```no_run
//! use capsim_core::{components::Registry, Session};
//!
//! let registry = Registry::with_builtin();
//! let mut session = Session::new(&registry);
//! session.execute_str("node a 1n\nrun\n")?;
//! # Ok::<(), capsim_core::SimError>(())
//! ```
//!
//! ## Simulation Method
//!
//! Each step, components push currents into nodes. A free node turns its
//! accumulated current into a voltage derivative through its capacitance; the
//! nodes of a supernode solve a small linear system instead, so the links
//! that tie them together hold exactly. The step is the largest one that
//! keeps every node within its voltage-change limit.

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod error;
pub mod session;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use session::Session;
pub use solver::{Simulator, SimulatorConfig};

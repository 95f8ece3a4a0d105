//! Adaptive-step charge integration with algebraic supernodes.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Integration scheme
//!
//! Every node is a capacitor to an implicit reference. Each step:
//! - components push currents into nodes from the current voltages;
//! - supernodes turn those currents into voltage derivatives by solving
//!   their extended system (pre-inverted once per run);
//! - the step is the largest one that keeps every node within its
//!   voltage-change limit and honours every component request;
//! - charge is integrated over that step.
//!
//! The extended system of a supernode with N nodes and M ideal links is:
//! ```text
//! [ C   B ] [ dv/dt ]   [ current_in ]
//! [ B'  0 ] [ i     ] = [ -de/dt     ]
//! ```
//!
//! where:
//! - C holds the node capacitances and the coupling capacitances of
//!   ordinary links
//! - B places each ideal link between its two nodes
//! - i is the vector of ideal link currents
//! - e is the vector of voltages the ideal links impose
//!
//! Drift of the imposed voltages is pulled back by a repair step whenever it
//! exceeds a tenth of the voltage-change limit.

mod simulator;
mod supernode;
mod system;

pub use simulator::{RunState, RunSummary, Simulator, SimulatorConfig};
pub use supernode::{Link, Supernode, SupernodeArena};
pub use system::ExtendedSystem;

/// Default maximum voltage change of a node in one step (volts).
pub const DEFAULT_VOLTAGE_DIFFERENCE_MAX: f64 = 50e-6;

/// Default maximum time step (seconds).
pub const DEFAULT_TIME_STEP_MAX: f64 = 100e-9;

/// Default run duration (seconds).
pub const DEFAULT_DURATION: f64 = 10e-3;

/// Ideal-link drift that triggers a repair, relative to the voltage-change limit.
pub const REPAIR_THRESHOLD_RATIO: f64 = 0.1;

/// Sleep between polls while a component pauses the run.
pub const PAUSE_INTERVAL_MS: u64 = 15;

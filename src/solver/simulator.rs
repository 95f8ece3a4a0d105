//! Main simulator interface.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::circuit::{Circuit, ComponentId, NodeId, PrintFrame, PrintableInfo};
use crate::components::{Component, SetupContext};
use crate::error::{Result, SimError};

use super::supernode::SupernodeArena;
use super::{
    DEFAULT_DURATION, DEFAULT_TIME_STEP_MAX, DEFAULT_VOLTAGE_DIFFERENCE_MAX, PAUSE_INTERVAL_MS,
    REPAIR_THRESHOLD_RATIO,
};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Default maximum voltage change of a node in one step (volts).
    pub voltage_difference_max: f64,
    /// Upper bound on the time step (seconds).
    pub time_step_max: f64,
    /// Simulated time to run for (seconds). 0 means run while kept alive.
    pub duration: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            voltage_difference_max: DEFAULT_VOLTAGE_DIFFERENCE_MAX,
            time_step_max: DEFAULT_TIME_STEP_MAX,
            duration: DEFAULT_DURATION,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default maximum voltage change per step (in volts).
    ///
    /// This is the accuracy knob: the step shrinks so that no node moves
    /// by more than this amount.
    /// - 50e-6 (default): precise, slow for fast edges
    /// - 1e-3: good enough for most switching circuits
    pub fn with_voltage_difference_max(mut self, value: f64) -> Self {
        self.voltage_difference_max = value;
        self
    }

    /// Set the maximum time step (in seconds).
    pub fn with_time_step_max(mut self, value: f64) -> Self {
        self.time_step_max = value;
        self
    }

    /// Set the run duration (in seconds); 0 runs until no component keeps the run alive.
    pub fn with_duration(mut self, value: f64) -> Self {
        self.duration = value;
        self
    }

    /// Duration with the "0 means forever" convention applied.
    pub fn effective_duration(&self) -> f64 {
        if self.duration == 0.0 {
            f64::INFINITY
        } else {
            self.duration
        }
    }

    /// Check every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(SimError::invalid_parameter(
                    name,
                    format!("must be finite and greater than 0, got {}", value),
                ))
            }
        };
        positive("vd-max", self.voltage_difference_max)?;
        positive("ts-max", self.time_step_max)?;
        if self.duration < 0.0 || self.duration.is_nan() {
            return Err(SimError::invalid_parameter(
                "duration",
                format!("must not be negative, got {}", self.duration),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No components yet
    Idle,
    /// Components present, not yet run
    Configured,
    /// Setup done and supernodes built
    Initialized,
    /// Inside the integration loop
    Running,
    /// The run finished; a simulator runs once
    Complete,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Number of integration steps taken
    pub iterations: u64,
    /// Simulated time reached (seconds)
    pub time: f64,
    /// Number of supernodes solved during the run
    pub supernodes: usize,
}

/// The main circuit simulator.
///
/// Borrows a configured [`Circuit`] for one run.
pub struct Simulator<'a> {
    /// The circuit being simulated
    circuit: &'a mut Circuit,
    /// Global parameters
    config: SimulatorConfig,
    /// Supernodes created by the components during setup
    supernodes: SupernodeArena,
    /// Printables that were active when the run started
    active_printables: Vec<PrintableInfo>,
    state: RunState,
    time: f64,
    iterations: u64,
}

impl<'a> Simulator<'a> {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: &'a mut Circuit) -> Self {
        Self::with_config(circuit, SimulatorConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(circuit: &'a mut Circuit, config: SimulatorConfig) -> Self {
        let state = if circuit.components.is_empty() {
            RunState::Idle
        } else {
            RunState::Configured
        };
        Self {
            circuit,
            config,
            supernodes: SupernodeArena::new(),
            active_printables: Vec::new(),
            state,
            time: 0.0,
            iterations: 0,
        }
    }

    fn ensure_configurable(&self, action: &'static str) -> Result<()> {
        match self.state {
            RunState::Idle | RunState::Configured => Ok(()),
            RunState::Complete => Err(SimError::RunComplete),
            RunState::Initialized | RunState::Running => Err(SimError::InSimulation { action }),
        }
    }

    /// Add a node to the borrowed circuit.
    pub fn add_node(&mut self, label: &str, capacitance: f64) -> Result<NodeId> {
        self.ensure_configurable("add node")?;
        self.circuit.add_node(label, capacitance)
    }

    /// Add a component to the borrowed circuit.
    pub fn add_component(&mut self, component: Box<dyn Component>) -> Result<ComponentId> {
        self.ensure_configurable("add component")?;
        let id = self.circuit.add_component(component)?;
        self.state = RunState::Configured;
        Ok(id)
    }

    pub fn set_duration(&mut self, value: f64) -> Result<()> {
        self.ensure_configurable("modify \"duration\"")?;
        self.config.duration = value;
        Ok(())
    }

    pub fn set_time_step_max(&mut self, value: f64) -> Result<()> {
        self.ensure_configurable("modify \"time_step_max\"")?;
        self.config.time_step_max = value;
        Ok(())
    }

    pub fn set_voltage_difference_max(&mut self, value: f64) {
        self.config.voltage_difference_max = value;
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Simulated time reached so far.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn circuit(&self) -> &Circuit {
        self.circuit
    }

    pub fn supernodes(&self) -> &SupernodeArena {
        &self.supernodes
    }

    /// Run the simulation to completion.
    ///
    /// Every component gets `simulation_complete` once the loop exits, even
    /// when the loop stopped on an error.
    pub fn simulate(&mut self) -> Result<RunSummary> {
        match self.state {
            RunState::Complete => return Err(SimError::RunComplete),
            RunState::Initialized | RunState::Running => {
                return Err(SimError::InSimulation { action: "simulate" })
            }
            RunState::Idle | RunState::Configured => {}
        }
        self.config.validate()?;

        let outcome = self.initialize().and_then(|supernodes| {
            self.state = RunState::Running;
            self.run_loop().map(|()| supernodes)
        });
        self.state = RunState::Complete;

        let mut completion = Ok(());
        for component in self.circuit.components.iter_mut() {
            if let Err(e) = component.simulation_complete() {
                completion = completion.and(Err(e));
            }
        }

        let supernodes = outcome?;
        completion?;

        info!(
            "simulation complete: {} iterations, t = {:.6e} s",
            self.iterations, self.time
        );
        Ok(RunSummary {
            iterations: self.iterations,
            time: self.time,
            supernodes,
        })
    }

    /// Reset node state, run the component setup hooks and build the supernodes.
    fn initialize(&mut self) -> Result<usize> {
        let circuit = &mut *self.circuit;
        let config = &self.config;

        for node in circuit.nodes.iter_mut() {
            node.resolve_voltage_difference_max(config.voltage_difference_max);
            node.clear();
        }

        self.active_printables = circuit
            .printables
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();

        self.supernodes.clear();
        for (index, component) in circuit.components.iter_mut().enumerate() {
            let mut ctx = SetupContext {
                nodes: &mut circuit.nodes,
                supernodes: &mut self.supernodes,
                owner: ComponentId(index),
                config,
            };
            component.setup(&mut ctx);
        }
        for component in circuit.components.iter_mut() {
            component.setup_printer(&circuit.nodes, &self.active_printables)?;
        }
        for component in circuit.components.iter_mut() {
            component.clear_variables();
        }

        let live = self.supernodes.live(&circuit.nodes);
        for &id in &live {
            if let Some(supernode) = self.supernodes.get_mut(id) {
                supernode.init(&circuit.nodes, &circuit.components)?;
                supernode.fix_divergence(&mut circuit.nodes, &circuit.components);
            }
        }

        self.time = 0.0;
        self.iterations = 0;
        self.state = RunState::Initialized;
        info!(
            "simulation start: {} nodes, {} components, {} supernodes, duration {:.3e} s",
            circuit.nodes.len(),
            circuit.components.len(),
            live.len(),
            config.duration
        );
        Ok(live.len())
    }

    fn run_loop(&mut self) -> Result<()> {
        let duration = self.config.effective_duration();
        let repair_threshold = self.config.voltage_difference_max * REPAIR_THRESHOLD_RATIO;
        let live = self.supernodes.live(&self.circuit.nodes);

        let mut time_step = 0.0;
        let mut values = vec![0.0; self.active_printables.len()];

        while self.time < duration && self.is_alive(self.time) {
            let time = self.time;
            let circuit = &mut *self.circuit;

            for (value, printable) in values.iter_mut().zip(&self.active_printables) {
                *value = circuit.components[printable.owner.0].printable(printable.slot);
            }
            let frame = PrintFrame {
                nodes: &circuit.nodes,
                printables: &self.active_printables,
                values: &values,
            };
            for component in circuit.components.iter_mut() {
                component.printer(&frame, time, time_step, self.iterations)?;
            }

            self.iterations += 1;

            while self.is_paused(time) {
                self.wait();
            }

            let circuit = &mut *self.circuit;
            for node in circuit.nodes.iter_mut() {
                node.begin_iteration();
            }
            for component in circuit.components.iter_mut() {
                component.update(&mut circuit.nodes, time, time_step);
            }
            for &id in &live {
                if let Some(supernode) = self.supernodes.get_mut(id) {
                    supernode.update(&mut circuit.nodes, &circuit.components);
                }
            }

            time_step = self.time_step(time);

            let circuit = &mut *self.circuit;
            for &id in &live {
                if let Some(supernode) = self.supernodes.get_mut(id) {
                    if supernode.fix_divergence_if(
                        &mut circuit.nodes,
                        &circuit.components,
                        repair_threshold,
                    ) {
                        debug!("{} repaired at t = {:.6e} s", id, time);
                    }
                }
            }
            for &id in &live {
                if let Some(supernode) = self.supernodes.get_mut(id) {
                    supernode.apply_iteration(&mut circuit.nodes, &mut circuit.components, time_step);
                }
            }
            for node in circuit.nodes.iter_mut() {
                if !node.is_redirecting_to_supernode() {
                    node.apply_iteration(time_step);
                }
            }

            self.time += time_step;

            for component in circuit.components.iter_mut() {
                component.post_update(self.time, time_step);
            }
        }
        Ok(())
    }

    /// Largest step that keeps every node within its voltage limit and
    /// honours every component's request.
    pub fn time_step(&self, time: f64) -> f64 {
        let mut smallest = self.config.time_step_max;

        for (_, node) in self.circuit.nodes.iter() {
            let derivative = node.voltage_derivative();
            if derivative != 0.0 {
                smallest = smallest.min(node.voltage_difference_max() / derivative.abs());
            }
        }
        for component in &self.circuit.components {
            let requested = component.time_step_max(time);
            if requested > 0.0 && requested < smallest {
                smallest = requested;
            }
        }
        smallest
    }

    /// True while at least one component keeps the run alive.
    pub fn is_alive(&self, time: f64) -> bool {
        self.circuit
            .components
            .iter()
            .any(|c| c.keep_simulation_alive(time))
    }

    /// True while at least one component asks to pause.
    pub fn is_paused(&self, time: f64) -> bool {
        self.circuit
            .components
            .iter()
            .any(|c| c.pause_simulation(time))
    }

    fn wait(&self) {
        thread::sleep(Duration::from_millis(PAUSE_INTERVAL_MS));
    }
}

//! Model registry: maps model names to constructors.

use std::collections::BTreeMap;

use super::{
    Ammeter, Capacitor, Component, CsvPrinter, CurrentDc, Inductor, Resistor, VoltageAc,
    VoltageAcRes, VoltageDc, VoltageDcRes, VoltageSquare, Wire,
};

/// Builds an unconfigured component with the given label.
pub type Constructor = fn(String) -> Box<dyn Component>;

/// Explicit table of the models a netlist may instantiate.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in model.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("resistor", |label| Box::new(Resistor::unconfigured(label)));
        registry.register("capacitor", |label| Box::new(Capacitor::unconfigured(label)));
        registry.register("inductor", |label| Box::new(Inductor::unconfigured(label)));
        registry.register("wire", |label| Box::new(Wire::unconfigured(label)));
        registry.register("ammeter", |label| Box::new(Ammeter::unconfigured(label)));
        registry.register("voltage-dc", |label| Box::new(VoltageDc::unconfigured(label)));
        registry.register("voltage-dc-res", |label| {
            Box::new(VoltageDcRes::unconfigured(label))
        });
        registry.register("voltage-ac", |label| Box::new(VoltageAc::unconfigured(label)));
        registry.register("voltage-ac-res", |label| {
            Box::new(VoltageAcRes::unconfigured(label))
        });
        registry.register("voltage-square", |label| {
            Box::new(VoltageSquare::unconfigured(label))
        });
        registry.register("current-dc", |label| Box::new(CurrentDc::unconfigured(label)));
        registry.register("printer-csv", |label| Box::new(CsvPrinter::unconfigured(label)));
        registry
    }

    /// Register `model`, replacing any previous constructor with that name.
    pub fn register(&mut self, model: &str, constructor: Constructor) {
        self.constructors.insert(model.to_string(), constructor);
    }

    /// Build an unconfigured instance of `model`.
    pub fn build(&self, model: &str, label: &str) -> Option<Box<dyn Component>> {
        self.constructors
            .get(model)
            .map(|constructor| constructor(label.to_string()))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.constructors.contains_key(model)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Help string of `model`.
    pub fn help(&self, model: &str) -> Option<&'static str> {
        self.build(model, "help").map(|component| component.help())
    }
}

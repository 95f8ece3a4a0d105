//! Configuration-time context handed to device models.
//!
//! A model consumes its argument tail through [`ConfigContext`], resolving
//! existing nodes and registering printables as it goes. Everything it reports ends
//! up in a [`ConfigLog`]; a single `[ERROR]` line rejects the component.

use std::collections::HashMap;
use std::fmt;
use std::str::SplitWhitespace;

use crate::circuit::{ComponentId, NodeId, PrintableInfo};
use crate::dsl::parse_value;

/// Severity of a configuration log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

/// One line of a configuration log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Structured log produced while configuring a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLog {
    lines: Vec<LogLine>,
}

impl ConfigLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.lines.push(LogLine {
            level,
            message: message.into(),
        });
    }

    /// True when no `[ERROR]` line was recorded.
    pub fn is_ok(&self) -> bool {
        self.lines.iter().all(|l| l.level != LogLevel::Error)
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Messages of the `[ERROR]` lines.
    pub fn errors(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| l.level == LogLevel::Error)
            .map(|l| l.message.clone())
            .collect()
    }

    /// Forward every line to the `log` facade, prefixed with `<model> label:`.
    pub fn emit(&self, label: &str, model: &str) {
        for line in &self.lines {
            match line.level {
                LogLevel::Info => log::info!("<{}> {}: {}", model, label, line.message),
                LogLevel::Warning => log::warn!("<{}> {}: {}", model, label, line.message),
                LogLevel::Error => log::error!("<{}> {}: {}", model, label, line.message),
            }
        }
    }
}

impl fmt::Display for ConfigLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{} {}", line.level.tag(), line.message)?;
        }
        Ok(())
    }
}

/// Everything a model may touch while it is being configured.
pub struct ConfigContext<'a> {
    node_map: &'a HashMap<String, NodeId>,
    printables: &'a mut Vec<PrintableInfo>,
    owner: ComponentId,
    label: &'a str,
    args: SplitWhitespace<'a>,
    log: ConfigLog,
}

impl<'a> ConfigContext<'a> {
    pub fn new(
        node_map: &'a HashMap<String, NodeId>,
        printables: &'a mut Vec<PrintableInfo>,
        owner: ComponentId,
        label: &'a str,
        args: &'a str,
    ) -> Self {
        Self {
            node_map,
            printables,
            owner,
            label,
            args: args.split_whitespace(),
            log: ConfigLog::new(),
        }
    }

    /// Label of the component being configured.
    pub fn label(&self) -> &str {
        self.label
    }

    /// Next raw argument, if any.
    pub fn word(&mut self) -> Option<&'a str> {
        self.args.next()
    }

    /// Resolve the next argument as an existing node.
    pub fn find_node(&mut self) -> Option<NodeId> {
        let Some(name) = self.args.next() else {
            self.log.error("missing node argument");
            return None;
        };
        match self.node_map.get(name) {
            Some(&id) => {
                self.log.info(format!("found node \"{}\"", name));
                Some(id)
            }
            None => {
                self.log.error(format!("node \"{}\" not found", name));
                None
            }
        }
    }

    /// Parse the next argument as a value, falling back to `default` when absent.
    pub fn value(&mut self, param: &str, default: f64) -> f64 {
        match self.args.next() {
            None => default,
            Some(text) => match parse_value(text) {
                Some(v) => v,
                None => {
                    self.log
                        .error(format!("\"{}\" expects a number, got \"{}\"", param, text));
                    default
                }
            },
        }
    }

    /// Parse the next argument as a mandatory value.
    pub fn required_value(&mut self, param: &str) -> Option<f64> {
        let Some(text) = self.args.next() else {
            self.log.error(format!("missing argument \"{}\"", param));
            return None;
        };
        let value = parse_value(text);
        if value.is_none() {
            self.log
                .error(format!("\"{}\" expects a number, got \"{}\"", param, text));
        }
        value
    }

    /// Parse the next argument as `true`/`false`, falling back to `default`.
    pub fn flag(&mut self, param: &str, default: bool) -> bool {
        match self.args.next() {
            None => default,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                self.log
                    .error(format!("\"{}\" expects true or false, got \"{}\"", param, other));
                default
            }
        }
    }

    /// Register `<label>:<quantity>` as a printable slot.
    pub fn add_printable(&mut self, quantity: &str, unit: &'static str, slot: usize) {
        let name = format!("{}:{}", self.label, quantity);
        if self.printables.iter().any(|p| p.name == name) {
            self.log
                .error(format!("a printable named {} already exists", name));
            return;
        }
        self.log.info(format!("created printable {}", name));
        self.printables.push(PrintableInfo {
            name,
            unit,
            owner: self.owner,
            slot,
            is_active: false,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log.info(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log.warn(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log.error(message);
    }

    /// True while no error has been recorded.
    pub fn is_ok(&self) -> bool {
        self.log.is_ok()
    }

    /// Consume the context, warning about unused arguments.
    pub fn finish(mut self) -> ConfigLog {
        let rest: Vec<&str> = self.args.by_ref().collect();
        if !rest.is_empty() {
            self.log
                .warn(format!("ignoring extra arguments: {}", rest.join(" ")));
        }
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Node, Nodes};

    #[test]
    fn test_config_log_levels() {
        let mut log = ConfigLog::new();
        log.info("fine");
        log.warn("careful");
        assert!(log.is_ok());
        log.error("broken");
        assert!(!log.is_ok());
        assert_eq!(log.errors(), vec!["broken".to_string()]);
        assert_eq!(
            log.to_string(),
            "[INFO] fine\n[WARNING] careful\n[ERROR] broken\n"
        );
    }

    #[test]
    fn test_context_values_and_nodes() {
        let mut nodes = Nodes::new();
        let mut node_map = HashMap::new();
        let mut printables = Vec::new();
        let a = nodes.push(Node::new("a", 1e-9));
        node_map.insert("a".to_string(), a);

        let mut ctx = ConfigContext::new(
            &node_map,
            &mut printables,
            ComponentId(0),
            "R1",
            "a missing 4.7k junk",
        );
        assert_eq!(ctx.find_node(), Some(a));
        assert_eq!(ctx.find_node(), None);
        assert_eq!(ctx.value("resistance", 1.0), 4700.0);
        assert_eq!(ctx.value("other", 2.0), 2.0);
        assert_eq!(ctx.value("absent", 3.0), 3.0);
        ctx.add_printable("i", "A", 0);
        let log = ctx.finish();

        assert_eq!(log.errors().len(), 2);
        assert_eq!(printables[0].name, "R1:i");
        assert!(!printables[0].is_active);
    }

    #[test]
    fn test_unused_arguments_warn() {
        let node_map = HashMap::new();
        let mut printables = Vec::new();
        let ctx = ConfigContext::new(
            &node_map,
            &mut printables,
            ComponentId(0),
            "X",
            "extra",
        );
        let log = ctx.finish();
        assert!(log.is_ok());
        assert_eq!(log.lines()[0].level, LogLevel::Warning);
    }
}

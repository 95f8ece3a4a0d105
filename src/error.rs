//! Error types for the capsim circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! netlist parsing, circuit configuration, supernode construction and
//! run-state violations.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all capsim operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    // ============ Configuration Errors ============
    /// No model registered under this name
    #[error("Unknown component model '{model}'")]
    UnknownModel { model: String },

    /// A node with this label already exists
    #[error("Duplicate node '{name}'")]
    DuplicateNode { name: String },

    /// A component with this label already exists
    #[error("Duplicate component '{name}'")]
    DuplicateComponent { name: String },

    /// Node not found in circuit
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Printable not found in circuit
    #[error("Printable '{name}' not found in circuit")]
    PrintableNotFound { name: String },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// A component rejected its configuration; the circuit was rolled back
    #[error("Component '{component}' ({model}) rejected its configuration: {}", .errors.join("; "))]
    Configuration {
        component: String,
        model: String,
        errors: Vec<String>,
    },

    // ============ Solver Errors ============
    /// The extended system of a supernode cannot be inverted
    #[error("Singular supernode system ({nodes} nodes, {ideal} ideal links) - check for floating clusters")]
    SingularSupernode { nodes: usize, ideal: usize },

    /// Ideal links closing a loop (including a loop through ground)
    #[error("Ideal link of component '{component}' closes a loop of ideal elements between '{pos}' and '{neg}'")]
    IdealLoop {
        component: String,
        pos: String,
        neg: String,
    },

    /// Operation not allowed while a run is active
    #[error("Cannot {action} while in simulation")]
    InSimulation { action: &'static str },

    /// The simulator already completed its run
    #[error("Simulation already complete - configure a new simulator to run again")]
    RunComplete,

    // ============ I/O Errors ============
    /// Error reading a netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing printer output
    #[error("Printer output error on '{path}': {source}")]
    OutputError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a printer output error
    pub fn output(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::OutputError {
            path: path.into(),
            source,
        }
    }
}

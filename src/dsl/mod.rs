//! Netlist language: a line-oriented command script describing a circuit
//! and the runs to perform on it.
//!
//! # Grammar Overview
//!
//! ```text
//! script      = { line }
//! line        = [ command ] [ comment ] newline
//! comment     = ('#' | ';') { any_char }
//! command     = node | component | edit | param | print | "run"
//!
//! node        = "node" label value
//! component   = "component" label model { word }
//! edit        = "edit" "node" label ( ("gnd" | "hide") [bool]
//!                                   | ("capacitance" | "vd-max") value )
//! param       = "param" ("vd-max" | "ts-max" | "duration") value
//! print       = "print" "var" printable [bool]
//!
//! value       = ['-'|'+'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+] [suffix]
//! suffix      = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! bool        = "true" | "false"
//! word        = any run of non-blank characters
//! ```
//!
//! Component arguments are handed to the model unparsed; see
//! [`crate::components::Registry::help`] for each model's argument table.
//!
//! # Example
//!
//! ```text
//! # RC charging
//! node gnd 1n
//! edit node gnd gnd true
//! node out 1n
//!
//! component V1 voltage-dc-res out gnd 5 1k
//! component C1 capacitor out gnd 1u
//! component P1 printer-csv points 100 rc.csv
//! param duration 5m
//! run
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_bool, parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{Result, SimError};

/// Parse a netlist string into commands.
pub fn parse(input: &str) -> Result<Netlist> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a netlist file.
pub fn parse_file(path: &std::path::Path) -> Result<Netlist> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}

//! Parser for the netlist language.

use super::ast::*;
use super::lexer::{parse_bool, parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, SimError};

/// Parser for netlist scripts.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(lexer: Lexer<'a>) -> Self {
        // Start on a virtual newline so the first advance reads line 1
        Self {
            lexer,
            current: Token {
                kind: TokenKind::Newline,
                text: "\n".to_string(),
                line: 0,
                column: 0,
            },
        }
    }

    /// Parse the entire script.
    pub fn parse(&mut self) -> Result<Netlist> {
        let mut netlist = Netlist::new();

        loop {
            match self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => self.advance()?,
                TokenKind::Identifier => {
                    let command = self.parse_command()?;
                    netlist.commands.push(command);
                    self.expect_end_of_line()?;
                }
                TokenKind::Number => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("expected a command, got {:?}", self.current.text),
                    ));
                }
            }
        }

        Ok(netlist)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn at_end_of_line(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn expect_end_of_line(&mut self) -> Result<()> {
        if self.at_end_of_line() {
            Ok(())
        } else {
            Err(SimError::parse(
                self.current.line,
                format!("unexpected trailing argument {:?}", self.current.text),
            ))
        }
    }

    /// Take the current token as a word of any kind, failing at end of line.
    fn word(&mut self, what: &str) -> Result<Token> {
        if self.at_end_of_line() {
            return Err(SimError::parse(self.current.line, format!("expected {}", what)));
        }
        let tok = self.current.clone();
        self.advance()?;
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.current.kind == kind {
            self.word(what)
        } else {
            Err(SimError::parse(
                self.current.line,
                format!("expected {}, got {:?}", what, self.current.text),
            ))
        }
    }

    fn number(&mut self, what: &str) -> Result<f64> {
        let tok = self.expect(TokenKind::Number, what)?;
        parse_value(&tok.text)
            .ok_or_else(|| SimError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    fn boolean(&mut self, what: &str) -> Result<bool> {
        let tok = self.word(what)?;
        parse_bool(&tok.text).ok_or_else(|| {
            SimError::parse(
                tok.line,
                format!("{} expects true or false, got {:?}", what, tok.text),
            )
        })
    }

    /// A trailing boolean that defaults to true when omitted.
    fn optional_boolean(&mut self, what: &str) -> Result<bool> {
        if self.at_end_of_line() {
            Ok(true)
        } else {
            self.boolean(what)
        }
    }

    fn parse_command(&mut self) -> Result<Command> {
        let line = self.current.line;
        let keyword = self.current.text.clone();
        self.advance()?;

        let kind = match keyword.as_str() {
            "node" => {
                let label = self.word("node label")?.text;
                let capacitance = self.number("node capacitance")?;
                CommandKind::Node { label, capacitance }
            }
            "component" => {
                let label = self.word("component label")?.text;
                let model = self.expect(TokenKind::Identifier, "component model")?.text;
                let mut args = Vec::new();
                while !self.at_end_of_line() {
                    args.push(self.current.text.clone());
                    self.advance()?;
                }
                CommandKind::Component {
                    label,
                    model,
                    args: args.join(" "),
                }
            }
            "edit" => self.parse_edit(line)?,
            "param" => {
                let name = self.expect(TokenKind::Identifier, "parameter name")?;
                let param = SimParam::from_name(&name.text).ok_or_else(|| {
                    SimError::parse(line, format!("unknown parameter {:?}", name.text))
                })?;
                let value = self.number(param.name())?;
                CommandKind::Param { param, value }
            }
            "print" => {
                let what = self.expect(TokenKind::Identifier, "print target")?;
                if what.text != "var" {
                    return Err(SimError::parse(
                        line,
                        format!("unknown print target {:?}", what.text),
                    ));
                }
                let name = self.word("printable name")?.text;
                let active = self.optional_boolean("print var")?;
                CommandKind::PrintVar { name, active }
            }
            "run" => CommandKind::Run,
            other => {
                return Err(SimError::parse(line, format!("unknown command {:?}", other)));
            }
        };

        Ok(Command { kind, line })
    }

    fn parse_edit(&mut self, line: usize) -> Result<CommandKind> {
        let target = self.expect(TokenKind::Identifier, "edit target")?;
        if target.text != "node" {
            return Err(SimError::parse(
                line,
                format!("unknown edit target {:?}", target.text),
            ));
        }
        let label = self.word("node label")?.text;
        let field = self.expect(TokenKind::Identifier, "node field")?;
        let edit = match field.text.as_str() {
            "gnd" => NodeEdit::Ground(self.optional_boolean("gnd")?),
            "hide" => NodeEdit::Hidden(self.optional_boolean("hide")?),
            "capacitance" => NodeEdit::Capacitance(self.number("capacitance")?),
            "vd-max" => NodeEdit::VoltageDifferenceMax(self.number("vd-max")?),
            other => {
                return Err(SimError::parse(
                    line,
                    format!("unknown node field {:?}", other),
                ));
            }
        };
        Ok(CommandKind::EditNode { label, edit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn test_parse_node_and_component() {
        let input = "node a 1n\ncomponent R1 resistor a gnd 10k";
        let netlist = parse(input).unwrap();
        assert_eq!(netlist.len(), 2);
        assert_eq!(
            netlist.commands[0].kind,
            CommandKind::Node {
                label: "a".to_string(),
                capacitance: 1e-9
            }
        );
        assert_eq!(
            netlist.commands[1].kind,
            CommandKind::Component {
                label: "R1".to_string(),
                model: "resistor".to_string(),
                args: "a gnd 10k".to_string(),
            }
        );
        assert_eq!(netlist.commands[1].line, 2);
    }

    #[test]
    fn test_parse_edit_param_print_run() {
        let input = "edit node gnd gnd true\n\
                     edit node a hide\n\
                     edit node a vd-max 1m\n\
                     param duration 5m\n\
                     print var R1:i false\n\
                     run\n";
        let netlist = parse(input).unwrap();
        let kinds: Vec<CommandKind> = netlist.commands.into_iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CommandKind::EditNode {
                    label: "gnd".to_string(),
                    edit: NodeEdit::Ground(true)
                },
                CommandKind::EditNode {
                    label: "a".to_string(),
                    edit: NodeEdit::Hidden(true)
                },
                CommandKind::EditNode {
                    label: "a".to_string(),
                    edit: NodeEdit::VoltageDifferenceMax(1e-3)
                },
                CommandKind::Param {
                    param: SimParam::Duration,
                    value: 5e-3
                },
                CommandKind::PrintVar {
                    name: "R1:i".to_string(),
                    active: false
                },
                CommandKind::Run,
            ]
        );
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# header\n\nnode a 1n ; trailing\n  ; indented\nrun";
        let netlist = parse(input).unwrap();
        assert_eq!(netlist.len(), 2);
        assert_eq!(netlist.commands[1].line, 5);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse("node a 1n\nnode b\n").unwrap_err();
        assert!(matches!(err, SimError::ParseError { line: 2, .. }));

        let err = parse("run\nparam speed 3\n").unwrap_err();
        assert!(matches!(err, SimError::ParseError { line: 2, .. }));

        let err = parse("frobnicate\n").unwrap_err();
        assert!(matches!(err, SimError::ParseError { line: 1, .. }));

        let err = parse("run now\n").unwrap_err();
        assert!(matches!(err, SimError::ParseError { line: 1, .. }));

        let err = parse("print var R1:i perhaps\n").unwrap_err();
        assert!(matches!(err, SimError::ParseError { line: 1, .. }));
    }
}

//! Lexer (tokenizer) for the netlist language.

use crate::error::{Result, SimError};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the netlist language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A keyword, label, model name, path or flag
    Identifier,
    /// A number, possibly signed and with an SI suffix
    Number,
    /// Newline
    Newline,
    /// End of file
    Eof,
}

/// Lexer for tokenizing netlist input.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let start_line = self.line;
        let start_column = self.column;

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line: start_line,
                column: start_column,
            });
        };

        if ch == '\n' {
            self.advance();
            return Ok(Token {
                kind: TokenKind::Newline,
                text: "\n".to_string(),
                line: start_line,
                column: start_column,
            });
        }

        if ch.is_control() {
            return Err(SimError::lexer(
                start_line,
                start_column,
                format!("unexpected character {:?}", ch),
            ));
        }

        let text = self.read_word();
        let kind = if looks_like_number(&text) {
            TokenKind::Number
        } else {
            TokenKind::Identifier
        };
        Ok(Token {
            kind,
            text,
            line: start_line,
            column: start_column,
        })
    }

    /// Tokenize the whole input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' | ';' => {
                    // Comment runs to end of line; the newline itself is a token
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '#' || ch == ';' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }
}

fn suffix_multiplier(suffix: char) -> Option<f64> {
    match suffix {
        'p' => Some(1e-12),
        'n' => Some(1e-9),
        'u' | 'µ' => Some(1e-6),
        'm' => Some(1e-3),
        'k' | 'K' => Some(1e3),
        'M' => Some(1e6),
        'G' => Some(1e9),
        _ => None,
    }
}

/// Check whether `text` is a number with an optional sign, exponent and unit suffix.
fn looks_like_number(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
        i += 1;
    }

    let mut has_digits = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        has_digits = true;
        i += 1;
    }

    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            has_digits = true;
            i += 1;
        }
    }

    if !has_digits {
        return false;
    }

    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '-' || chars[j] == '+') {
            j += 1;
        }
        let exponent_start = j;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        if j > exponent_start {
            i = j;
        }
    }

    if i < chars.len() && suffix_multiplier(chars[i]).is_some() {
        i += 1;
    }

    i == chars.len()
}

/// Parse a number string with optional unit suffix.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let last = text.chars().last()?;

    let (num_str, multiplier) = match suffix_multiplier(last) {
        Some(mult) => (&text[..text.len() - last.len_utf8()], mult),
        None => (text, 1.0),
    };

    num_str.parse::<f64>().ok().map(|v| v * multiplier)
}

/// Parse `true`/`false` (also `1`/`0`, `yes`/`no`, `on`/`off`).
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(x), Some(y)) => (x - y).abs() < x.abs() * 1e-10 + 1e-15,
            (None, None) => true,
            _ => false,
        }
    }

    #[test]
    fn test_parse_value() {
        assert!(approx_eq(parse_value("10k"), Some(10_000.0)));
        assert!(approx_eq(parse_value("100n"), Some(100e-9)));
        assert!(approx_eq(parse_value("4.7u"), Some(4.7e-6)));
        assert!(approx_eq(parse_value("1M"), Some(1_000_000.0)));
        assert!(approx_eq(parse_value("2.2"), Some(2.2)));
        assert!(approx_eq(parse_value("1e-9"), Some(1e-9)));
        assert!(approx_eq(parse_value("-5m"), Some(-5e-3)));
        assert!(approx_eq(parse_value("gnd"), None));
        assert!(approx_eq(parse_value(""), None));
    }

    #[test]
    fn test_lexer_basic() {
        let input = "component R1 resistor in out 10k";
        let tokens = Lexer::new(input).tokenize().unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[5].text, "10k");
        assert_eq!(tokens[5].column, 30);
    }

    #[test]
    fn test_lexer_words_and_comments() {
        let input = "print var R1:i true # enable\n; whole line\nnode out.csv 1e-9";
        let tokens = Lexer::new(input).tokenize().unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["print", "var", "R1:i", "true", "\n", "\n", "node", "out.csv", "1e-9", ""]
        );
        assert_eq!(tokens[6].line, 3);
        assert_eq!(tokens[7].kind, TokenKind::Identifier);
        assert_eq!(tokens[8].kind, TokenKind::Number);
    }

    #[test]
    fn test_model_names_are_identifiers() {
        let tokens = Lexer::new("voltage-dc -1.5 1e 2k5").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}

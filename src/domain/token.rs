// src/domain/token.rs
//! Tokenizer for serialized legacy domains
//!
//! A domain is written as a Python-style list literal:
//!
//! ```text
//! ['|', ('state', '=', 'draft'), '&', ('active', '=', False), ('qty', '>', 0)]
//! ```
//!
//! String items are prefix operator markers (`'&'`, `'|'`, `'!'`), tuple items
//! are condition triples. Field names and operators must be quoted strings;
//! values are captured verbatim so quoting survives translation.

use super::error::ParseError;

/// Comparison operator of a condition triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    /// Infix spelling used in the rendered expression
    pub fn infix(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

impl std::str::FromStr for CompareOp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            other => Err(ParseError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// A `(field, operator, value)` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    /// Raw value text, e.g. `'draft'`, `False`, `[]`, `parent.company_id`
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// One element of a prefix domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    And,
    Or,
    Not,
    Cond(Condition),
}

impl Token {
    /// True for the two binary markers
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// Scan a serialized domain into tokens
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_ws();
    scanner.expect('[')?;

    let mut tokens = Vec::new();
    loop {
        scanner.skip_ws();
        match scanner.peek() {
            Some(']') => {
                scanner.bump();
                break;
            }
            Some('\'') | Some('"') => {
                let start = scanner.pos;
                let marker = scanner.string()?;
                tokens.push(match marker.as_str() {
                    "&" => Token::And,
                    "|" => Token::Or,
                    "!" => Token::Not,
                    other => {
                        return Err(ParseError::syntax(
                            start,
                            format!("unknown operator marker '{}'", other),
                        ));
                    }
                });
            }
            Some('(') | Some('[') => tokens.push(Token::Cond(scanner.triple()?)),
            Some(c) => {
                return Err(ParseError::syntax(
                    scanner.pos,
                    format!("unexpected character '{}'", c),
                ));
            }
            None => return Err(ParseError::syntax(scanner.pos, "unterminated domain")),
        }

        scanner.skip_ws();
        match scanner.peek() {
            Some(',') => {
                scanner.bump();
            }
            Some(']') => {}
            Some(c) => {
                return Err(ParseError::syntax(
                    scanner.pos,
                    format!("expected ',' or ']', found '{}'", c),
                ));
            }
            None => return Err(ParseError::syntax(scanner.pos, "unterminated domain")),
        }
    }

    scanner.skip_ws();
    if !scanner.at_end() {
        return Err(ParseError::syntax(scanner.pos, "trailing characters after domain"));
    }
    Ok(tokens)
}

/// Insert the implicit `'&'` markers the legacy language assumes
///
/// Top-level terms without an explicit operator are ANDed. Domains with too
/// many binary markers are returned as-is and fail translation.
pub fn normalize(tokens: Vec<Token>) -> Vec<Token> {
    let triples = tokens.iter().filter(|t| matches!(t, Token::Cond(_))).count();
    let operators = tokens.iter().filter(|t| t.is_binary()).count();

    if triples == 0 || operators + 1 >= triples {
        return tokens;
    }

    let missing = triples - 1 - operators;
    let mut normalized = Vec::with_capacity(tokens.len() + missing);
    normalized.extend(std::iter::repeat_n(Token::And, missing));
    normalized.extend(tokens);
    normalized
}

/// Split a serialized `{'key': <domain>, ...}` mapping into its entries
///
/// Values are returned as raw text for [`tokenize`]. Keys keep source order.
pub fn split_dict(text: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_ws();
    scanner.expect('{')?;

    let mut entries = Vec::new();
    loop {
        scanner.skip_ws();
        if scanner.peek() == Some('}') {
            scanner.bump();
            break;
        }
        let key = scanner.string()?;
        scanner.skip_ws();
        scanner.expect(':')?;
        scanner.skip_ws();
        let value = scanner.value('}')?;
        entries.push((key.trim().to_string(), value));

        scanner.skip_ws();
        match scanner.bump() {
            Some(',') => {}
            Some('}') => break,
            Some(c) => {
                return Err(ParseError::syntax(
                    scanner.pos - c.len_utf8(),
                    format!("expected ',' or '}}', found '{}'", c),
                ));
            }
            None => return Err(ParseError::syntax(scanner.pos, "unterminated mapping")),
        }
    }

    scanner.skip_ws();
    if !scanner.at_end() {
        return Err(ParseError::syntax(scanner.pos, "trailing characters after mapping"));
    }
    if entries.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(entries)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(ParseError::syntax(
                self.pos - c.len_utf8(),
                format!("expected '{}', found '{}'", wanted, c),
            )),
            None => Err(ParseError::syntax(self.pos, format!("expected '{}'", wanted))),
        }
    }

    /// Quoted string, returning its unescaped content
    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(ParseError::syntax(start, "expected a quoted string")),
        };

        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(ParseError::syntax(start, "unterminated string"))
    }

    /// `(field, op, value)`, also accepting list brackets
    fn triple(&mut self) -> Result<Condition, ParseError> {
        let close = match self.bump() {
            Some('(') => ')',
            Some('[') => ']',
            _ => return Err(ParseError::syntax(self.pos, "expected a condition")),
        };

        self.skip_ws();
        let field_start = self.pos;
        let field = self.string()?;
        self.skip_ws();
        self.expect(',')?;
        self.skip_ws();
        let op: CompareOp = self.string()?.parse()?;
        self.skip_ws();
        self.expect(',')?;
        self.skip_ws();
        let value = self.value(close)?;
        self.skip_ws();
        if self.peek() == Some(',') {
            self.bump();
            self.skip_ws();
        }
        self.expect(close)?;

        if field.trim().is_empty() {
            return Err(ParseError::syntax(field_start, "empty field name"));
        }
        Ok(Condition::new(field.trim(), op, value))
    }

    /// Raw value text up to the next top-level `,` or the group close
    fn value(&mut self, close: char) -> Result<String, ParseError> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' => {
                    self.string()?;
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth > 0 => depth -= 1,
                ',' if depth == 0 => break,
                c if c == close && depth == 0 => break,
                ')' | ']' | '}' => {
                    return Err(ParseError::syntax(self.pos, format!("unbalanced '{}'", c)));
                }
                _ => {}
            }
            self.bump();
        }

        let raw = self.src[start..self.pos].trim();
        if raw.is_empty() {
            return Err(ParseError::syntax(start, "missing condition value"));
        }
        if self.at_end() {
            return Err(ParseError::syntax(self.pos, "unterminated condition"));
        }
        Ok(raw.to_string())
    }
}

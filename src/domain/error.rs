// src/domain/error.rs
//! Error types for domain expression translation

use thiserror::Error;

/// Errors raised while tokenizing or translating a legacy domain
///
/// All variants are recoverable: the caller keeps the original fragment
/// and records it as unconverted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The domain holds no terms at all
    #[error("empty domain")]
    Empty,

    /// The serialized domain could not be scanned
    #[error("syntax error at offset {position}: {reason}")]
    Syntax { position: usize, reason: String },

    /// Operator markers and condition triples do not balance
    #[error("malformed domain: {triples} condition(s) for {operators} binary operator(s)")]
    Malformed { triples: usize, operators: usize },

    /// A comparison operator with no infix equivalent
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// Basic condition parsing only handles flat domains
    #[error("domain is too complex for basic condition parsing")]
    TooComplex,
}

impl ParseError {
    pub(crate) fn syntax(position: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            reason: reason.into(),
        }
    }
}

// src/domain/mod.rs
//! Legacy domain expression translator
//!
//! Converts the prefix-notation domain mini-language used by legacy view
//! attributes into infix boolean expressions:
//!
//! ```text
//! ['|', ('state', '=', 'draft'), '&', ('active', '=', False), ('qty', '>', 0)]
//!   -> state == 'draft' or (not active and qty > 0)
//! ```
//!
//! Translation runs in three steps: [`tokenize`] scans the serialized list,
//! [`normalize`] inserts implicit AND markers, and [`translate`] reduces the
//! prefix sequence with an explicit stack into a [`BoolExpr`].

mod error;
mod expr;
mod token;
mod translate;

pub use error::ParseError;
pub use expr::BoolExpr;
pub use token::{normalize, split_dict, tokenize, CompareOp, Condition, Token};
pub use translate::{translate, translate_domain, ConditionParsing};

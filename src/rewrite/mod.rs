// src/rewrite/mod.rs
//! Structural rewriter for legacy view markup
//!
//! Two strategies share one interface:
//!
//! - [`TreeStrategy`] parses the buffer leniently and applies the block rules
//!   (discussion panel, settings layout) on the node graph
//! - [`PatternStrategy`] applies the whole rule catalogue as textual
//!   substitutions and works on markup that does not parse at all
//!
//! [`Rewriter`] runs the tree strategy when the buffer parses and always
//! finishes with the pattern strategy, which picks up whatever the tree pass
//! left behind.

mod chatter;
mod markup;
mod pattern;
mod settings;
pub mod source;
pub mod tally;
pub mod tree;

pub use tally::{FileTally, RuleCount, RuleId};
pub use tree::{Document, TreeError};

use crate::domain::ConditionParsing;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a rewrite stage; the stage input is kept when this happens
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("markup tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("rule {rule} failed: {source}")]
    Rule {
        rule: RuleId,
        #[source]
        source: TreeError,
    },
}

impl RewriteError {
    /// Rule the failure is charged to
    pub fn rule(&self) -> Option<RuleId> {
        match self {
            Self::Tree(_) => None,
            Self::Rule { rule, .. } => Some(*rule),
        }
    }
}

/// A rewrite strategy over a whole buffer
pub trait RewriteStrategy {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Rewrite `content`, recording what changed in `tally`
    fn apply(&self, content: &str, tally: &mut FileTally) -> Result<String, RewriteError>;
}

/// Block rules on a lenient parse tree
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeStrategy;

impl TreeStrategy {
    /// Apply the tree rules to an already parsed document
    ///
    /// Returns `original` untouched when no rule fired.
    pub fn apply_document(
        &self,
        doc: &mut Document,
        original: &str,
        tally: &mut FileTally,
    ) -> Result<String, RewriteError> {
        let collapsed = chatter::collapse_in_tree(doc, tally).map_err(|source| RewriteError::Rule {
            rule: RuleId::ChatterSimplified,
            source,
        })?;
        let restructured = settings::restructure(doc, tally).map_err(|source| RewriteError::Rule {
            rule: RuleId::SettingsStructure,
            source,
        })?;

        if !collapsed && !restructured {
            return Ok(original.to_string());
        }
        Ok(doc.to_markup())
    }
}

impl RewriteStrategy for TreeStrategy {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn apply(&self, content: &str, tally: &mut FileTally) -> Result<String, RewriteError> {
        let mut doc = Document::parse(content)?;
        self.apply_document(&mut doc, content, tally)
    }
}

/// Textual substitutions for the full rule catalogue
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternStrategy {
    parsing: ConditionParsing,
}

impl PatternStrategy {
    pub fn new(parsing: ConditionParsing) -> Self {
        Self { parsing }
    }
}

impl RewriteStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn apply(&self, content: &str, tally: &mut FileTally) -> Result<String, RewriteError> {
        Ok(pattern::apply_all(content, self.parsing, tally))
    }
}

/// Which strategy handled the structural rules for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    Tree,
    Pattern,
}

impl std::fmt::Display for RewriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Pattern => write!(f, "pattern"),
        }
    }
}

/// Result of rewriting one buffer
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub content: String,
    pub tally: FileTally,
    pub mode: RewriteMode,
    /// Messages of stages that failed and were skipped
    pub errors: Vec<String>,
}

impl RewriteOutput {
    pub fn is_changed(&self, original: &str) -> bool {
        self.content != original
    }
}

/// Picks a strategy per buffer and runs the reconciliation pass
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewriter {
    tree: TreeStrategy,
    pattern: PatternStrategy,
}

impl Rewriter {
    pub fn new(parsing: ConditionParsing) -> Self {
        Self {
            tree: TreeStrategy,
            pattern: PatternStrategy::new(parsing),
        }
    }

    /// Rewrite a buffer
    ///
    /// A failing stage is charged to its rule as an error and its input is
    /// carried forward, so one broken block never costs the rest of the file.
    pub fn rewrite(&self, content: &str) -> RewriteOutput {
        let mut tally = FileTally::new();
        let mut errors = Vec::new();

        let (mode, text) = match Document::parse(content) {
            Ok(mut doc) => {
                let mut stage = FileTally::new();
                match self.tree.apply_document(&mut doc, content, &mut stage) {
                    Ok(text) => {
                        tally.merge(&stage);
                        (RewriteMode::Tree, text)
                    }
                    Err(e) => {
                        warn!("{} strategy failed: {}", self.tree.name(), e);
                        record_error(&mut tally, &mut errors, &e);
                        (RewriteMode::Tree, content.to_string())
                    }
                }
            }
            Err(e) => {
                debug!("Markup does not parse ({}), using pattern mode", e);
                (RewriteMode::Pattern, content.to_string())
            }
        };

        let mut stage = FileTally::new();
        let text = match self.pattern.apply(&text, &mut stage) {
            Ok(out) => {
                tally.merge(&stage);
                out
            }
            Err(e) => {
                warn!("{} strategy failed: {}", self.pattern.name(), e);
                record_error(&mut tally, &mut errors, &e);
                text
            }
        };

        RewriteOutput {
            content: text,
            tally,
            mode,
            errors,
        }
    }
}

/// Charge a stage failure to its rule and keep its message
pub(crate) fn record_error(tally: &mut FileTally, errors: &mut Vec<String>, error: &RewriteError) {
    if let Some(rule) = error.rule() {
        tally.error(rule);
    }
    errors.push(error.to_string());
}

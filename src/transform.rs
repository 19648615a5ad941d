// src/transform.rs
//! Per-file transformation
//!
//! Decides which rewrite stages apply to a file, runs them in order and
//! isolates their failures: a stage that errors is charged to its rule and
//! its input is handed to the next stage unchanged.

use crate::domain::ConditionParsing;
use crate::rewrite::{source, FileTally, RewriteMode, Rewriter};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of file, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// View definitions and data records
    Markup,
    /// Python modules
    Source,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("py") => Self::Source,
            _ => Self::Markup,
        }
    }
}

/// Rule selection for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub parsing: ConditionParsing,
    /// Also rewrite `view_mode` values
    pub source_rewrite: bool,
}

/// Outcome of transforming one file's content
#[derive(Debug, Clone)]
pub struct FileTransform {
    pub content: String,
    pub tally: FileTally,
    /// Stages that failed and were skipped
    pub errors: Vec<String>,
    /// Strategy used for markup; `None` for source files
    pub mode: Option<RewriteMode>,
}

impl FileTransform {
    pub fn is_changed(&self, original: &str) -> bool {
        self.content != original
    }
}

/// Transform one file's content
pub fn transform(content: &str, kind: FileKind, options: &TransformOptions) -> FileTransform {
    match kind {
        FileKind::Markup => {
            let rewritten = Rewriter::new(options.parsing).rewrite(content);
            let mut tally = rewritten.tally;
            let content = if options.source_rewrite {
                source::rewrite_records(&rewritten.content, &mut tally)
            } else {
                rewritten.content
            };
            FileTransform {
                content,
                tally,
                errors: rewritten.errors,
                mode: Some(rewritten.mode),
            }
        }
        FileKind::Source => {
            let mut tally = FileTally::new();
            let content = if options.source_rewrite {
                source::rewrite_python(content, &mut tally)
            } else {
                content.to_string()
            };
            FileTransform {
                content,
                tally,
                errors: Vec::new(),
                mode: None,
            }
        }
    }
}

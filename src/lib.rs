// src/lib.rs

//! viewmig
//!
//! Rewrites legacy view-definition markup into the current view syntax.
//!
//! # Architecture
//!
//! - `domain`: translates prefix-notation domains into infix expressions
//! - `rewrite`: rule catalogue, applied through a parse tree when the
//!   markup is well-formed and through anchored patterns otherwise
//! - `transform`: runs the applicable rules on one file's content
//! - `pipeline`: discovers files, converts them on a worker pool, writes
//!   the results and builds the run summary

pub mod config;
pub mod domain;
mod error;
pub mod pipeline;
pub mod progress;
pub mod rewrite;
pub mod transform;

pub use config::{ConfigError, ConvertConfig};
pub use domain::{translate_domain, BoolExpr, ConditionParsing, ParseError};
pub use error::{Error, Result};
pub use pipeline::{CancelToken, FileOutcome, FileStatus, Pipeline, RunSummary};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use rewrite::{FileTally, RewriteMode, RewriteOutput, Rewriter, RuleCount, RuleId};
pub use transform::{transform, FileKind, FileTransform, TransformOptions};

// src/pipeline/execute.rs
//! Scheduling and running per-file units
//!
//! Each unit owns one path: it reads the file, transforms it and persists the
//! result. Units share nothing mutable; their outcomes are returned in
//! discovery order and aggregated after the pool joins.

use super::persist::{persist, PersistPlan};
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::rewrite::{FileTally, RewriteMode};
use crate::transform::{transform, FileKind, TransformOptions};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared flag that stops new units from starting
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Content changed (and was written unless dry-run)
    Changed,
    Unchanged,
    /// Read, backup or write failed; the original is intact
    Error,
    /// Cancelled before the unit started
    NotStarted,
}

/// Result of one unit
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Where the converted content went, when it was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RewriteMode>,
    #[serde(skip_serializing_if = "FileTally::is_empty")]
    pub tally: FileTally,
    /// Failed rule stages and the per-file error, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FileOutcome {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            written_to: None,
            mode: None,
            tally: FileTally::new(),
            errors: Vec::new(),
        }
    }

    fn failed(path: &Path, error: Error) -> Self {
        warn!("{}", error);
        let mut outcome = Self::new(path, FileStatus::Error);
        outcome.errors.push(error.to_string());
        outcome
    }
}

/// Everything a unit needs, borrowed for the whole run
pub struct UnitContext<'a> {
    pub options: TransformOptions,
    pub plan: &'a PersistPlan,
    pub cancel: &'a CancelToken,
    pub progress: &'a dyn ProgressTracker,
}

/// Convert one file
pub fn run_unit(path: &Path, ctx: &UnitContext<'_>) -> FileOutcome {
    if ctx.cancel.is_cancelled() {
        return FileOutcome::new(path, FileStatus::NotStarted);
    }
    let outcome = convert_file(path, ctx).unwrap_or_else(|e| FileOutcome::failed(path, e));
    ctx.progress.increment(1);
    outcome
}

fn convert_file(path: &Path, ctx: &UnitContext<'_>) -> Result<FileOutcome> {
    let original = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let result = transform(&original, FileKind::from_path(path), &ctx.options);
    for message in &result.errors {
        warn!("{}: {}", path.display(), message);
    }

    let changed = result.is_changed(&original);
    let mut outcome = FileOutcome::new(
        path,
        if changed {
            FileStatus::Changed
        } else {
            FileStatus::Unchanged
        },
    );
    outcome.mode = result.mode;
    outcome.errors = result.errors;

    if changed {
        outcome.written_to = persist(ctx.plan, path, &result.content)?;
        debug!(
            "Converted {} ({} changes)",
            path.display(),
            result.tally.total_changed()
        );
    }
    outcome.tally = result.tally;
    Ok(outcome)
}

/// Run every unit, in parallel when `workers > 1`
///
/// Outcomes come back in the order of `files`.
pub fn execute(files: &[PathBuf], workers: usize, ctx: &UnitContext<'_>) -> Result<Vec<FileOutcome>> {
    if workers <= 1 {
        debug!("Converting {} files sequentially", files.len());
        return Ok(files.iter().map(|path| run_unit(path, ctx)).collect());
    }

    info!("Converting {} files with {} workers", files.len(), workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("viewmig-worker-{}", i))
        .build()?;
    Ok(pool.install(|| files.par_iter().map(|path| run_unit(path, ctx)).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::rewrite::RuleId;
    use std::fs;
    use tempfile::TempDir;

    fn plan(root: &Path) -> PersistPlan {
        PersistPlan {
            source_root: root.to_path_buf(),
            output_root: None,
            backup: true,
            dry_run: false,
        }
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_unit_converts_and_counts() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("views.xml");
        fs::write(&file, "<odoo><tree/></odoo>").unwrap();

        let plan = plan(dir.path());
        let cancel = CancelToken::new();
        let progress = SilentProgress::new();
        let ctx = UnitContext {
            options: TransformOptions::default(),
            plan: &plan,
            cancel: &cancel,
            progress: &progress,
        };

        let outcome = run_unit(&file, &ctx);
        assert_eq!(outcome.status, FileStatus::Changed);
        assert_eq!(outcome.tally.changes(RuleId::TreeToList), 1);
        assert_eq!(outcome.written_to.as_deref(), Some(file.as_path()));
        assert_eq!(fs::read_to_string(&file).unwrap(), "<odoo><list/></odoo>");
        assert_eq!(progress.position(), 1);

        let again = run_unit(&file, &ctx);
        assert_eq!(again.status, FileStatus::Unchanged);
        assert_eq!(again.written_to, None);
    }

    #[test]
    fn test_unit_read_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let plan = plan(dir.path());
        let cancel = CancelToken::new();
        let progress = SilentProgress::new();
        let ctx = UnitContext {
            options: TransformOptions::default(),
            plan: &plan,
            cancel: &cancel,
            progress: &progress,
        };

        let outcome = run_unit(&dir.path().join("missing.xml"), &ctx);
        assert_eq!(outcome.status, FileStatus::Error);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_cancelled_units_do_not_start() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("views.xml");
        fs::write(&file, "<tree/>").unwrap();

        let plan = plan(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        let progress = SilentProgress::new();
        let ctx = UnitContext {
            options: TransformOptions::default(),
            plan: &plan,
            cancel: &cancel,
            progress: &progress,
        };

        let outcomes = execute(&[file.clone()], 2, &ctx).unwrap();
        assert_eq!(outcomes[0].status, FileStatus::NotStarted);
        assert_eq!(fs::read_to_string(&file).unwrap(), "<tree/>");
        assert_eq!(progress.position(), 0);
    }

    #[test]
    fn test_parallel_keeps_order() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..8)
            .map(|i| {
                let path = dir.path().join(format!("v{}.xml", i));
                fs::write(&path, "<tree/>").unwrap();
                path
            })
            .collect();

        let plan = PersistPlan {
            dry_run: true,
            ..plan(dir.path())
        };
        let cancel = CancelToken::new();
        let progress = SilentProgress::new();
        let ctx = UnitContext {
            options: TransformOptions::default(),
            plan: &plan,
            cancel: &cancel,
            progress: &progress,
        };

        let outcomes = execute(&files, 4, &ctx).unwrap();
        let paths: Vec<&PathBuf> = outcomes.iter().map(|o| &o.path).collect();
        assert_eq!(paths, files.iter().collect::<Vec<_>>());
        assert!(outcomes.iter().all(|o| o.status == FileStatus::Changed));
        assert_eq!(progress.position(), 8);
    }
}

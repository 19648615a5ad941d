// src/pipeline/mod.rs
//! Conversion pipeline
//!
//! A run moves through discover, execute, aggregate and report. Only
//! configuration problems abort it; per-file failures are recorded in the
//! summary and the remaining files are still converted.

mod discover;
mod execute;
mod persist;
mod summary;

pub use discover::{discover, DiscoverOptions, Discovery};
pub use execute::{execute, run_unit, CancelToken, FileOutcome, FileStatus, UnitContext};
pub use persist::{backup_path, persist, write_atomic, PersistPlan};
pub use summary::RunSummary;

use crate::config::ConvertConfig;
use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, SilentProgress};
use chrono::Utc;
use tracing::{info, warn};

/// Orchestrates one conversion run
pub struct Pipeline {
    config: ConvertConfig,
    progress: Box<dyn ProgressTracker>,
}

impl Pipeline {
    pub fn new(config: ConvertConfig) -> Self {
        Self {
            config,
            progress: Box::new(SilentProgress::new()),
        }
    }

    /// Report progress through `progress` instead of discarding it
    pub fn with_progress(mut self, progress: Box<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Files the run would process, after validation
    pub fn discover(&self) -> Result<Discovery> {
        let skip = self.config.validate()?;
        Ok(self.discover_with(&skip))
    }

    fn discover_with(&self, skip: &[regex::Regex]) -> Discovery {
        let extensions = self.config.effective_extensions();
        discover(
            &self.config.source_dir,
            &DiscoverOptions {
                extensions: &extensions,
                skip,
                exclude_root: self.config.output_dir.as_deref(),
            },
        )
    }

    /// Run the conversion
    ///
    /// Units not yet started when `cancel` fires are reported as
    /// `NotStarted` and the summary is flagged interrupted.
    pub fn run(&self, cancel: &CancelToken) -> Result<RunSummary> {
        let start_time = Utc::now();
        let skip = self.config.validate()?;
        let workers = self.config.effective_workers();

        info!("Scanning {}", self.config.source_dir.display());
        let discovery = self.discover_with(&skip);
        info!(
            "Found {} files to convert ({} skipped)",
            discovery.files.len(),
            discovery.skipped.len()
        );

        let summary = if discovery.files.is_empty() {
            RunSummary::empty(&discovery.skipped, start_time, self.config.dry_run)
        } else {
            let plan = PersistPlan {
                source_root: self.config.source_dir.clone(),
                output_root: self.config.output_dir.clone(),
                backup: self.config.backup,
                dry_run: self.config.dry_run,
            };
            self.progress.set_length(discovery.files.len() as u64);
            let ctx = UnitContext {
                options: self.config.transform_options(),
                plan: &plan,
                cancel,
                progress: self.progress.as_ref(),
            };
            let outcomes = execute(&discovery.files, workers, &ctx)?;
            RunSummary::build(
                outcomes,
                &discovery.skipped,
                start_time,
                Utc::now(),
                self.config.dry_run,
            )
        };

        if summary.interrupted {
            self.progress.finish_with_error("interrupted");
            warn!(
                "Interrupted after {} of {} files",
                summary.files_processed, summary.files_discovered
            );
        } else {
            self.progress.finish_with_message("done");
            info!(
                "Converted {} files, {} changed, {} errors in {:.2}s",
                summary.files_processed,
                summary.files_changed,
                summary.files_error,
                summary.duration().as_secs_f64()
            );
        }

        if let Some(report) = &self.config.report_file {
            self.write_report(&summary, report)?;
        }
        Ok(summary)
    }

    fn write_report(&self, summary: &RunSummary, path: &std::path::Path) -> Result<()> {
        let json = summary
            .to_json()
            .map_err(|e| Error::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        write_atomic(path, &json)?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

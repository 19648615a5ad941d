// src/pipeline/summary.rs
//! Run summary and JSON report

use super::execute::{FileOutcome, FileStatus};
use crate::rewrite::{FileTally, RuleId, RuleCount};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Aggregate of a whole run
///
/// Built once by the orchestrator after every unit has finished.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_changed: usize,
    pub files_skipped: usize,
    pub files_error: usize,
    pub interrupted: bool,
    pub dry_run: bool,
    pub totals: FileTally,
    pub files: Vec<FileOutcome>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl RunSummary {
    /// Fold unit outcomes into a summary
    pub fn build(
        outcomes: Vec<FileOutcome>,
        skipped: &[PathBuf],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        let mut summary = Self {
            files_discovered: outcomes.len(),
            files_processed: 0,
            files_changed: 0,
            files_skipped: skipped.len(),
            files_error: 0,
            interrupted: false,
            dry_run,
            totals: FileTally::new(),
            files: Vec::with_capacity(outcomes.len()),
            start_time,
            end_time,
        };

        for outcome in outcomes {
            match outcome.status {
                FileStatus::Changed => {
                    summary.files_processed += 1;
                    summary.files_changed += 1;
                }
                FileStatus::Unchanged => summary.files_processed += 1,
                FileStatus::Error => {
                    summary.files_processed += 1;
                    summary.files_error += 1;
                }
                FileStatus::NotStarted => summary.interrupted = true,
            }
            summary.totals.merge(&outcome.tally);
            summary.files.push(outcome);
        }
        summary
    }

    /// Summary of a run that found nothing to do
    pub fn empty(skipped: &[PathBuf], start_time: DateTime<Utc>, dry_run: bool) -> Self {
        Self::build(Vec::new(), skipped, start_time, Utc::now(), dry_run)
    }

    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time).to_std().unwrap_or_default()
    }

    /// Changed-fragment count per rule, including rules that never fired
    pub fn changes(&self) -> BTreeMap<RuleId, u64> {
        RuleId::ALL
            .into_iter()
            .map(|rule| (rule, self.totals.changes(rule)))
            .collect()
    }

    /// Per-rule counters for rules that did something
    pub fn rule_details(&self) -> BTreeMap<RuleId, RuleCount> {
        self.totals.iter().filter(|(_, c)| !c.is_zero()).collect()
    }

    pub fn errored_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.status == FileStatus::Error)
    }

    /// The report document
    pub fn to_json_value(&self) -> serde_json::Value {
        let files: Vec<&FileOutcome> = self
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Unchanged || !f.tally.is_empty())
            .collect();
        json!({
            "summary": {
                "files_discovered": self.files_discovered,
                "files_processed": self.files_processed,
                "files_changed": self.files_changed,
                "files_skipped": self.files_skipped,
                "files_error": self.files_error,
                "interrupted": self.interrupted,
                "dry_run": self.dry_run,
                "execution_time_seconds": self.duration().as_secs_f64(),
                "start_time": self.start_time.to_rfc3339(),
                "end_time": self.end_time.to_rfc3339(),
            },
            "changes": self.changes(),
            "rules": self.rule_details(),
            "files": files,
        })
    }

    /// Pretty-printed report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

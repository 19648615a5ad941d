// src/progress.rs

//! Progress reporting for conversion runs
//!
//! The pipeline counts finished files through [`ProgressTracker`]. Which
//! implementation it gets depends on where the run is displayed:
//! - `CliProgress`: indicatif bar on a terminal
//! - `LogProgress`: periodic tracing lines when stderr is redirected
//! - `SilentProgress`: `--quiet` and library callers

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Sink for per-file progress, shared by all workers
pub trait ProgressTracker: Send + Sync {
    /// Number of files the run will visit
    fn set_length(&self, length: u64);

    /// Record `amount` finished files
    fn increment(&self, amount: u64);

    fn finish_with_message(&self, message: &str);

    /// The run stopped early
    fn finish_with_error(&self, message: &str);
}

/// Counts files and shows nothing
#[derive(Debug, Default)]
pub struct SilentProgress {
    done: AtomicU64,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files counted so far
    pub fn position(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressTracker for SilentProgress {
    fn set_length(&self, _length: u64) {}

    fn increment(&self, amount: u64) {
        self.done.fetch_add(amount, Ordering::Relaxed);
    }

    fn finish_with_message(&self, _message: &str) {}

    fn finish_with_error(&self, _message: &str) {}
}

/// Logs a line about every tenth of the run
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    done: AtomicU64,
    total: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, total: u64) -> Self {
        Self {
            name: name.into(),
            done: AtomicU64::new(0),
            total: AtomicU64::new(total),
        }
    }

    pub fn position(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// True when going from `before` to `after` crosses a tenth of `total`
    fn crosses_step(before: u64, after: u64, total: u64) -> bool {
        let step = (total / 10).max(1);
        total > 0 && after / step > before / step
    }
}

impl ProgressTracker for LogProgress {
    fn set_length(&self, length: u64) {
        self.total.store(length, Ordering::Relaxed);
    }

    fn increment(&self, amount: u64) {
        let before = self.done.fetch_add(amount, Ordering::Relaxed);
        let after = before + amount;
        let total = self.total.load(Ordering::Relaxed);
        if Self::crosses_step(before, after, total) {
            info!("{}: {}/{} files ({}%)", self.name, after, total, after * 100 / total);
        }
    }

    fn finish_with_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        info!("{}: stopped, {}", self.name, message);
    }
}

/// Terminal progress bar
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(message: &str, length: u64) -> Self {
        let bar = ProgressBar::new(length);
        let style = ProgressStyle::default_bar()
            .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}% {elapsed}")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

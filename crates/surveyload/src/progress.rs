//! Progress reporting for export polling and table loads
//!
//! The pipeline only talks to [`ProgressSink`]; rendering is cosmetic and
//! never influences control flow.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Receives feedback while a run is in progress
pub trait ProgressSink: Send + Sync {
    /// Export job progress: clamped position (0-100) and the non-negative
    /// increase since the previous observation.
    fn export_progress(&self, _position: u8, _delta: u8) {}

    /// The export job finished and its archive is being fetched
    fn export_finished(&self) {}

    fn table_started(&self, _table: &str) {}

    /// `rows` more rows of `table` were written
    fn rows_loaded(&self, _table: &str, _rows: u64) {}

    fn table_finished(&self, _table: &str, _total_rows: u64) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Terminal progress bars
#[derive(Default)]
pub struct TerminalProgress {
    export: Mutex<Option<ProgressBar>>,
    table: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TerminalProgress {
    fn export_progress(&self, _position: u8, delta: u8) {
        if let Ok(mut slot) = self.export.lock() {
            let bar = slot.get_or_insert_with(|| create_percent_bar("Exporting"));
            bar.inc(u64::from(delta));
        }
    }

    fn export_finished(&self) {
        if let Ok(mut slot) = self.export.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_with_message("Export ready");
            }
        }
    }

    fn table_started(&self, table: &str) {
        if let Ok(mut slot) = self.table.lock() {
            *slot = Some(create_row_spinner(&format!("Processing {}", table)));
        }
    }

    fn rows_loaded(&self, _table: &str, rows: u64) {
        if let Ok(slot) = self.table.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.inc(rows);
            }
        }
    }

    fn table_finished(&self, table: &str, total_rows: u64) {
        if let Ok(mut slot) = self.table.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_with_message(format!("{}: {} rows", table, total_rows));
            }
        }
    }
}

/// Progress bar measured in percent
pub fn create_percent_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Spinner counting rows of unknown total
pub fn create_row_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {pos} rows ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

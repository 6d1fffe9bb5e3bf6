//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e i contatori dell'esecuzione.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` sui file scoperti
//! - `TransferStats`: contatori per categoria, posseduti solo dal pipeline
//!
//! ## Contatori:
//! - **converted**: immagini convertite (anche oltre budget)
//! - **copied**: video copiati byte per byte
//! - **duplicates**: file saltati come duplicati
//! - **unsupported**: estensioni non supportate
//! - **errors**: fallimenti per singolo file
//!
//! Vale sempre: `converted + copied + duplicates + unsupported + errors == file scoperti`.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================>---------------] 150/240 (62%) [OK] IMG_0042.jpeg
//! ```

use crate::catalog::format_size;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for the run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Progress bar with an unknown total: the catalog is streamed lazily
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        let template = concat!(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ",
            "{pos}/{len} ({percent}%) {msg}"
        );
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// No-op progress, used when events go to stdout as JSON
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// A new file was discovered
    pub fn discovered(&self) {
        self.bar.inc_length(1);
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-category counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub converted: usize,
    pub copied: usize,
    pub duplicates: usize,
    pub unsupported: usize,
    pub errors: usize,
    /// Conversions kept despite exceeding the budget (also counted in `converted`)
    pub over_budget: usize,
    pub bytes_written: u64,
    pub interrupted: bool,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self, bytes: u64, over_budget: bool) {
        self.converted += 1;
        self.bytes_written += bytes;
        if over_budget {
            self.over_budget += 1;
        }
    }

    pub fn add_copied(&mut self, bytes: u64) {
        self.copied += 1;
        self.bytes_written += bytes;
    }

    pub fn add_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn add_unsupported(&mut self) {
        self.unsupported += 1;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Every file the catalog produced
    pub fn total(&self) -> usize {
        self.converted + self.copied + self.duplicates + self.unsupported + self.errors
    }

    pub fn format_summary(&self) -> String {
        format!(
            "{} converted ({} over budget), {} videos copied, {} duplicates, \
             {} unsupported, {} errors, {} written",
            self.converted,
            self.over_budget,
            self.copied,
            self.duplicates,
            self.unsupported,
            self.errors,
            format_size(self.bytes_written)
        )
    }
}

//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di conversione.
//!
//! ## Componenti principali:
//! - `ProgressManager`: Progress bar `indicatif` per il feedback in terminale
//! - `ConversionStats`: Conteggio file convertiti e falliti di un batch
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 6/10 (60%) Converting (7/10): IMG_0042.HEIC
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a conversion batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Move the bar to `completed` files
    pub fn set_position(&self, completed: u64) {
        self.bar.set_position(completed);
    }

    /// Set a custom message without moving the bar
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Outcome counts of one conversion batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn format_summary(&self) -> String {
        format!("Done! Succeeded: {}, Failed: {}", self.succeeded, self.failed)
    }
}

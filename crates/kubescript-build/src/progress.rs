//! Stage progress reporting

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};

/// Receives stage lifecycle notifications from the pipeline
pub trait Progress: Send + Sync {
    fn stage_started(&self, label: &str);
    fn stage_succeeded(&self, label: &str);
    fn stage_failed(&self, label: &str, reason: &str);
    /// Final line once every stage succeeded
    fn finished(&self, message: &str);
}

/// Terminal spinner, one line per stage
#[derive(Default)]
pub struct SpinnerProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Option<ProgressBar> {
        self.current.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Progress for SpinnerProgress {
    fn stage_started(&self, label: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.current.lock() {
            if let Some(previous) = slot.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn stage_succeeded(&self, label: &str) {
        if let Some(pb) = self.take() {
            pb.finish_with_message(format!("{} {}done", "✓".green(), label));
        }
    }

    fn stage_failed(&self, label: &str, reason: &str) {
        if let Some(pb) = self.take() {
            pb.finish_with_message(format!("{} {}failed", "✗".red(), label));
        }
        eprintln!("{} {}", "✗".red(), reason);
    }

    fn finished(&self, message: &str) {
        println!("{}", message.bold());
    }
}

/// Reports through `tracing` only; used when output is not a terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn stage_started(&self, label: &str) {
        info!(stage = label, "Stage started");
    }

    fn stage_succeeded(&self, label: &str) {
        info!(stage = label, "Stage done");
    }

    fn stage_failed(&self, label: &str, reason: &str) {
        error!(stage = label, %reason, "Stage failed");
    }

    fn finished(&self, message: &str) {
        info!("{}", message);
    }
}

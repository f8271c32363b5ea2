//! Progress bar and logging utilities.
//!
//! A `Reporter` is created once per process and handed to the job. It decides
//! between terminal progress bars and log-only mode, where bars are hidden and
//! periodic progress lines go through `log` instead (tail-friendly output).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    log_only: bool,
}

impl Reporter {
    pub fn new(log_only: bool) -> Self {
        Self { log_only }
    }

    pub fn is_log_only(&self) -> bool {
        self.log_only
    }

    /// Create a progress bar with consistent styling.
    /// In log-only mode, the progress bar is hidden.
    pub fn progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner for indeterminate progress.
    /// In log-only mode, the spinner is hidden.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg} {spinner} [{elapsed_precise}]")
                    .unwrap(),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Log progress every `interval` items and at the end.
    /// Only logs in log-only mode; otherwise the bar shows it.
    pub fn log_progress(&self, phase: &str, current: u64, total: u64, interval: u64) {
        if self.log_only && should_log(current, total, interval) {
            let pct = if total == 0 {
                100.0
            } else {
                100.0 * current as f64 / total as f64
            };
            log::info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
        }
    }
}

fn should_log(current: u64, total: u64, interval: u64) -> bool {
    current == total || (interval > 0 && current % interval == 0)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_should_log() {
        assert!(should_log(1000, 2500, 1000));
        assert!(should_log(2500, 2500, 1000));
        assert!(!should_log(999, 2500, 1000));
        assert!(!should_log(5, 10, 0));
    }

    #[test]
    fn test_log_only_bar_is_hidden() {
        let reporter = Reporter::new(true);
        assert!(reporter.is_log_only());
        let pb = reporter.progress_bar(10, "test");
        assert!(pb.is_hidden());
    }
}

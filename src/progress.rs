//! Spinner shown while waiting for the user to approve the app
//!
//! Only used before the TUI takes over the terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct SimpleSpinner {
    spinner: ProgressBar,
    start_time: Instant,
}

impl Default for SimpleSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleSpinner {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    pub fn set_message(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
    }

    /// Print above the spinner without tearing it.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.spinner.suspend(f)
    }

    /// Finish, appending the time spent spinning.
    pub fn finish_with_message(&self, msg: &str) {
        self.spinner.finish_with_message(format!(
            "{} in {:.1}s",
            msg,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    pub fn abandon_with_message(&self, msg: &str) {
        self.spinner.abandon_with_message(msg.to_string());
    }
}

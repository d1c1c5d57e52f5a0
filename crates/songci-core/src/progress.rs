//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar advancing per completed row.
//! Non-TTY mode: hidden bar; checkpoint log lines are the progress signal.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Row bar: green bar, row counts, rate and ETA
fn row_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{prefix:<12.cyan.bold} {bar:30.green/dim} {pos:>7}/{len:7} {per_sec:>9} {eta:>4} {wide_msg:.dim}",
        )
        .expect("invalid template")
        .progress_chars("--")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws (tests, piped output).
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create the per-run row bar, seeded with rows already done.
    ///
    /// TTY: visible bar. Non-TTY: hidden, but position is still tracked.
    pub fn row_bar(&self, name: &str, total: usize, done: usize) -> ProgressBar {
        let pb = if self.is_tty {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(row_style());
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        pb.set_prefix(name.to_string());
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

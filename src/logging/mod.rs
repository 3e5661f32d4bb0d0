//! Console logging and output control
//!
//! This module provides the [`Logger`] used for every user-visible line the
//! client prints. It supports quiet and verbose modes and carries the size,
//! duration and progress-bar formatting shared by the command handlers.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Error message, printed even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    /// Per-item line inside a batch, e.g. `✓ foo@1.0.0 downloaded`
    pub fn item(&self, ok: bool, message: &str) {
        if ok {
            if !self.quiet {
                println!("  ✓ {}", message);
            }
        } else {
            eprintln!("  ✗ {}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
            for (key, value) in items {
                println!("  {:<width$}  {}", key, value, width = width);
            }
        }
    }

    // Structured list output
    pub fn list(&self, title: &str, items: &[String]) {
        if !self.quiet {
            self.subsection(title);
            for (i, item) in items.iter().enumerate() {
                println!("  {}. {}", i + 1, item);
            }

            if items.is_empty() {
                println!("  (No items to display)");
            }
        }
    }

    /// Redraw a single-line progress bar in place.
    ///
    /// `total == 0` means the size is unknown; only the byte count is shown.
    pub fn progress_bar(&self, label: &str, current: u64, total: u64) {
        if self.quiet {
            return;
        }

        print!("\r\x1b[K");
        if total > 0 {
            let percentage = (current as f64 / total as f64 * 100.0).min(100.0);
            let bar_width = 30;
            let filled = ((percentage / 100.0) * bar_width as f64) as usize;
            let bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(bar_width - filled));
            print!(
                "⏳ {} {} {:5.1}% ({}/{})",
                label,
                bar,
                percentage,
                self.format_size(current),
                self.format_size(total)
            );
        } else {
            print!("⏳ {} {}", label, self.format_size(current));
        }
        let _ = io::stdout().flush();
    }

    /// Terminate the progress line drawn by [`Logger::progress_bar`]
    pub fn progress_done(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Format file size in human-readable units
    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.2} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.1}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{:02}s", secs / 60, secs % 60)
        } else {
            format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|start| start.elapsed()).unwrap_or_default()
    }
}

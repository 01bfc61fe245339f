//! Console output for the MirrorSync CLI

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mirrorsync_types::{
    Error, FailureStage, LogEntry, OperationKind, PassReport, SyncFailure, SyncReporter,
};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Prints pass events to the terminal
///
/// Operations are grouped under a section title the first time an operation
/// of that kind is seen in a pass. In quiet mode only failures are printed.
pub struct ConsoleReporter {
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
    section: Mutex<Option<OperationKind>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            spinner: Mutex::new(None),
            section: Mutex::new(None),
        }
    }

    fn emit(&self, line: String) {
        let spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match spinner.as_ref() {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn enter_section(&self, kind: OperationKind) {
        let mut section = self.section.lock().unwrap_or_else(PoisonError::into_inner);
        if *section != Some(kind) {
            *section = Some(kind);
            self.emit(style(section_title(kind)).bold().to_string());
        }
    }

    fn stop_spinner(&self) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl SyncReporter for ConsoleReporter {
    fn pass_started(&self, _source: &Path, _replica: &Path) {
        *self.section.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if self.quiet {
            return;
        }

        println!("{}", style("Syncing...").cyan().bold());
        *self.spinner.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(create_pass_spinner("Synchronizing..."));
    }

    fn operation_applied(&self, entry: &LogEntry) {
        if self.quiet {
            return;
        }

        self.enter_section(entry.kind);
        let line = match entry.kind {
            OperationKind::CopyNew => style(entry.describe()).green(),
            OperationKind::CopyModified => style(entry.describe()).yellow(),
            OperationKind::Delete => style(entry.describe()).red(),
        };
        self.emit(line.to_string());
    }

    fn failure(&self, failure: &SyncFailure) {
        self.emit(format!(
            "{} {}",
            style("✗").red().bold(),
            style(failure_message(failure)).red()
        ));
    }

    fn pass_completed(&self, report: &PassReport) {
        self.stop_spinner();
        if !self.quiet {
            display_pass_summary(report);
        }
    }

    fn pass_aborted(&self, error: &Error) {
        self.stop_spinner();
        display_error(&format!("Sync pass aborted: {}", error));
    }
}

/// Title printed above each group of operations
pub fn section_title(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::CopyNew => "---- New files that need to be copied to replica ---",
        OperationKind::CopyModified => {
            "---- Common files that were modified and need to be updated ---"
        }
        OperationKind::Delete => "---- Files that need to be deleted from replica ---",
    }
}

/// Operator-facing text for a recovered failure
pub fn failure_message(failure: &SyncFailure) -> String {
    match (&failure.stage, &failure.path) {
        (FailureStage::Delete, Some(path)) => {
            format!("Couldn't delete the file [{}]. Error: {}", path, failure.error)
        }
        _ => failure.to_string(),
    }
}

/// Display the counters of a finished pass
pub fn display_pass_summary(report: &PassReport) {
    let stats = &report.stats;
    println!();
    println!("{}", style("Sync Statistics:").bold().underlined());
    println!("  Files created: {}", style(stats.files_created).green());
    println!("  Files modified: {}", style(stats.files_modified).green());
    println!("  Files deleted: {}", style(stats.files_deleted).green());
    println!("  Files unchanged: {}", style(stats.files_unchanged).dim());
    if stats.directories_pruned > 0 {
        println!(
            "  Directories pruned: {}",
            style(stats.directories_pruned).green()
        );
    }
    println!(
        "  Bytes copied: {}",
        style(format_bytes(stats.bytes_copied)).green()
    );
    if report.failures.is_empty() {
        println!("  Failures: {}", style(0).green());
    } else {
        println!("  Failures: {}", style(report.failures.len()).red());
    }
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    println!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display an informational message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}

/// Spinner shown while a pass runs
pub fn create_pass_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

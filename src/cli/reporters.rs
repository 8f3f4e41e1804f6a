//! Progress reporters and EULA prompt for the CLI binary. The library
//! crate stays agnostic (spec.md §9's "progress rendering and EULA prompt
//! UI consumed as a capability"); these are the concrete implementations
//! the binary supplies, grounded on the teacher's `cli/reporters.rs`
//! `indicatif`-backed style but simplified to this engine's non-generic
//! reporter traits.

use cpackget::reporters::{DownloadProgressReporter, ExtractProgressReporter, EulaPrompt, SyncReporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write as _;
use std::sync::Mutex;

const TICK_CHARS: &str = "⣷⣯⣟⡿⢿⣻⣽⣾";

fn spinner_style() -> ProgressStyle {
	ProgressStyle::with_template("{msg} {spinner} [{elapsed_precise}] {bytes}/{total_bytes}")
		.unwrap_or_else(|_| ProgressStyle::default_spinner())
		.tick_chars(TICK_CHARS)
}

/// Renders a single download's progress on an `indicatif` spinner.
pub struct CliDownloadReporter {
	bar: Mutex<Option<ProgressBar>>,
}

impl CliDownloadReporter {
	#[must_use]
	pub fn new() -> Self {
		Self { bar: Mutex::new(None) }
	}
}

impl Default for CliDownloadReporter {
	fn default() -> Self {
		Self::new()
	}
}

impl DownloadProgressReporter for CliDownloadReporter {
	fn report_start(&self, total: Option<u64>) {
		let bar = ProgressBar::new(total.unwrap_or(0));
		bar.set_style(spinner_style());
		bar.set_message("downloading");
		bar.enable_steady_tick(std::time::Duration::from_millis(100));
		*self.bar.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
	}

	fn report_progress(&self, len: u64) {
		if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
			bar.set_position(len);
		}
	}

	fn report_done(&self) {
		if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take() {
			bar.finish_and_clear();
		}
	}
}

/// Reports extraction progress on a single status line.
pub struct CliExtractReporter;

impl ExtractProgressReporter for CliExtractReporter {
	fn report_start(&self, total_entries: usize) {
		tracing::info!(total_entries, "extracting pack");
	}

	fn report_done(&self) {
		tracing::info!("extraction complete");
	}
}

/// Displays a pack's embedded license on the terminal and prompts for
/// acceptance via stdin (spec.md §4.7.2 `checkEula`).
pub struct CliEulaPrompt;

impl EulaPrompt for CliEulaPrompt {
	fn confirm(&self, license_text: &str) -> bool {
		println!("{license_text}");
		print!("Do you agree to the above license? [y/N] ");
		let _ = std::io::stdout().flush();

		let mut answer = String::new();
		if std::io::stdin().read_line(&mut answer).is_err() {
			return false;
		}
		matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
	}
}

/// Reports the Public-Index Synchronizer's PDSC fan-out on a progress bar.
pub struct CliSyncReporter {
	bar: Mutex<Option<ProgressBar>>,
}

impl CliSyncReporter {
	#[must_use]
	pub fn new() -> Self {
		Self { bar: Mutex::new(None) }
	}
}

impl Default for CliSyncReporter {
	fn default() -> Self {
		Self::new()
	}
}

impl SyncReporter for CliSyncReporter {
	fn report_start(&self, total: usize) {
		if total == 0 {
			return;
		}
		let bar = ProgressBar::new(total as u64);
		bar.set_style(ProgressStyle::with_template("{msg} [{bar:20}] {pos}/{len}").unwrap_or_else(|_| ProgressStyle::default_bar()));
		bar.set_message("fetching PDSCs");
		*self.bar.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
	}

	fn report_pdsc_done(&self, vendor: &str, name: &str, result: &Result<(), String>) {
		if let Err(e) = result {
			tracing::warn!(vendor, name, error = %e, "PDSC fetch failed during index sync");
		}
		if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
			bar.inc(1);
		}
	}

	fn report_done(&self) {
		if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take() {
			bar.finish_and_clear();
		}
	}
}

//! `index [<url>]` (spec.md §6): drives the Public-Index Synchronizer.

use anyhow::Context as _;
use cpackget::Engine;
use cpackget::sync::{IndexSource, SyncOptions, Synchronizer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::reporters::CliSyncReporter;

#[derive(Debug, clap::Args)]
pub struct IndexCommand {
	/// URL or local path of the index to mirror; omit to reuse the current index's URL
	source: Option<String>,

	/// Only rewrite `index.pidx`, skipping every PDSC refresh check
	#[arg(long)]
	sparse: bool,

	/// Fetch every PDSC the new index references
	#[arg(long = "download-pdsc")]
	download_pdsc: bool,

	/// Fetch any PDSC not already present locally
	#[arg(long = "download-remaining-pdsc")]
	download_remaining: bool,

	/// Maximum number of concurrent PDSC fetches
	#[arg(long, default_value_t = 1)]
	concurrency: usize,

	/// Network timeout in seconds (0 = client default)
	#[arg(long, default_value_t = 0)]
	timeout: u64,
}

impl IndexCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		let source = match &self.source {
			Some(s) if s.starts_with("http://") || s.starts_with("https://") => IndexSource::Url(s.clone()),
			Some(s) => IndexSource::LocalFile(std::path::PathBuf::from(s)),
			None => IndexSource::Current,
		};

		let options = SyncOptions {
			source,
			sparse: self.sparse,
			download_pdsc: self.download_pdsc,
			download_remaining: self.download_remaining,
			concurrency: self.concurrency,
			timeout: Duration::from_secs(self.timeout),
		};

		let sync = Synchronizer::new(engine.root().clone()).context("failed to build the index synchronizer")?;
		sync.update_public_index(&options, &CancellationToken::new(), Arc::new(CliSyncReporter::new()))
			.await
			.context("failed to update the public index")
	}
}

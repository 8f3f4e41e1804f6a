//! Download/Fetch Service (spec.md §4.5): fetches a URL into the pack
//! root's `.Download/` cache, cooperatively cancellable and bounded by a
//! caller-supplied timeout.

use crate::error::{Error, Result};
use crate::reporters::DownloadProgressReporter;
use futures::StreamExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt as _;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// A thin wrapper around a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct FetchClient {
	http: reqwest::Client,
}

impl FetchClient {
	pub fn new() -> Result<Self> {
		let http = reqwest::Client::builder()
			.user_agent(concat!("cpackget/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(Error::Offline)?;
		Ok(Self { http })
	}

	/// Fetches `url` into `dest_dir/file_name`, writing through a `.part`
	/// sibling so a cancelled or failed transfer never leaves a
	/// half-written file at its final name.
	///
	/// `timeout` of zero means the client default (no per-request timeout
	/// override). `cancellation` is polled between chunks; firing it
	/// removes the partial file and returns `TerminatedByUser`.
	#[instrument(skip(self, cancellation, reporter), fields(url))]
	pub async fn fetch(
		&self,
		url: &str,
		dest_dir: &Path,
		file_name: &str,
		timeout: Duration,
		cancellation: &CancellationToken,
		reporter: Arc<dyn DownloadProgressReporter>,
	) -> Result<PathBuf> {
		if url.starts_with("http://") {
			tracing::warn!(url, "fetching over a non-TLS connection");
		}

		let mut request = self.http.get(url);
		if !timeout.is_zero() {
			request = request.timeout(timeout);
		}

		let response = request.send().await.map_err(|e| {
			if e.is_connect() || e.is_timeout() {
				Error::Offline(e)
			} else {
				Error::BadRequest(url.to_string())
			}
		})?;

		if response.status().as_u16() >= 400 {
			return Err(Error::BadRequest(url.to_string()));
		}

		fs_err::tokio::create_dir_all(dest_dir)
			.await
			.map_err(|_| Error::FailedCreatingDirectory(dest_dir.to_path_buf()))?;
		let dest_path = dest_dir.join(file_name);
		let temp_path = dest_dir.join(format!(".{file_name}.part"));

		let total = response.content_length();
		reporter.report_start(total);

		let mut stream = response.bytes_stream();
		let mut file = fs_err::tokio::File::create(&temp_path).await?;
		let mut downloaded: u64 = 0;

		while let Some(chunk) = stream.next().await {
			if cancellation.is_cancelled() {
				drop(file);
				let _ = fs_err::tokio::remove_file(&temp_path).await;
				return Err(Error::TerminatedByUser);
			}

			let chunk = chunk.map_err(Error::Offline)?;
			file.write_all(&chunk).await?;
			downloaded += chunk.len() as u64;
			reporter.report_progress(downloaded);
		}

		file.flush().await?;
		drop(file);

		fs_err::tokio::rename(&temp_path, &dest_path).await?;
		reporter.report_done();
		Ok(dest_path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_client_builds_successfully() {
		FetchClient::new().unwrap();
	}
}

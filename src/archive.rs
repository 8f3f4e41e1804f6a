//! Archive Extractor (spec.md §4.6): opens a `.pack`/`.zip` file already
//! read into memory and extracts its entries securely, optionally
//! stripping a single wrapping directory.

use crate::error::{Error, Result};
use crate::reporters::ExtractProgressReporter;
use async_zip::base::read::seek::ZipFileReader;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt as _;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// An opened zip archive, ready for inspection or extraction.
pub struct ZipArchive {
	reader: ZipFileReader<std::io::Cursor<Vec<u8>>>,
}

impl ZipArchive {
	/// Opens `bytes` as a zip archive. The whole archive is kept in memory,
	/// matching the tradeoff the teacher's own zip reader makes for
	/// similarly modestly sized archives.
	pub async fn open(bytes: Vec<u8>) -> Result<Self> {
		let reader = ZipFileReader::with_tokio(std::io::Cursor::new(bytes)).await?;
		Ok(Self { reader })
	}

	/// Every entry name in the archive, in zip central-directory order.
	pub fn entry_names(&self) -> Result<Vec<String>> {
		self.reader
			.file()
			.entries()
			.iter()
			.map(|e| e.filename().as_str().map(str::to_string).map_err(Error::from))
			.collect()
	}

	fn find_entry(&self, predicate: impl Fn(&str) -> bool) -> Result<Option<usize>> {
		for (i, entry) in self.reader.file().entries().iter().enumerate() {
			if predicate(entry.filename().as_str()?) {
				return Ok(Some(i));
			}
		}
		Ok(None)
	}

	/// Reads a single entry's full contents by exact name match.
	pub async fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
		let Some(index) = self.find_entry(|n| n == name)? else {
			return Ok(None);
		};
		let mut entry_reader = self.reader.reader_without_entry(index).await?;
		let mut buf = Vec::new();
		entry_reader.read_to_end(&mut buf).await?;
		Ok(Some(buf))
	}

	/// Finds the first file entry whose name matches `predicate`, returning
	/// its name and contents. Used to locate the embedded PDSC without
	/// knowing its exact path ahead of time (it may sit under a wrapping
	/// subfolder).
	pub async fn find_and_read(&mut self, predicate: impl Fn(&str) -> bool) -> Result<Option<(String, Vec<u8>)>> {
		let Some(index) = self.find_entry(predicate)? else {
			return Ok(None);
		};
		let name = self.reader.file().entries()[index]
			.filename()
			.as_str()?
			.to_string();
		let mut entry_reader = self.reader.reader_without_entry(index).await?;
		let mut buf = Vec::new();
		entry_reader.read_to_end(&mut buf).await?;
		Ok(Some((name, buf)))
	}

	/// `SecureInflate`: extracts every entry into `dest_dir`, stripping
	/// `strip_prefix` (the wrapping directory, if one was detected) from
	/// every entry name first. Rejects any entry whose name would escape
	/// `dest_dir` after the join. Polls `cancellation` between entries.
	#[instrument(skip_all, fields(dest = %dest_dir.display()))]
	pub async fn extract_all(
		&mut self,
		dest_dir: &Path,
		strip_prefix: Option<&str>,
		cancellation: &CancellationToken,
		reporter: Arc<dyn ExtractProgressReporter>,
	) -> Result<()> {
		let total = self.reader.file().entries().len();
		reporter.report_start(total);

		for i in 0..total {
			if cancellation.is_cancelled() {
				return Err(Error::TerminatedByUser);
			}

			let entry = &self.reader.file().entries()[i];
			let filename = entry.filename().as_str()?.to_string();
			let is_dir = entry.dir()?;

			let Some(dest_path) = secure_join(dest_dir, &filename, strip_prefix)? else {
				continue;
			};

			if is_dir {
				fs_err::tokio::create_dir_all(&dest_path)
					.await
					.map_err(|_| Error::FailedCreatingDirectory(dest_path.clone()))?;
				continue;
			}

			if let Some(parent) = dest_path.parent() {
				fs_err::tokio::create_dir_all(parent)
					.await
					.map_err(|_| Error::FailedCreatingDirectory(parent.to_path_buf()))?;
			}

			let mut entry_reader = self.reader.reader_without_entry(i).await?;
			let mut out = fs_err::tokio::File::create(&dest_path).await?;
			tokio::io::copy(&mut entry_reader, &mut out)
				.await
				.map_err(|_| Error::FailedDecompressingFile(filename.clone()))?;

			reporter.report_entry(&filename);
		}

		reporter.report_done();
		Ok(())
	}
}

/// Detects whether every entry in `entry_names` shares one common
/// top-level directory component (the archive's wrapping subfolder). If
/// so, returns its name.
#[must_use]
pub fn detect_subfolder(entry_names: &[String]) -> Option<String> {
	let mut top: Option<&str> = None;
	for name in entry_names {
		let normalized = name.trim_start_matches('/');
		let first = normalized.split('/').next().unwrap_or("");
		if first.is_empty() || first == normalized {
			return None;
		}
		match top {
			None => top = Some(first),
			Some(t) if t == first => {}
			Some(_) => return None,
		}
	}
	top.map(str::to_string)
}

/// Joins `entry_name` onto `dest_dir`, stripping `strip_prefix` and
/// rejecting traversal outside `dest_dir`. Returns `Ok(None)` when the
/// entry is exactly the wrapping directory itself (nothing to extract).
fn secure_join(dest_dir: &Path, entry_name: &str, strip_prefix: Option<&str>) -> Result<Option<PathBuf>> {
	let normalized = entry_name.replace('\\', "/");

	let relative = match strip_prefix {
		Some(prefix) => {
			let with_slash = format!("{prefix}/");
			match normalized.strip_prefix(&with_slash) {
				Some(rest) => rest,
				None if normalized == prefix => return Ok(None),
				None => normalized.as_str(),
			}
		}
		None => normalized.as_str(),
	};

	if relative.is_empty() {
		return Ok(None);
	}

	let path = Path::new(relative);
	if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
		return Err(Error::InsecureZipFileName(entry_name.to_string()));
	}

	let joined = dest_dir.join(path);
	if !joined.starts_with(dest_dir) {
		return Err(Error::InsecureZipFileName(entry_name.to_string()));
	}

	Ok(Some(joined))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_common_wrapping_directory() {
		let names = vec![
			"Wrapper/ARM.CMSIS.pdsc".to_string(),
			"Wrapper/CMSIS/Core.h".to_string(),
		];
		assert_eq!(detect_subfolder(&names), Some("Wrapper".to_string()));
	}

	#[test]
	fn no_subfolder_when_entries_at_root() {
		let names = vec!["ARM.CMSIS.pdsc".to_string(), "CMSIS/Core.h".to_string()];
		assert_eq!(detect_subfolder(&names), None);
	}

	#[test]
	fn no_subfolder_when_entries_disagree() {
		let names = vec!["A/file.txt".to_string(), "B/file.txt".to_string()];
		assert_eq!(detect_subfolder(&names), None);
	}

	#[test]
	fn secure_join_rejects_parent_traversal() {
		let dest = Path::new("/tmp/dest");
		let err = secure_join(dest, "../escape.txt", None).unwrap_err();
		assert!(matches!(err, Error::InsecureZipFileName(_)));
	}

	#[test]
	fn secure_join_rejects_absolute_paths() {
		let dest = Path::new("/tmp/dest");
		let err = secure_join(dest, "/etc/passwd", None).unwrap_err();
		assert!(matches!(err, Error::InsecureZipFileName(_)));
	}

	#[test]
	fn secure_join_strips_prefix() {
		let dest = Path::new("/tmp/dest");
		let path = secure_join(dest, "Wrapper/ARM.CMSIS.pdsc", Some("Wrapper"))
			.unwrap()
			.unwrap();
		assert_eq!(path, Path::new("/tmp/dest/ARM.CMSIS.pdsc"));
	}

	#[test]
	fn secure_join_skips_wrapping_dir_entry_itself() {
		let dest = Path::new("/tmp/dest");
		assert!(secure_join(dest, "Wrapper/", Some("Wrapper")).unwrap().is_none());
	}
}

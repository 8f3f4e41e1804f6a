//! Small filesystem helpers shared by the layout manager, the index store
//! and the installation engine.

use crate::error::{Error, Result};
use std::path::Path;
use tempfile::Builder;
use tokio::io::AsyncWriteExt as _;

/// Writes `contents` to `path` atomically: a sibling temp file in the same
/// directory is written and fsynced, then renamed over `path`. Grounded on
/// the CAS writer's temp-then-persist pattern.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
	let parent = path
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	fs_err::tokio::create_dir_all(parent).await?;

	let temp_path = Builder::new()
		.prefix(".cpackget-tmp-")
		.tempfile_in(parent)
		.map_err(|e| Error::Io(e.into()))?
		.into_temp_path();

	{
		let mut file = fs_err::tokio::File::create(&temp_path).await?;
		file.write_all(contents).await?;
		file.flush().await?;
	}

	temp_path
		.persist(path)
		.map_err(|e| Error::Io(e.error))?;
	Ok(())
}

/// Toggles the read-only attribute on a single file or directory (not
/// recursive). On Windows, file deletion is disallowed on read-only files,
/// so locking is a no-op there and reliance falls on the advisory nature of
/// the invariant (spec.md §3 invariant 3 / §9 "read-only as locking").
pub async fn set_readonly(path: &Path, readonly: bool) -> Result<()> {
	#[cfg(windows)]
	if readonly {
		return Ok(());
	}

	let mut permissions = fs_err::tokio::metadata(path).await?.permissions();
	if readonly {
		permissions.set_readonly(true);
	} else {
		#[cfg(windows)]
		#[allow(clippy::permissions_set_readonly_false)]
		{
			permissions.set_readonly(false);
		}

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt as _;
			permissions.set_mode(permissions.mode() | 0o644);
		}
	}

	fs_err::tokio::set_permissions(path, permissions).await?;
	Ok(())
}

/// Recursively toggles the read-only attribute over every file and
/// directory under `root`, including `root` itself.
pub async fn set_readonly_recursive(root: &Path, readonly: bool) -> Result<()> {
	if !fs_err::tokio::try_exists(root).await? {
		return Ok(());
	}

	let metadata = fs_err::tokio::metadata(root).await?;
	if metadata.is_dir() {
		let mut entries = fs_err::tokio::read_dir(root).await?;
		while let Some(entry) = entries.next_entry().await? {
			Box::pin(set_readonly_recursive(&entry.path(), readonly)).await?;
		}
	}
	set_readonly(root, readonly).await
}

/// Removes `dir` and then any now-empty ancestor up to (but not including)
/// `stop_at`, implementing `PruneEmpty` (spec.md §4.4 / invariant 2 in §3).
pub async fn prune_empty(dir: &Path, stop_at: &Path) -> Result<()> {
	let mut current = dir.to_path_buf();
	loop {
		match fs_err::tokio::read_dir(&current).await {
			Ok(mut entries) => {
				if entries.next_entry().await?.is_some() {
					break;
				}
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
			Err(e) => return Err(Error::Io(e)),
		}

		fs_err::tokio::remove_dir(&current).await?;

		let Some(parent) = current.parent() else {
			break;
		};
		if parent == stop_at || !parent.starts_with(stop_at) {
			break;
		}
		current = parent.to_path_buf();
	}
	Ok(())
}

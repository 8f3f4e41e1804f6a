//! The pack-root layout: the four subdirectories, the mtime sentinel, and
//! the read-only-at-rest invariant (spec.md §3, §4.4).
//!
//! Per spec.md §9 ("read-only as locking"), the read-only attribute is
//! treated here purely as an at-rest invariant, not a concurrency
//! primitive — concurrent invocations against the same root are the
//! caller's problem to serialize (spec.md §5).

use crate::error::{Error, Result};
use crate::pidx::PidxFile;
use crate::util;
use futures::FutureExt as _;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The default time-to-live for the public index before `SetPackRoot`
/// considers it stale enough to refresh (spec.md §4.4).
pub const DEFAULT_INDEX_TTL_SECS: u64 = 24 * 60 * 60;

/// A handle onto an initialized pack root.
#[derive(Debug, Clone)]
pub struct PackRoot {
	root: PathBuf,
}

impl PackRoot {
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub fn web_dir(&self) -> PathBuf {
		self.root.join(".Web")
	}

	#[must_use]
	pub fn local_dir(&self) -> PathBuf {
		self.root.join(".Local")
	}

	#[must_use]
	pub fn download_dir(&self) -> PathBuf {
		self.root.join(".Download")
	}

	#[must_use]
	pub fn pack_idx_path(&self) -> PathBuf {
		self.root.join("pack.idx")
	}

	#[must_use]
	pub fn public_index_path(&self) -> PathBuf {
		self.web_dir().join("index.pidx")
	}

	#[must_use]
	pub fn local_index_path(&self) -> PathBuf {
		self.local_dir().join("local_repository.pidx")
	}

	/// The directory a pack's extracted contents live in: `R/<Vendor>/<Name>/<Version>/`.
	#[must_use]
	pub fn install_dir(&self, vendor: &str, name: &str, version: &str) -> PathBuf {
		self.root.join(vendor).join(name).join(version)
	}

	/// `SetPackRoot(path, create, refresh)`: validates and, if requested,
	/// materializes `path` as a pack root, returning a handle to it. When
	/// `refresh` is set and the public index is missing or older than
	/// [`DEFAULT_INDEX_TTL_SECS`], a best-effort sparse refresh is attempted
	/// against the URL stored in the existing index (spec.md §4.4); failure
	/// to refresh (offline, no stored URL yet) is logged but does not fail
	/// `set_pack_root` itself, since the refresh is explicitly optional.
	#[instrument(skip_all, fields(root = %path.display()))]
	pub async fn set_pack_root(path: &Path, create: bool, refresh: bool) -> Result<Self> {
		if path.as_os_str().is_empty() {
			return Err(Error::PackRootNotFound);
		}

		let exists = fs_err::tokio::try_exists(path).await?;
		if !exists {
			if !create {
				return Err(Error::PackRootDoesNotExist(path.to_path_buf()));
			}
		}

		let root = Self { root: path.to_path_buf() };
		root.ensure_root(create).await?;

		if refresh && root.public_index_stale(std::time::Duration::from_secs(DEFAULT_INDEX_TTL_SECS)).await? {
			root.try_refresh_public_index().await;
		}

		Ok(root)
	}

	/// Best-effort sparse refresh of the public index against its own
	/// stored URL, used by [`Self::set_pack_root`]'s `refresh` flag.
	async fn try_refresh_public_index(&self) {
		let synchronizer = match crate::sync::Synchronizer::new(self.clone()) {
			Ok(s) => s,
			Err(e) => {
				tracing::warn!(error = %e, "failed to build index synchronizer for startup refresh");
				return;
			}
		};
		let options = crate::sync::SyncOptions {
			source: crate::sync::IndexSource::Current,
			sparse: true,
			..Default::default()
		};
		if let Err(e) = synchronizer
			.update_public_index(&options, &tokio_util::sync::CancellationToken::new(), std::sync::Arc::new(()))
			.await
		{
			tracing::warn!(error = %e, "startup public index refresh skipped");
		}
	}

	/// `EnsureRoot(create)`: materializes the four subdirectories.
	#[instrument(skip(self))]
	pub async fn ensure_root(&self, create: bool) -> Result<()> {
		if !create && !fs_err::tokio::try_exists(&self.root).await? {
			return Err(Error::PackRootDoesNotExist(self.root.clone()));
		}

		for dir in [
			self.root.clone(),
			self.web_dir(),
			self.local_dir(),
			self.download_dir(),
		] {
			fs_err::tokio::create_dir_all(&dir)
				.await
				.map_err(|_| Error::FailedCreatingDirectory(dir.clone()))?;
		}

		Ok(())
	}

	/// `Unlock()`: clears the read-only attribute on `.Web/`, `.Local/`,
	/// `.Download/` and the root, recursively, leaving `pack.idx` writable
	/// (it already is, since it is never marked read-only).
	#[instrument(skip(self))]
	pub async fn unlock(&self) -> Result<()> {
		util::set_readonly(&self.root, false).await?;
		for dir in [self.web_dir(), self.local_dir(), self.download_dir()] {
			util::set_readonly_recursive(&dir, false).await?;
		}
		Ok(())
	}

	/// `Lock()`: the inverse of [`Self::unlock`]. Always called on exit from
	/// a mutating engine entry point, success or failure.
	#[instrument(skip(self))]
	pub async fn lock(&self) -> Result<()> {
		for dir in [self.web_dir(), self.local_dir(), self.download_dir()] {
			util::set_readonly_recursive(&dir, true).await?;
		}
		util::set_readonly(&self.root, true).await?;
		Ok(())
	}

	/// `PruneEmpty(path)`: removes `path` and any now-empty ancestor, up to
	/// (not including) the pack root.
	pub async fn prune_empty(&self, path: &Path) -> Result<()> {
		util::prune_empty(path, &self.root).await
	}

	/// `TouchPackIdx()`: bumps `pack.idx`'s mtime, creating it if absent.
	#[instrument(skip(self))]
	pub async fn touch_pack_idx(&self) -> Result<()> {
		let path = self.pack_idx_path();
		if !fs_err::tokio::try_exists(&path).await? {
			fs_err::tokio::File::create(&path).await?;
		}
		let now = filetime::FileTime::now();
		let path_owned = path.clone();
		tokio::task::spawn_blocking(move || filetime::set_file_mtime(&path_owned, now))
			.await
			.map_err(|_| Error::AlreadyLogged)?
			.map_err(Error::Io)
	}

	/// The public index, or an empty one if it does not exist yet.
	pub async fn read_public_index(&self) -> Result<PidxFile> {
		PidxFile::read_or_default(&self.public_index_path()).await
	}

	/// The local index, or an empty one if it does not exist yet.
	pub async fn read_local_index(&self) -> Result<PidxFile> {
		PidxFile::read_or_default(&self.local_index_path()).await
	}

	/// Whether the public index is missing or older than `ttl`.
	pub async fn public_index_stale(&self, ttl: std::time::Duration) -> Result<bool> {
		match fs_err::tokio::metadata(self.public_index_path()).await {
			Ok(meta) => {
				let modified = meta.modified()?;
				Ok(modified.elapsed().map(|age| age > ttl).unwrap_or(true))
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
			Err(e) => Err(Error::Io(e)),
		}
	}
}

/// Runs `body` with the pack root unlocked, guaranteeing it is re-locked
/// before returning on every exit path (success, error, or panic
/// unwinding past this frame), per the Unlock…Lock bracket spec.md §4.4
/// requires around every mutating engine entry point. A panic inside
/// `body` is caught, the lock is restored, and the panic is then resumed
/// so it still propagates to the caller.
pub async fn with_unlocked<T, F, Fut>(root: &PackRoot, body: F) -> Result<T>
where
	F: FnOnce() -> Fut,
	Fut: std::future::Future<Output = Result<T>>,
{
	root.unlock().await?;
	let outcome = AssertUnwindSafe(body()).catch_unwind().await;
	root.lock().await?;
	match outcome {
		Ok(result) => result,
		Err(payload) => std::panic::resume_unwind(payload),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[tokio::test]
	async fn set_pack_root_creates_subdirectories() {
		let dir = tempdir().unwrap();
		let root_path = dir.path().join("packs");
		let root = PackRoot::set_pack_root(&root_path, true, false).await.unwrap();

		assert!(fs_err::tokio::try_exists(root.web_dir()).await.unwrap());
		assert!(fs_err::tokio::try_exists(root.local_dir()).await.unwrap());
		assert!(fs_err::tokio::try_exists(root.download_dir()).await.unwrap());
	}

	#[tokio::test]
	async fn set_pack_root_without_create_fails_if_missing() {
		let dir = tempdir().unwrap();
		let root_path = dir.path().join("missing");
		let err = PackRoot::set_pack_root(&root_path, false, false).await.unwrap_err();
		assert!(matches!(err, Error::PackRootDoesNotExist(_)));
	}

	#[tokio::test]
	async fn empty_path_fails_pack_root_not_found() {
		let err = PackRoot::set_pack_root(Path::new(""), true, false).await.unwrap_err();
		assert!(matches!(err, Error::PackRootNotFound));
	}

	#[tokio::test]
	async fn touch_pack_idx_creates_sentinel() {
		let dir = tempdir().unwrap();
		let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();
		root.touch_pack_idx().await.unwrap();
		assert!(fs_err::tokio::try_exists(root.pack_idx_path()).await.unwrap());
	}
}

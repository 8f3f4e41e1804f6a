//! Scenario 6 (spec.md §8): `Remove(reference, purge=true)` deletes the
//! installed pack, prunes its now-empty parent directories, and clears the
//! download cache entries for that exact version.

mod support;

use cpackget::{Engine, PackRoot};
use tempfile::tempdir;

#[tokio::test]
async fn remove_with_purge_clears_install_and_download_cache() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	support::fabricate_installed_pack(root.path(), "TheVendor", "PublicLocalPack", "1.2.3").await;

	let download_dir = root.download_dir();
	fs_err::tokio::write(download_dir.join("TheVendor.PublicLocalPack.1.2.3.pack"), b"archive bytes").await.unwrap();
	fs_err::tokio::write(download_dir.join("TheVendor.PublicLocalPack.1.2.3.pdsc"), b"pdsc bytes").await.unwrap();

	let engine = Engine::new(root.clone()).unwrap();
	engine.remove("TheVendor.PublicLocalPack.1.2.3", true).await.unwrap();

	let version_dir = root.path().join("TheVendor").join("PublicLocalPack").join("1.2.3");
	assert!(!fs_err::tokio::try_exists(&version_dir).await.unwrap(), "version directory must be gone");

	let name_dir = root.path().join("TheVendor").join("PublicLocalPack");
	assert!(!fs_err::tokio::try_exists(&name_dir).await.unwrap(), "emptied name directory must be pruned");
	let vendor_dir = root.path().join("TheVendor");
	assert!(!fs_err::tokio::try_exists(&vendor_dir).await.unwrap(), "emptied vendor directory must be pruned");

	let mut entries = fs_err::tokio::read_dir(&download_dir).await.unwrap();
	let mut remaining = Vec::new();
	while let Some(entry) = entries.next_entry().await.unwrap() {
		remaining.push(entry.file_name());
	}
	assert!(remaining.is_empty(), "download cache entries for the purged version must be gone, found {remaining:?}");
}

//! Scenario 4 (spec.md §8): `Add` against a minimum-version reference that
//! the already-installed pack already satisfies is a no-op.

mod support;

use cpackget::{AddContext, AddOptions, Engine, PackRoot};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn minimum_version_satisfied_by_pre_installed_is_a_no_op() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	let pdsc_url = "https://example.com/packs/";
	let pdsc_xml = support::pdsc_xml("TheVendor", "PublicLocalPack", "1.2.4", pdsc_url);
	fs_err::tokio::write(root.web_dir().join("TheVendor.PublicLocalPack.pdsc"), &pdsc_xml).await.unwrap();

	support::fabricate_installed_pack(root.path(), "TheVendor", "PublicLocalPack", "1.2.4").await;
	root.touch_pack_idx().await.unwrap();
	let pre_mtime = fs_err::tokio::metadata(root.pack_idx_path()).await.unwrap().modified().unwrap();

	let engine = Engine::new(root.clone()).unwrap();
	let options = AddOptions {
		check_eula: false,
		extract_eula: false,
		force_reinstall: false,
		no_requirements: true,
		timeout: Duration::ZERO,
	};
	engine
		.add("TheVendor::PublicLocalPack>=1.2.3", &options, &AddContext::default())
		.await
		.unwrap();

	let post_mtime = fs_err::tokio::metadata(root.pack_idx_path()).await.unwrap().modified().unwrap();
	assert_eq!(pre_mtime, post_mtime, "pack.idx must be untouched by a no-op add");

	let marker = root.install_dir("TheVendor", "PublicLocalPack", "1.2.4").join("include").join("Driver_Common.h");
	assert!(fs_err::tokio::try_exists(&marker).await.unwrap());
}

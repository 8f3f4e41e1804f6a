//! Scenario 1 (spec.md §8): fresh install of a public pack supplied as a
//! local archive file.

mod support;

use cpackget::{AddContext, AddOptions, Engine, PackRoot};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn fresh_install_of_public_pack() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	let pdsc_url = "https://example.com/packs/";
	let pdsc_xml = support::pdsc_xml("TheVendor", "PublicLocalPack", "1.2.3", pdsc_url);
	fs_err::tokio::write(root.web_dir().join("TheVendor.PublicLocalPack.pdsc"), &pdsc_xml).await.unwrap();

	let mut index = root.read_public_index().await.unwrap();
	index
		.add_pdsc(cpackget::pidx::PdscTag {
			vendor: "TheVendor".to_string(),
			name: "PublicLocalPack".to_string(),
			url: pdsc_url.to_string(),
			version: Some("1.2.3".to_string()),
		})
		.unwrap();
	index.write_atomic(&root.public_index_path()).await.unwrap();

	let archive_bytes = support::build_pack_archive("TheVendor", "PublicLocalPack", "1.2.3", pdsc_url).await;
	let archive_path = dir.path().join("TheVendor.PublicLocalPack.1.2.3.pack");
	fs_err::tokio::write(&archive_path, &archive_bytes).await.unwrap();

	let pre_mtime = fs_err::tokio::metadata(root.pack_idx_path()).await.ok().and_then(|m| m.modified().ok());

	let engine = Engine::new(root.clone()).unwrap();
	let options = AddOptions {
		check_eula: false,
		extract_eula: false,
		force_reinstall: false,
		no_requirements: false,
		timeout: Duration::ZERO,
	};
	engine.add(archive_path.to_str().unwrap(), &options, &AddContext::default()).await.unwrap();

	let install_dir = root.install_dir("TheVendor", "PublicLocalPack", "1.2.3");
	assert!(fs_err::tokio::try_exists(&install_dir).await.unwrap());
	let mut entries = fs_err::tokio::read_dir(&install_dir).await.unwrap();
	assert!(entries.next_entry().await.unwrap().is_some(), "install dir must be non-empty");
	assert!(fs_err::tokio::metadata(&install_dir).await.unwrap().permissions().readonly());

	assert!(fs_err::tokio::try_exists(root.download_dir().join("TheVendor.PublicLocalPack.1.2.3.pack")).await.unwrap());
	assert!(fs_err::tokio::try_exists(root.download_dir().join("TheVendor.PublicLocalPack.1.2.3.pdsc")).await.unwrap());

	assert!(!fs_err::tokio::try_exists(root.local_dir().join("TheVendor.PublicLocalPack.pdsc")).await.unwrap());

	let post_mtime = fs_err::tokio::metadata(root.pack_idx_path()).await.unwrap().modified().unwrap();
	if let Some(pre) = pre_mtime {
		assert!(post_mtime > pre);
	}
}

//! Scenario 2 (spec.md §8): installing a non-public pack through a
//! `Vendor.Name.Version` identifier whose PDSC points at an HTTP server.

mod support;

use cpackget::{AddContext, AddOptions, Engine, PackRoot};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn install_non_public_via_identifier_with_pdsc_url() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	let archive_bytes = support::build_pack_archive("TheVendor", "NonPublicLocalPack", "1.2.3", "placeholder").await;
	let mut routes = HashMap::new();
	routes.insert("/TheVendor.NonPublicLocalPack.1.2.3.pack".to_string(), archive_bytes);
	let server = support::StubServer::start(routes, 1);

	let pdsc_xml = support::pdsc_xml("TheVendor", "NonPublicLocalPack", "1.2.3", &format!("{}/", server.base_url));
	fs_err::tokio::write(root.local_dir().join("TheVendor.NonPublicLocalPack.pdsc"), &pdsc_xml).await.unwrap();

	let engine = Engine::new(root.clone()).unwrap();
	let options = AddOptions {
		check_eula: false,
		extract_eula: false,
		force_reinstall: false,
		no_requirements: false,
		timeout: Duration::from_secs(5),
	};
	engine
		.add("TheVendor.NonPublicLocalPack.1.2.3", &options, &AddContext::default())
		.await
		.unwrap();

	let install_dir = root.install_dir("TheVendor", "NonPublicLocalPack", "1.2.3");
	assert!(fs_err::tokio::try_exists(&install_dir).await.unwrap());

	assert!(fs_err::tokio::try_exists(root.local_dir().join("TheVendor.NonPublicLocalPack.pdsc")).await.unwrap());
	assert!(!fs_err::tokio::try_exists(root.web_dir().join("TheVendor.NonPublicLocalPack.pdsc")).await.unwrap());
}

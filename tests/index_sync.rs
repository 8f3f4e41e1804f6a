//! Scenario 5 (spec.md §8): a non-sparse `UpdatePublicIndex` refetches every
//! mirrored PDSC whose recorded version drifted, bounded by a concurrency
//! limit, via the same fan-out this scenario exercises concurrently.

mod support;

use cpackget::pidx::{PdscTag, PidxFile};
use cpackget::sync::{IndexSource, SyncOptions, Synchronizer};
use cpackget::PackRoot;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn concurrent_refresh_updates_every_stale_pdsc() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	let pack_count = 10;
	let mut routes = HashMap::new();
	let mut index = PidxFile::empty();

	for i in 0..pack_count {
		let vendor = format!("Vendor{i}");
		let name = format!("Name{i}");

		let stale_xml = support::pdsc_xml(&vendor, &name, "1.2.3", "https://example.com/");
		fs_err::tokio::write(root.web_dir().join(format!("{vendor}.{name}.pdsc")), &stale_xml).await.unwrap();

		let path = format!("/{vendor}.{name}.pdsc");
		let fresh_xml = support::pdsc_xml(&vendor, &name, "1.2.4", "https://example.com/");
		routes.insert(path.clone(), fresh_xml.into_bytes());

		index
			.add_pdsc(PdscTag {
				vendor,
				name,
				url: path,
				version: Some("1.2.4".to_string()),
			})
			.unwrap();
	}

	let server = support::StubServer::start(routes, pack_count + 1);

	// Rewrite each tag's URL now that the server's ephemeral port is known,
	// then register `index.pidx` itself once the tag URLs are final.
	for tag in &mut index.tags {
		tag.url = format!("{}{}", server.base_url, tag.url);
	}
	let index_xml = index.to_xml().unwrap();
	server.insert_route("/index.pidx".to_string(), index_xml.into_bytes());

	let synchronizer = Synchronizer::new(root.clone()).unwrap();
	let options = SyncOptions {
		source: IndexSource::Url(format!("{}/index.pidx", server.base_url)),
		sparse: false,
		download_pdsc: false,
		download_remaining: false,
		concurrency: 5,
		timeout: Duration::from_secs(5),
	};

	synchronizer
		.update_public_index(&options, &CancellationToken::new(), Arc::new(()))
		.await
		.unwrap();

	for i in 0..pack_count {
		let vendor = format!("Vendor{i}");
		let name = format!("Name{i}");
		let xml = fs_err::tokio::read_to_string(root.web_dir().join(format!("{vendor}.{name}.pdsc"))).await.unwrap();
		let doc = cpackget::pdsc::PdscDocument::parse(&xml).unwrap();
		assert_eq!(cpackget::pdsc::latest_version_str(&doc), Some("1.2.4"), "{vendor}::{name} did not refresh");
	}
}

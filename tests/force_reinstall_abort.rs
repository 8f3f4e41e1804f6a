//! Scenario 3 (spec.md §8): `force-reinstall` aborted mid-extraction by the
//! user restores the pre-existing install directory and leaves no
//! checkpoint behind.

mod support;

use cpackget::reporters::ExtractProgressReporter;
use cpackget::{AddContext, AddOptions, Engine, Error, PackRoot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

struct AbortAfterN {
	cancellation: CancellationToken,
	seen: AtomicUsize,
	limit: usize,
}

impl ExtractProgressReporter for AbortAfterN {
	fn report_entry(&self, _name: &str) {
		if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
			self.cancellation.cancel();
		}
	}
}

#[tokio::test]
async fn force_reinstall_abort_restores_original_directory() {
	let dir = tempdir().unwrap();
	let root = PackRoot::set_pack_root(&dir.path().join("packs"), true, false).await.unwrap();

	let install_dir = root.install_dir("TheVendor", "PackToReinstall", "1.2.3");
	fs_err::tokio::create_dir_all(&install_dir).await.unwrap();
	fs_err::tokio::write(install_dir.join("marker.txt"), b"original contents").await.unwrap();

	let archive_bytes = support::build_zip(&[
		("TheVendor.PackToReinstall.pdsc", support::pdsc_xml("TheVendor", "PackToReinstall", "1.2.3", "https://example.com/").as_bytes()),
		("include/A.h", b"a"),
		("include/B.h", b"b"),
		("include/C.h", b"c"),
	])
	.await;
	let archive_path = dir.path().join("TheVendor.PackToReinstall.1.2.3.pack");
	fs_err::tokio::write(&archive_path, &archive_bytes).await.unwrap();

	let cancellation = CancellationToken::new();
	let reporter = Arc::new(AbortAfterN { cancellation: cancellation.clone(), seen: AtomicUsize::new(0), limit: 2 });

	let engine = Engine::new(root.clone()).unwrap();
	let options = AddOptions {
		check_eula: false,
		extract_eula: false,
		force_reinstall: true,
		no_requirements: true,
		timeout: Duration::ZERO,
	};
	let ctx = AddContext {
		extract_reporter: reporter,
		cancellation,
		..Default::default()
	};

	let err = engine.add(archive_path.to_str().unwrap(), &options, &ctx).await.unwrap_err();
	assert!(matches!(err, Error::TerminatedByUser));

	let contents = fs_err::tokio::read(install_dir.join("marker.txt")).await.unwrap();
	assert_eq!(contents, b"original contents");

	let checkpoint_dir = install_dir.with_file_name("1.2.3_tmp");
	assert!(!fs_err::tokio::try_exists(&checkpoint_dir).await.unwrap());
}

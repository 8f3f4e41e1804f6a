//! Fixtures shared across the integration tests: building an in-memory
//! `.pack` archive, writing PDSC/PIDX files straight to disk, and a tiny
//! blocking HTTP server for the scenarios that exercise the Download/Fetch
//! Service.

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Builds an uncompressed zip archive from `entries` (name, contents).
pub async fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
	let mut writer = ZipFileWriter::new(Vec::new());
	for (name, data) in entries.iter().copied() {
		let builder = ZipEntryBuilder::new(name.to_string().into(), Compression::Stored);
		writer.write_entry_whole(builder, data).await.expect("failed to write zip entry");
	}
	writer.close().await.expect("failed to finalize zip")
}

/// A minimal PDSC document with a single release, for fixtures that don't
/// need to exercise version resolution across multiple releases.
pub fn pdsc_xml(vendor: &str, name: &str, version: &str, url: &str) -> String {
	format!(
		r#"<?xml version="1.0" encoding="UTF-8"?>
<package schemaVersion="1.7.0">
	<vendor>{vendor}</vendor>
	<name>{name}</name>
	<url>{url}</url>
	<releases>
		<release version="{version}">test release</release>
	</releases>
</package>
"#
	)
}

/// Builds a `.pack` archive embedding `vendor.name.pdsc` at its root,
/// asserting `version` as the PDSC's `LatestVersion` (the engine requires
/// these to match — spec.md §3 invariant 5).
pub async fn build_pack_archive(vendor: &str, name: &str, version: &str, pdsc_url: &str) -> Vec<u8> {
	let pdsc = pdsc_xml(vendor, name, version, pdsc_url);
	let header = format!("{vendor}.{name} support header\n");
	build_zip(&[
		(&format!("{vendor}.{name}.pdsc"), pdsc.as_bytes()),
		("include/Driver_Common.h", header.as_bytes()),
	])
	.await
}

/// A single-request, single-response blocking HTTP stub server, run on its
/// own OS thread so it doesn't block the async test runtime. Serves exactly
/// the bodies in `routes` (keyed by request path) and then shuts down.
pub struct StubServer {
	pub base_url: String,
	routes: Arc<Mutex<HashMap<String, Vec<u8>>>>,
	handle: Option<std::thread::JoinHandle<()>>,
}

impl StubServer {
	pub fn start(routes: HashMap<String, Vec<u8>>, request_count: usize) -> Self {
		let server = tiny_http::Server::http("127.0.0.1:0").expect("failed to bind stub server");
		let addr = server.server_addr();
		let base_url = format!("http://{addr}");

		let routes = Arc::new(Mutex::new(routes));
		let routes_for_thread = routes.clone();
		let handle = std::thread::spawn(move || {
			for _ in 0..request_count {
				let Ok(request) = server.recv() else { break };
				let path = request.url().to_string();
				let body = routes_for_thread.lock().unwrap().get(&path).cloned();
				match body {
					Some(body) => {
						let response = tiny_http::Response::from_data(body);
						let _ = request.respond(response);
					}
					None => {
						let response = tiny_http::Response::from_string("not found").with_status_code(404);
						let _ = request.respond(response);
					}
				}
			}
		});

		Self { base_url, routes, handle: Some(handle) }
	}

	/// Registers (or overwrites) a route after the server has already started,
	/// for fixtures whose body depends on the server's own ephemeral port.
	pub fn insert_route(&self, path: String, body: Vec<u8>) {
		self.routes.lock().unwrap().insert(path, body);
	}
}

impl Drop for StubServer {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

/// Fabricates an already-installed pack's directory directly, for tests
/// that need pre-existing state without going through [`cpackget::Engine::add`].
pub async fn fabricate_installed_pack(root: &Path, vendor: &str, name: &str, version: &str) {
	let install_dir = root.join(vendor).join(name).join(version).join("include");
	fs_err::tokio::create_dir_all(&install_dir).await.unwrap();
	fs_err::tokio::write(install_dir.join("Driver_Common.h"), b"stub").await.unwrap();
}

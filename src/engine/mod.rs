//! Installation Engine (spec.md §4.7): add, remove, update and list
//! installed packs.
//!
//! Per spec.md §9's reframing of the source's process-wide installation
//! singleton, [`Engine`] is an explicit value constructed by
//! [`crate::layout::PackRoot::set_pack_root`] and threaded through every
//! call — nothing here is global state, so tests can run several engines
//! concurrently against different roots.

mod eula;

use crate::archive::{detect_subfolder, ZipArchive};
use crate::error::{Error, Result};
use crate::fetch::FetchClient;
use crate::layout::{with_unlocked, PackRoot};
use crate::pdsc::{self, PdscDocument};
use crate::pidx::PdscTag;
use crate::refs::{version_without_build_metadata, Origin, PackReference, VersionModifier};
use crate::reporters::{DownloadProgressReporter, EulaPrompt, ExtractProgressReporter};
use crate::util;
use crate::version;
use semver::Version;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Flags accepted by `pack add`/`pack update` (spec.md §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
	pub check_eula: bool,
	pub extract_eula: bool,
	pub force_reinstall: bool,
	pub no_requirements: bool,
	pub timeout: Duration,
}

/// Reporting and interactive capabilities consumed while adding a pack.
/// Every field defaults to the no-op `()` implementation.
#[derive(Clone)]
pub struct AddContext {
	pub download_reporter: Arc<dyn DownloadProgressReporter>,
	pub extract_reporter: Arc<dyn ExtractProgressReporter>,
	pub eula_prompt: Arc<dyn EulaPrompt>,
	pub cancellation: CancellationToken,
}

impl Default for AddContext {
	fn default() -> Self {
		Self {
			download_reporter: Arc::new(()),
			extract_reporter: Arc::new(()),
			eula_prompt: Arc::new(()),
			cancellation: CancellationToken::new(),
		}
	}
}

/// A resolved installation intent (spec.md §3 `PackRecord`). Built fresh on
/// every add/remove/update call; never persisted.
#[derive(Debug, Clone)]
struct PackRecord {
	vendor: String,
	name: String,
	resolved_version: Version,
	is_public: bool,
	target_url: String,
	pdsc: PdscDocument,
}

/// Which listing view `list` should produce (spec.md §4.7.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
	Installed,
	Cached,
	Public,
}

/// A single line of `list` output.
#[derive(Debug, Clone)]
pub struct ListEntry {
	pub identifier: String,
	pub vendor: String,
	pub name: String,
	pub installed: bool,
	pub cached: bool,
	/// Set for installed entries: whether a newer release is public.
	pub update_available: bool,
	/// Set for installed entries: whether a declared dependency is not installed.
	pub requirements_unmet: bool,
}

/// The installation engine for a single pack root.
pub struct Engine {
	root: PackRoot,
	fetch: FetchClient,
}

impl Engine {
	pub fn new(root: PackRoot) -> Result<Self> {
		Ok(Self {
			root,
			fetch: FetchClient::new()?,
		})
	}

	#[must_use]
	pub fn root(&self) -> &PackRoot {
		&self.root
	}

	/// `Add(reference, options)` (spec.md §4.7.1).
	#[instrument(skip(self, options, ctx), fields(reference))]
	pub async fn add(&self, reference: &str, options: &AddOptions, ctx: &AddContext) -> Result<()> {
		let (reference, is_dependency) = match reference.strip_prefix('$') {
			Some(rest) => (rest, true),
			None => (reference, false),
		};
		tracing::Span::current().record("reference", reference);
		if is_dependency {
			tracing::debug!("installing as a dependency");
		}

		let parsed: PackReference = reference.parse()?;
		let mut visited = HashSet::new();
		with_unlocked(&self.root, || self.add_inner(parsed, options, ctx, &mut visited)).await
	}

	async fn add_inner(
		&self,
		reference: PackReference,
		options: &AddOptions,
		ctx: &AddContext,
		visited: &mut HashSet<(String, String)>,
	) -> Result<()> {
		let key = (reference.vendor.clone(), reference.name.clone());
		if !visited.insert(key.clone()) {
			tracing::error!(vendor = %key.0, name = %key.1, "dependency cycle detected");
			return Err(Error::AlreadyLogged);
		}

		let record = self.resolve_record(&reference).await?;
		let version_stem = version_without_build_metadata(&record.resolved_version);
		let install_dir = self.root.install_dir(&record.vendor, &record.name, &version_stem);
		let already_installed = fs_err::tokio::try_exists(&install_dir).await?;

		if already_installed && !options.force_reinstall {
			tracing::info!(vendor = %record.vendor, name = %record.name, version = %version_stem, "already installed");
			return Ok(());
		}

		let checkpoint = if already_installed && options.force_reinstall {
			let checkpoint_dir = install_dir.with_file_name(format!("{version_stem}_tmp"));
			if fs_err::tokio::try_exists(&checkpoint_dir).await? {
				fs_err::tokio::remove_dir_all(&checkpoint_dir).await?;
			}
			fs_err::tokio::rename(&install_dir, &checkpoint_dir).await?;
			Some(checkpoint_dir)
		} else {
			None
		};

		match self.install_resolved(&reference, &record, &version_stem, &install_dir, options, ctx).await {
			Ok(()) => {
				if let Some(checkpoint_dir) = checkpoint {
					let _ = fs_err::tokio::remove_dir_all(&checkpoint_dir).await;
				}
			}
			Err(e) => {
				let _ = fs_err::tokio::remove_dir_all(&install_dir).await;
				if let Some(checkpoint_dir) = checkpoint {
					fs_err::tokio::rename(&checkpoint_dir, &install_dir).await?;
				}
				return Err(e);
			}
		}

		if !options.no_requirements {
			for dep in pdsc::dependencies(&record.pdsc) {
				let dep_ref = match &dep.version {
					Some(v) => format!("${}::{}@{v}", dep.vendor, dep.name),
					None => format!("${}::{}", dep.vendor, dep.name),
				};
				let parsed: PackReference = dep_ref.trim_start_matches('$').parse()?;
				Box::pin(self.add_inner(parsed, options, ctx, visited)).await?;
			}
		}

		self.root.touch_pack_idx().await?;
		Ok(())
	}

	/// Resolves a parsed reference to a concrete [`PackRecord`]: the
	/// target URL, the chosen release, and whether the pack is public.
	async fn resolve_record(&self, reference: &PackReference) -> Result<PackRecord> {
		match &reference.origin {
			Origin::LocalFile(path) => self.record_from_local_archive(reference, path).await,
			Origin::RemoteUrl(url) => self.record_from_remote_archive(reference, url.as_str()).await,
			Origin::Identifier => self.record_from_identifier(reference).await,
		}
	}

	async fn record_from_local_archive(&self, reference: &PackReference, path: &std::path::Path) -> Result<PackRecord> {
		let version = reference
			.version
			.clone()
			.ok_or_else(|| Error::BadPackName(path.display().to_string()))?;
		let bytes = fs_err::tokio::read(path).await?;
		let mut archive = ZipArchive::open(bytes).await?;
		let doc = read_embedded_pdsc(&mut archive, &reference.vendor, &reference.name, &version).await?;
		let is_public = self.pdsc_is_public(&reference.vendor, &reference.name).await?.unwrap_or(true);
		Ok(PackRecord {
			vendor: reference.vendor.clone(),
			name: reference.name.clone(),
			resolved_version: version,
			is_public,
			target_url: format!("file://{}", path.display()),
			pdsc: doc,
		})
	}

	async fn record_from_remote_archive(&self, reference: &PackReference, url: &str) -> Result<PackRecord> {
		let version = reference
			.version
			.clone()
			.ok_or_else(|| Error::BadPackURL(url.to_string()))?;
		let is_public = self.pdsc_is_public(&reference.vendor, &reference.name).await?.unwrap_or(true);
		Ok(PackRecord {
			vendor: reference.vendor.clone(),
			name: reference.name.clone(),
			resolved_version: version,
			is_public,
			target_url: url.to_string(),
			pdsc: PdscDocument {
				vendor: reference.vendor.clone(),
				name: reference.name.clone(),
				url: url.rsplit_once('/').map(|(base, _)| base.to_string()).unwrap_or_default(),
				license: None,
				releases: crate::pdsc::ReleasesXml::default(),
				requirements: None,
			},
		})
	}

	async fn record_from_identifier(&self, reference: &PackReference) -> Result<PackRecord> {
		let (doc, is_public, path) = self.find_pdsc(&reference.vendor, &reference.name).await?;
		let releases = pdsc::releases(&doc)?;
		let release = version::resolve(reference, &releases)?;
		let version_stem = version_without_build_metadata(&release.version);
		let url = release.url.clone().unwrap_or_else(|| {
			format!("{}/{}.{}.{}.pack", doc.url.trim_end_matches('/'), reference.vendor, reference.name, version_stem)
		});
		let _ = path;
		Ok(PackRecord {
			vendor: reference.vendor.clone(),
			name: reference.name.clone(),
			resolved_version: release.version.clone(),
			is_public,
			target_url: url,
			pdsc: doc,
		})
	}

	/// `FindPackURL` (spec.md §4.7.4), exposed for the CLI/other callers
	/// that need to resolve a URL without performing a full install.
	pub async fn find_pack_url(&self, reference: &PackReference) -> Result<String> {
		let record = self.resolve_record(reference).await?;
		Ok(record.target_url)
	}

	async fn find_pdsc(&self, vendor: &str, name: &str) -> Result<(PdscDocument, bool, PathBuf)> {
		let web_path = self.root.web_dir().join(format!("{vendor}.{name}.pdsc"));
		let local_path = self.root.local_dir().join(format!("{vendor}.{name}.pdsc"));

		let (path, is_public) = if fs_err::tokio::try_exists(&web_path).await? {
			(web_path, true)
		} else if fs_err::tokio::try_exists(&local_path).await? {
			(local_path, false)
		} else {
			return Err(Error::PackURLCannotBeFound(format!("{vendor}::{name}")));
		};

		let xml = fs_err::tokio::read_to_string(&path).await?;
		let doc = PdscDocument::parse(&xml)?;
		Ok((doc, is_public, path))
	}

	async fn pdsc_is_public(&self, vendor: &str, name: &str) -> Result<Option<bool>> {
		let web_path = self.root.web_dir().join(format!("{vendor}.{name}.pdsc"));
		if fs_err::tokio::try_exists(&web_path).await? {
			return Ok(Some(true));
		}
		let local_path = self.root.local_dir().join(format!("{vendor}.{name}.pdsc"));
		if fs_err::tokio::try_exists(&local_path).await? {
			return Ok(Some(false));
		}
		Ok(None)
	}

	#[allow(clippy::too_many_arguments)]
	async fn install_resolved(
		&self,
		reference: &PackReference,
		record: &PackRecord,
		version_stem: &str,
		install_dir: &std::path::Path,
		options: &AddOptions,
		ctx: &AddContext,
	) -> Result<()> {
		let (archive_bytes, downloaded_this_session) = self.obtain_archive(reference, record, version_stem, options, ctx).await?;

		let mut archive = ZipArchive::open(archive_bytes).await?;
		let doc = read_embedded_pdsc(&mut archive, &record.vendor, &record.name, &record.resolved_version).await?;

		self.gate_eula(&mut archive, &doc, record, version_stem, options, ctx).await?;

		let entry_names = archive.entry_names()?;
		let subfolder = detect_subfolder(&entry_names);

		fs_err::tokio::create_dir_all(install_dir)
			.await
			.map_err(|_| Error::FailedCreatingDirectory(install_dir.to_path_buf()))?;

		archive
			.extract_all(install_dir, subfolder.as_deref(), &ctx.cancellation, ctx.extract_reporter.clone())
			.await?;

		self.finalize_pdsc(&doc, record, version_stem).await?;
		self.finalize_archive(reference, record, version_stem, downloaded_this_session).await?;

		util::set_readonly_recursive(install_dir, true).await?;
		Ok(())
	}

	async fn obtain_archive(
		&self,
		reference: &PackReference,
		record: &PackRecord,
		version_stem: &str,
		options: &AddOptions,
		ctx: &AddContext,
	) -> Result<(Vec<u8>, bool)> {
		match &reference.origin {
			Origin::LocalFile(path) => Ok((fs_err::tokio::read(path).await?, false)),
			_ => {
				let file_name = format!("{}.{}.{version_stem}.pack", record.vendor, record.name);
				let path = self
					.fetch
					.fetch(
						&record.target_url,
						&self.root.download_dir(),
						&file_name,
						options.timeout,
						&ctx.cancellation,
						ctx.download_reporter.clone(),
					)
					.await?;
				Ok((fs_err::tokio::read(&path).await?, true))
			}
		}
	}

	/// Reads the license entry straight out of `archive` — the same archive
	/// `install_resolved` already has open for extraction — rather than
	/// re-reading a `.Download/` backup that, for `Origin::LocalFile`
	/// references, `finalize_archive` has not written yet at this point in
	/// the pipeline (it runs after this gate).
	async fn gate_eula(
		&self,
		archive: &mut ZipArchive,
		doc: &PdscDocument,
		record: &PackRecord,
		version_stem: &str,
		options: &AddOptions,
		ctx: &AddContext,
	) -> Result<()> {
		let Some(license_path) = doc.license.clone() else {
			if options.extract_eula {
				return Err(Error::LicenseNotFound(format!("{}::{}", record.vendor, record.name)));
			}
			return Ok(());
		};

		if options.extract_eula {
			let download_dir = self.root.download_dir();
			let backup_name = format!("{}.{}.{version_stem}.pack", record.vendor, record.name);
			let license_basename = std::path::Path::new(&license_path)
				.file_name()
				.and_then(|f| f.to_str())
				.unwrap_or(&license_path)
				.to_string();
			let dest = download_dir.join(format!("{backup_name}.LICENSE.{license_basename}"));

			let bytes = archive
				.read_entry(&license_path)
				.await?
				.ok_or_else(|| Error::LicenseNotFound(format!("{}::{}", record.vendor, record.name)))?;
			util::write_atomic(&dest, &bytes).await?;
			return Err(Error::Eula);
		}

		if options.check_eula {
			let bytes = archive
				.read_entry(&license_path)
				.await?
				.ok_or_else(|| Error::LicenseNotFound(format!("{}::{}", record.vendor, record.name)))?;
			let license_text = eula::render_license(&bytes);
			if !ctx.eula_prompt.confirm(&license_text) {
				return Err(Error::Eula);
			}
			return Ok(());
		}

		tracing::info!(vendor = %record.vendor, name = %record.name, "EULA accepted by default");
		Ok(())
	}

	async fn finalize_pdsc(&self, doc: &PdscDocument, record: &PackRecord, version_stem: &str) -> Result<()> {
		let xml = pdsc::to_xml(doc)?;

		let versioned = self
			.root
			.download_dir()
			.join(format!("{}.{}.{version_stem}.pdsc", record.vendor, record.name));
		util::write_atomic(&versioned, xml.as_bytes()).await?;

		let unversioned_name = format!("{}.{}.pdsc", record.vendor, record.name);
		let (target_dir, other_dir) = if record.is_public {
			(self.root.web_dir(), self.root.local_dir())
		} else {
			(self.root.local_dir(), self.root.web_dir())
		};
		let other_path = other_dir.join(&unversioned_name);
		if fs_err::tokio::try_exists(&other_path).await? {
			fs_err::tokio::remove_file(&other_path).await?;
		}
		util::write_atomic(&target_dir.join(&unversioned_name), xml.as_bytes()).await?;
		Ok(())
	}

	async fn finalize_archive(&self, reference: &PackReference, record: &PackRecord, version_stem: &str, downloaded_this_session: bool) -> Result<()> {
		let file_name = format!("{}.{}.{version_stem}.pack", record.vendor, record.name);
		let dest = self.root.download_dir().join(&file_name);
		if downloaded_this_session {
			return Ok(());
		}
		if let Origin::LocalFile(path) = &reference.origin {
			if path != &dest {
				fs_err::tokio::copy(path, &dest).await?;
			}
		}
		Ok(())
	}

	/// `Remove(reference, purge)` (spec.md §4.7.3).
	#[instrument(skip(self))]
	pub async fn remove(&self, reference: &str, purge: bool) -> Result<()> {
		let parsed: PackReference = reference.parse()?;
		with_unlocked(&self.root, || self.remove_inner(&parsed, purge)).await
	}

	async fn remove_inner(&self, reference: &PackReference, purge: bool) -> Result<()> {
		let mut touched = false;

		let installed_versions = self.installed_versions(&reference.vendor, &reference.name).await?;
		let targets: Vec<Version> = match &reference.version {
			Some(v) => installed_versions.into_iter().filter(|iv| iv == v).collect(),
			None => installed_versions,
		};

		if !targets.is_empty() {
			for version in &targets {
				let version_stem = version_without_build_metadata(version);
				let install_dir = self.root.install_dir(&reference.vendor, &reference.name, &version_stem);
				fs_err::tokio::remove_dir_all(&install_dir).await?;
				self.root.prune_empty(&install_dir).await?;
				touched = true;
			}

			if self.installed_versions(&reference.vendor, &reference.name).await?.is_empty() {
				let is_public = self.pdsc_is_public(&reference.vendor, &reference.name).await?;
				if is_public == Some(false) {
					let path = self.root.local_dir().join(format!("{}.{}.pdsc", reference.vendor, reference.name));
					let _ = fs_err::tokio::remove_file(&path).await;
				}
			}
		} else if !purge {
			return Err(Error::PackNotInstalled(format!("{}::{}", reference.vendor, reference.name)));
		}

		if purge {
			let purged = self.purge_download_cache(&reference.vendor, &reference.name, reference.version.as_ref()).await?;
			if purged == 0 && targets.is_empty() {
				return Err(Error::PackNotPurgeable(format!("{}::{}", reference.vendor, reference.name)));
			}
			touched = touched || purged > 0;
		}

		if touched {
			self.root.touch_pack_idx().await?;
		}
		Ok(())
	}

	async fn purge_download_cache(&self, vendor: &str, name: &str, version: Option<&Version>) -> Result<usize> {
		let pattern = match version {
			Some(v) => format!(r"^{}\.{}\.{}\.(pack|zip|pdsc)$", regex::escape(vendor), regex::escape(name), regex::escape(&v.to_string())),
			None => format!(r"^{}\.{}\..*\.(pack|zip|pdsc)$", regex::escape(vendor), regex::escape(name)),
		};
		let re = regex::Regex::new(&pattern).expect("purge pattern is a valid regex");

		let mut removed = 0usize;
		let download_dir = self.root.download_dir();
		let mut entries = fs_err::tokio::read_dir(&download_dir).await?;
		while let Some(entry) = entries.next_entry().await? {
			let file_name = entry.file_name();
			let Some(file_name) = file_name.to_str() else { continue };
			if re.is_match(file_name) {
				fs_err::tokio::remove_file(entry.path()).await?;
				removed += 1;
			}
		}
		Ok(removed)
	}

	async fn installed_versions(&self, vendor: &str, name: &str) -> Result<Vec<Version>> {
		let dir = self.root.path().join(vendor).join(name);
		if !fs_err::tokio::try_exists(&dir).await? {
			return Ok(Vec::new());
		}
		let mut versions = Vec::new();
		let mut entries = fs_err::tokio::read_dir(&dir).await?;
		while let Some(entry) = entries.next_entry().await? {
			if !entry.file_type().await?.is_dir() {
				continue;
			}
			let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
			if name.ends_with("_tmp") {
				continue;
			}
			if let Ok(version) = Version::parse(&name) {
				versions.push(version);
			}
		}
		versions.sort();
		versions.reverse();
		Ok(versions)
	}

	/// `Update(reference|"")` (spec.md §4.7.5).
	#[instrument(skip(self, options, ctx))]
	pub async fn update(&self, reference: Option<&str>, options: &AddOptions, ctx: &AddContext) -> Result<()> {
		match reference {
			Some(reference) => self.update_one(reference, options, ctx).await,
			None => {
				for identifier in self.newest_installed_identifiers().await? {
					self.update_one(&identifier, options, ctx).await?;
				}
				Ok(())
			}
		}
	}

	async fn update_one(&self, reference: &str, options: &AddOptions, ctx: &AddContext) -> Result<()> {
		let parsed: PackReference = reference.parse()?;
		let is_public = self.pdsc_is_public(&parsed.vendor, &parsed.name).await?;
		let installed = !self.installed_versions(&parsed.vendor, &parsed.name).await?.is_empty();

		if is_public != Some(true) || !installed {
			return Ok(());
		}

		self.add(reference, options, ctx).await
	}

	async fn newest_installed_identifiers(&self) -> Result<Vec<String>> {
		let mut out = Vec::new();
		let root = self.root.path().to_path_buf();
		let mut vendors = match fs_err::tokio::read_dir(&root).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
			Err(e) => return Err(Error::Io(e)),
		};
		while let Some(vendor_entry) = vendors.next_entry().await? {
			if !vendor_entry.file_type().await?.is_dir() {
				continue;
			}
			let vendor_name = vendor_entry.file_name().to_string_lossy().into_owned();
			if matches!(vendor_name.as_str(), ".Web" | ".Local" | ".Download") {
				continue;
			}
			let mut names = fs_err::tokio::read_dir(vendor_entry.path()).await?;
			while let Some(name_entry) = names.next_entry().await? {
				if !name_entry.file_type().await?.is_dir() {
					continue;
				}
				let name = name_entry.file_name().to_string_lossy().into_owned();
				if let Some(newest) = self.installed_versions(&vendor_name, &name).await?.first() {
					out.push(format!("{vendor_name}::{name}@{newest}"));
				}
			}
		}
		Ok(out)
	}

	/// `List` (spec.md §4.7.6). `updates_only`/`requirements_only` narrow
	/// the `installed` view to packs with a newer public release, or with a
	/// declared dependency that is not currently installed.
	pub async fn list(&self, mode: ListMode, updates_only: bool, requirements_only: bool, filter: Option<&str>) -> Result<Vec<ListEntry>> {
		let mut entries = match mode {
			ListMode::Public => self.list_public().await?,
			ListMode::Cached => self.list_cached().await?,
			ListMode::Installed => self.list_installed().await?,
		};

		if mode == ListMode::Installed && updates_only {
			entries.retain(|e| e.update_available);
		}
		if mode == ListMode::Installed && requirements_only {
			entries.retain(|e| e.requirements_unmet);
		}

		entries.sort_by_key(|e| e.identifier.to_lowercase());

		if let Some(filter) = filter {
			entries.retain(|e| e.identifier.contains(filter));
		}

		Ok(entries)
	}

	async fn list_public(&self) -> Result<Vec<ListEntry>> {
		let index = self.root.read_public_index().await?;
		let mut entries = Vec::new();
		for tag in index.list_pdsc_tags() {
			let installed = !self.installed_versions(&tag.vendor, &tag.name).await?.is_empty();
			let cached = self.has_cached_archive(&tag.vendor, &tag.name).await?;
			let suffix = if installed {
				" (installed)"
			} else if cached {
				" (cached)"
			} else {
				""
			};
			entries.push(ListEntry {
				identifier: format!("{}::{}{suffix}", tag.vendor, tag.name),
				vendor: tag.vendor.clone(),
				name: tag.name.clone(),
				installed,
				cached,
				update_available: false,
				requirements_unmet: false,
			});
		}
		Ok(entries)
	}

	async fn list_cached(&self) -> Result<Vec<ListEntry>> {
		let mut entries = Vec::new();
		let download_dir = self.root.download_dir();
		if !fs_err::tokio::try_exists(&download_dir).await? {
			return Ok(entries);
		}
		let mut read = fs_err::tokio::read_dir(&download_dir).await?;
		while let Some(entry) = read.next_entry().await? {
			let name = entry.file_name().to_string_lossy().into_owned();
			if let Some(stem) = name.strip_suffix(".pack") {
				if let Ok(reference) = stem.parse::<PackReference>().or_else(|_| format!("{stem}.pack").parse::<PackReference>()) {
					entries.push(ListEntry {
						identifier: reference.canonical(),
						vendor: reference.vendor.clone(),
						name: reference.name.clone(),
						installed: false,
						cached: true,
						update_available: false,
						requirements_unmet: false,
					});
				}
			}
		}
		Ok(entries)
	}

	async fn list_installed(&self) -> Result<Vec<ListEntry>> {
		let mut entries = Vec::new();
		let pattern = self.root.path().join("*").join("*").join("*").join("*.pdsc");
		let pattern = pattern.to_string_lossy().into_owned();
		for path in (glob::glob(&pattern).map_err(|_| Error::PackPdscCannotBeFound(pattern.clone()))?).flatten() {
			let Some(version_dir) = path.parent() else { continue };
			let Some(version) = version_dir.file_name().and_then(|f| f.to_str()) else { continue };
			let Some(name_dir) = version_dir.parent() else { continue };
			let Some(name) = name_dir.file_name().and_then(|f| f.to_str()) else { continue };
			let Some(vendor_dir) = name_dir.parent() else { continue };
			let Some(vendor) = vendor_dir.file_name().and_then(|f| f.to_str()) else { continue };

			if !crate::names::is_valid_identifier_part(vendor) || !crate::names::is_valid_identifier_part(name) {
				entries.push(ListEntry {
					identifier: format!("{vendor}::{name}@{version} (malformed)"),
					vendor: vendor.to_string(),
					name: name.to_string(),
					installed: true,
					cached: false,
					update_available: false,
					requirements_unmet: false,
				});
				continue;
			}

			let update_available = self.has_newer_public_release(vendor, name, version).await?;
			let requirements_unmet = self.has_unmet_requirements(&path).await?;

			entries.push(ListEntry {
				identifier: format!("{vendor}::{name}@{version}"),
				vendor: vendor.to_string(),
				name: name.to_string(),
				installed: true,
				cached: self.has_cached_archive(vendor, name).await?,
				update_available,
				requirements_unmet,
			});
		}
		Ok(entries)
	}

	async fn has_newer_public_release(&self, vendor: &str, name: &str, installed_version: &str) -> Result<bool> {
		let web_path = self.root.web_dir().join(format!("{vendor}.{name}.pdsc"));
		let Ok(xml) = fs_err::tokio::read_to_string(&web_path).await else {
			return Ok(false);
		};
		let Ok(doc) = PdscDocument::parse(&xml) else {
			return Ok(false);
		};
		let Some(latest) = pdsc::latest_version_str(&doc) else {
			return Ok(false);
		};
		let Ok(installed) = Version::parse(installed_version) else {
			return Ok(false);
		};
		let Ok(latest) = Version::parse(latest) else {
			return Ok(false);
		};
		Ok(latest > installed)
	}

	async fn has_unmet_requirements(&self, embedded_pdsc_path: &std::path::Path) -> Result<bool> {
		let Ok(xml) = fs_err::tokio::read_to_string(embedded_pdsc_path).await else {
			return Ok(false);
		};
		let Ok(doc) = PdscDocument::parse(&xml) else {
			return Ok(false);
		};
		for dep in pdsc::dependencies(&doc) {
			if self.installed_versions(&dep.vendor, &dep.name).await?.is_empty() {
				return Ok(true);
			}
		}
		Ok(false)
	}

	async fn has_cached_archive(&self, vendor: &str, name: &str) -> Result<bool> {
		let pattern = self
			.root
			.download_dir()
			.join(format!("{vendor}.{name}.*.pack"))
			.to_string_lossy()
			.into_owned();
		Ok(glob::glob(&pattern).map(|mut g| g.next().is_some()).unwrap_or(false))
	}

	/// `pdsc add <path>` (spec.md §6): registers a standalone PDSC file in
	/// the local index without installing the pack it describes. Fails
	/// `PdscEntryExists` if the pack is already registered publicly or
	/// locally, preserving the mutual-exclusion invariant in spec.md §3.
	#[instrument(skip(self))]
	pub async fn pdsc_add(&self, path: &std::path::Path) -> Result<()> {
		with_unlocked(&self.root, || self.pdsc_add_inner(path)).await
	}

	async fn pdsc_add_inner(&self, path: &std::path::Path) -> Result<()> {
		let xml = fs_err::tokio::read_to_string(path)
			.await
			.map_err(|_| Error::FileNotFound(path.to_path_buf()))?;
		let doc = PdscDocument::parse(&xml)?;

		if self.pdsc_is_public(&doc.vendor, &doc.name).await?.is_some() {
			return Err(Error::PdscEntryExists(format!("{}::{}", doc.vendor, doc.name)));
		}

		let local_index_path = self.root.local_index_path();
		let mut index = self.root.read_local_index().await?;
		let url = format!("file://{}", path.canonicalize().unwrap_or_else(|_| path.to_path_buf()).display());
		index.add_pdsc(PdscTag {
			vendor: doc.vendor.clone(),
			name: doc.name.clone(),
			url,
			version: pdsc::latest_version_str(&doc).map(str::to_string),
		})?;
		index.write_atomic(&local_index_path).await?;

		let dest = self.root.local_dir().join(format!("{}.{}.pdsc", doc.vendor, doc.name));
		util::write_atomic(&dest, xml.as_bytes()).await?;

		self.root.touch_pack_idx().await?;
		Ok(())
	}

	/// `pdsc rm <path>` (spec.md §6): the inverse of [`Self::pdsc_add`].
	/// Accepts either a filesystem path (vendor/name derived from its
	/// filename) or a `Vendor.Name`/`Vendor::Name` identifier.
	#[instrument(skip(self))]
	pub async fn pdsc_remove(&self, reference: &str) -> Result<()> {
		with_unlocked(&self.root, || self.pdsc_remove_inner(reference)).await
	}

	async fn pdsc_remove_inner(&self, reference: &str) -> Result<()> {
		let (vendor, name) = pdsc_identifier(reference)?;

		let local_index_path = self.root.local_index_path();
		let mut index = self.root.read_local_index().await?;
		index.remove_pdsc(&vendor, &name)?;
		index.write_atomic(&local_index_path).await?;

		let path = self.root.local_dir().join(format!("{vendor}.{name}.pdsc"));
		let _ = fs_err::tokio::remove_file(&path).await;

		self.root.touch_pack_idx().await?;
		Ok(())
	}
}

/// Extracts `(vendor, name)` from either a `.pdsc` path or a bare
/// `Vendor.Name`/`Vendor::Name` identifier, for `pdsc rm`.
fn pdsc_identifier(reference: &str) -> Result<(String, String)> {
	let stem = reference
		.strip_suffix(".pdsc")
		.map(|s| {
			std::path::Path::new(s)
				.file_name()
				.and_then(|f| f.to_str())
				.unwrap_or(s)
				.to_string()
		})
		.unwrap_or_else(|| reference.to_string());

	if let Some((vendor, name)) = stem.split_once("::") {
		return Ok((vendor.to_string(), name.to_string()));
	}
	stem.split_once('.')
		.map(|(v, n)| (v.to_string(), n.to_string()))
		.ok_or_else(|| Error::BadPackName(reference.to_string()))
}

/// Reads the embedded PDSC from `archive`, validating its filename, depth,
/// and asserted version against the PDSC's own `LatestVersion` (spec.md §3
/// invariant 5, §4.7.1 step 6).
async fn read_embedded_pdsc(archive: &mut ZipArchive, vendor: &str, name: &str, asserted_version: &Version) -> Result<PdscDocument> {
	let expected_name = format!("{vendor}.{name}.pdsc");
	let Some((path, bytes)) = archive.find_and_read(|n| n.rsplit('/').next() == Some(expected_name.as_str())).await? else {
		return Err(Error::PdscFileNotFound);
	};

	let depth = path.trim_end_matches(&format!("/{expected_name}")).matches('/').count();
	if path != expected_name && depth > 0 {
		return Err(Error::PdscFileTooDeepInPack);
	}

	let xml = String::from_utf8_lossy(&bytes);
	let doc = PdscDocument::parse(&xml)?;

	let latest = pdsc::latest_version(&doc)?;
	if latest.as_ref() != Some(asserted_version) {
		return Err(Error::PackVersionNotLatestReleasePdsc(
			asserted_version.to_string(),
			latest.map(|v| v.to_string()).unwrap_or_default(),
		));
	}

	Ok(doc)
}

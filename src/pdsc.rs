//! PDSC documents: the release-history manifest carried inside and
//! alongside every pack (spec.md §3, `PdscDocument`).
//!
//! Following the reframing in spec.md §9 ("a pure parser producing value
//! types, plus free functions over those values"), the `serde` structs here
//! only mirror the XML shape; all the interesting behavior (`LatestVersion`,
//! release lookup, dependency extraction) lives in free functions below.

use crate::error::{Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

/// The raw `<release>` element, as it appears in the XML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseXml {
	#[serde(rename = "@version")]
	pub version: String,
	#[serde(rename = "@url", skip_serializing_if = "Option::is_none", default)]
	pub url: Option<String>,
	#[serde(rename = "@date", skip_serializing_if = "Option::is_none", default)]
	pub date: Option<String>,
	#[serde(rename = "$text", skip_serializing_if = "Option::is_none", default)]
	pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReleasesXml {
	#[serde(rename = "release", default)]
	pub release: Vec<ReleaseXml>,
}

/// A single dependency, as declared under `<requirements><packages>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDependencyXml {
	#[serde(rename = "@vendor")]
	pub vendor: String,
	#[serde(rename = "@name")]
	pub name: String,
	#[serde(rename = "@version", skip_serializing_if = "Option::is_none", default)]
	pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackagesXml {
	#[serde(rename = "package", default)]
	pub package: Vec<PackageDependencyXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequirementsXml {
	#[serde(default)]
	pub packages: Option<PackagesXml>,
}

/// A parsed PDSC document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "package")]
pub struct PdscDocument {
	pub vendor: String,
	pub name: String,
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub license: Option<String>,
	pub releases: ReleasesXml,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub requirements: Option<RequirementsXml>,
}

impl PdscDocument {
	/// Parses a PDSC document from its XML text.
	pub fn parse(xml: &str) -> Result<Self> {
		quick_xml::de::from_str(xml).map_err(Error::from)
	}
}

/// Serializes a PDSC document back to XML text, for the snapshot copies
/// the installation engine writes into `.Download/`, `.Web/` and `.Local/`
/// (spec.md §4.7.1 step 9).
pub fn to_xml(doc: &PdscDocument) -> Result<String> {
	let mut buf = String::new();
	buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n");
	let mut writer = quick_xml::se::Serializer::new(&mut buf);
	writer.indent(' ', 2);
	doc.serialize(writer)?;
	Ok(buf)
}

/// A release with its version parsed to semver, in document order.
#[derive(Debug, Clone)]
pub struct Release {
	pub version: Version,
	pub url: Option<String>,
	pub date: Option<String>,
	pub description: Option<String>,
}

/// Returns every release in the document, in document order, with its
/// version parsed. Fails if any release has an unparsable version.
pub fn releases(doc: &PdscDocument) -> Result<Vec<Release>> {
	doc.releases
		.release
		.iter()
		.map(|r| {
			Version::parse(&r.version)
				.map(|version| Release {
					version,
					url: r.url.clone(),
					date: r.date.clone(),
					description: r.description.clone(),
				})
				.map_err(|_| Error::BadPackNameInvalidVersion(r.version.clone()))
		})
		.collect()
}

/// The document's `LatestVersion`: the first release in document order
/// (spec.md §3).
#[must_use]
pub fn latest_version_str(doc: &PdscDocument) -> Option<&str> {
	doc.releases.release.first().map(|r| r.version.as_str())
}

/// Parsed form of [`latest_version_str`].
pub fn latest_version(doc: &PdscDocument) -> Result<Option<Version>> {
	match latest_version_str(doc) {
		Some(v) => Version::parse(v)
			.map(Some)
			.map_err(|_| Error::BadPackNameInvalidVersion(v.to_string())),
		None => Ok(None),
	}
}

/// A dependency declared by a PDSC's `<requirements><packages>`.
#[derive(Debug, Clone)]
pub struct Dependency {
	pub vendor: String,
	pub name: String,
	pub version: Option<String>,
}

/// Every dependency a PDSC declares, in document order.
#[must_use]
pub fn dependencies(doc: &PdscDocument) -> Vec<Dependency> {
	doc.requirements
		.as_ref()
		.and_then(|r| r.packages.as_ref())
		.map(|p| {
			p.package
				.iter()
				.map(|d| Dependency {
					vendor: d.vendor.clone(),
					name: d.name.clone(),
					version: d.version.clone(),
				})
				.collect()
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"
		<package schemaVersion="1.7.0">
			<vendor>TheVendor</vendor>
			<name>PublicLocalPack</name>
			<url>https://example.com/packs/</url>
			<license>LICENSE.txt</license>
			<releases>
				<release version="1.2.3" date="2024-01-01">Second release</release>
				<release version="1.2.2" date="2023-06-01">First release</release>
			</releases>
			<requirements>
				<packages>
					<package vendor="OtherVendor" name="Dep" version="1.0.0"/>
				</packages>
			</requirements>
		</package>
	"#;

	#[test]
	fn parses_vendor_name_url_license() {
		let doc = PdscDocument::parse(SAMPLE).unwrap();
		assert_eq!(doc.vendor, "TheVendor");
		assert_eq!(doc.name, "PublicLocalPack");
		assert_eq!(doc.license.as_deref(), Some("LICENSE.txt"));
	}

	#[test]
	fn latest_version_is_first_in_document_order() {
		let doc = PdscDocument::parse(SAMPLE).unwrap();
		assert_eq!(latest_version_str(&doc), Some("1.2.3"));
	}

	#[test]
	fn parses_releases_and_dependencies() {
		let doc = PdscDocument::parse(SAMPLE).unwrap();
		let rels = releases(&doc).unwrap();
		assert_eq!(rels.len(), 2);
		assert_eq!(rels[0].version.to_string(), "1.2.3");

		let deps = dependencies(&doc);
		assert_eq!(deps.len(), 1);
		assert_eq!(deps[0].vendor, "OtherVendor");
	}
}

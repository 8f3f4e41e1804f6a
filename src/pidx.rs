//! The public/local pack index file (`.pidx`): the list of PDSC tags that
//! tell the synchronizer where to fetch each pack's PDSC from (spec.md §3,
//! §4.3 `PidxFile`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single `<pdsc>` tag inside a `.pidx` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdscTag {
	#[serde(rename = "@vendor")]
	pub vendor: String,
	#[serde(rename = "@name")]
	pub name: String,
	#[serde(rename = "@url")]
	pub url: String,
	#[serde(rename = "@version", skip_serializing_if = "Option::is_none", default)]
	pub version: Option<String>,
}

impl PdscTag {
	/// Two tags are considered duplicates when vendor, name and URL all
	/// match, with the URL compared case-insensitively for `file://`
	/// origins (Windows paths are case-insensitive).
	#[must_use]
	pub fn same_entry_as(&self, other: &PdscTag) -> bool {
		if self.vendor != other.vendor || self.name != other.name {
			return false;
		}
		if self.url.starts_with("file://") && other.url.starts_with("file://") {
			self.url.eq_ignore_ascii_case(&other.url)
		} else {
			self.url == other.url
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PdscIndexXml {
	#[serde(rename = "pdsc", default)]
	pdsc: Vec<PdscTag>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "index")]
struct IndexXml {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	timestamp: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	url: Option<String>,
	#[serde(default, rename = "pindex")]
	pindex: PdscIndexXml,
}

/// An in-memory `.pidx` file: an ordered list of PDSC tags plus the source
/// URL it was last refreshed from (spec.md §3 `PidxFile`), so a later
/// `UpdatePublicIndex` call with an empty source can reuse it
/// (spec.md §4.8: "empty (use the URL stored inside the current index)").
#[derive(Debug, Clone, Default)]
pub struct PidxFile {
	pub tags: Vec<PdscTag>,
	pub url: Option<String>,
}

impl PidxFile {
	/// An empty index, as created by `SetPackRoot` when no `.pidx` exists yet.
	#[must_use]
	pub fn empty() -> Self {
		Self { tags: Vec::new(), url: None }
	}

	/// Parses a `.pidx` document from its XML text.
	pub fn parse(xml: &str) -> Result<Self> {
		let doc: IndexXml = quick_xml::de::from_str(xml)?;
		Ok(Self {
			tags: doc.pindex.pdsc,
			url: doc.url,
		})
	}

	/// Serializes this index back to XML text, stamping the current time
	/// as `<timestamp>` the way the teacher stamps its lockfile writes.
	pub fn to_xml(&self) -> Result<String> {
		let doc = IndexXml {
			timestamp: Some(jiff::Timestamp::now().to_string()),
			url: self.url.clone(),
			pindex: PdscIndexXml {
				pdsc: self.tags.clone(),
			},
		};
		let mut buf = String::new();
		buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n");
		let mut writer = quick_xml::se::Serializer::new(&mut buf);
		writer.indent(' ', 2);
		doc.serialize(writer)?;
		Ok(buf)
	}

	/// Reads a `.pidx` file from disk, treating a missing file as an empty index.
	pub async fn read_or_default(path: &Path) -> Result<Self> {
		match fs_err::tokio::read_to_string(path).await {
			Ok(xml) => Self::parse(&xml),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::empty()),
			Err(e) => Err(Error::Io(e)),
		}
	}

	/// Writes this index to `path`, atomically via a same-directory temp file.
	pub async fn write_atomic(&self, path: &Path) -> Result<()> {
		crate::util::write_atomic(path, self.to_xml()?.as_bytes()).await
	}

	/// `AddPdsc`: inserts `tag`, refusing if an equal entry already exists.
	pub fn add_pdsc(&mut self, tag: PdscTag) -> Result<()> {
		if self.tags.iter().any(|t| t.same_entry_as(&tag)) {
			return Err(Error::PdscEntryExists(format!("{}::{}", tag.vendor, tag.name)));
		}
		self.tags.push(tag);
		Ok(())
	}

	/// `RemovePdsc`: removes the first tag matching vendor/name, erroring if none match.
	pub fn remove_pdsc(&mut self, vendor: &str, name: &str) -> Result<PdscTag> {
		let pos = self
			.tags
			.iter()
			.position(|t| t.vendor == vendor && t.name == name)
			.ok_or_else(|| Error::PdscEntryNotFound(format!("{vendor}::{name}")))?;
		Ok(self.tags.remove(pos))
	}

	/// `FindPdscTags`: every tag matching vendor/name, in index order.
	#[must_use]
	pub fn find_pdsc_tags(&self, vendor: &str, name: &str) -> Vec<&PdscTag> {
		self.tags
			.iter()
			.filter(|t| t.vendor == vendor && t.name == name)
			.collect()
	}

	/// `ListPdscTags`: all tags, in index order.
	#[must_use]
	pub fn list_pdsc_tags(&self) -> &[PdscTag] {
		&self.tags
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tag(vendor: &str, name: &str, url: &str) -> PdscTag {
		PdscTag {
			vendor: vendor.to_string(),
			name: name.to_string(),
			url: url.to_string(),
			version: None,
		}
	}

	#[test]
	fn add_then_find_round_trips() {
		let mut idx = PidxFile::empty();
		idx.add_pdsc(tag("ARM", "CMSIS", "https://example.com/")).unwrap();
		assert_eq!(idx.find_pdsc_tags("ARM", "CMSIS").len(), 1);
	}

	#[test]
	fn add_duplicate_entry_errors() {
		let mut idx = PidxFile::empty();
		idx.add_pdsc(tag("ARM", "CMSIS", "https://example.com/")).unwrap();
		let err = idx
			.add_pdsc(tag("ARM", "CMSIS", "https://example.com/"))
			.unwrap_err();
		assert!(matches!(err, Error::PdscEntryExists(_)));
	}

	#[test]
	fn windows_file_urls_dedup_case_insensitively() {
		let a = tag("ARM", "CMSIS", "file:///C:/Packs/ARM.CMSIS.pdsc");
		let b = tag("ARM", "CMSIS", "file:///c:/packs/ARM.CMSIS.pdsc");
		assert!(a.same_entry_as(&b));
	}

	#[test]
	fn remove_missing_entry_errors() {
		let mut idx = PidxFile::empty();
		let err = idx.remove_pdsc("ARM", "CMSIS").unwrap_err();
		assert!(matches!(err, Error::PdscEntryNotFound(_)));
	}

	#[test]
	fn xml_round_trips() {
		let mut idx = PidxFile::empty();
		idx.add_pdsc(tag("ARM", "CMSIS", "https://example.com/")).unwrap();
		let xml = idx.to_xml().unwrap();
		let reparsed = PidxFile::parse(&xml).unwrap();
		assert_eq!(reparsed.tags, idx.tags);
	}
}

//! Decodes a string into a [`PackReference`]: the vendor/name/version/origin
//! shape spec.md §4.1 describes, for any of the three surface forms
//! (archive path/URL, `.pdsc` path, or a symbolic identifier).

use crate::error::{Error, Result};
use crate::names::is_valid_identifier_part;
use semver::{Version, VersionReq};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// How a requested version should be resolved against a release history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionModifier {
	/// The exact version given must exist.
	Exact,
	/// No version was given; any release will do.
	Any,
	/// `@latest`: always the newest release.
	Latest,
	/// `>=X.Y.Z`: the oldest release that is at least this version.
	Greater,
	/// `@^X.Y.Z`: the newest release with the same major, at least this version.
	GreatestCompatible,
	/// `@~X.Y.Z`: the newest release with the same major.minor, at least this version.
	PatchVersion,
	/// A full semver range expression.
	Range,
}

impl fmt::Display for VersionModifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			VersionModifier::Exact => write!(f, "@"),
			VersionModifier::Any => write!(f, ""),
			VersionModifier::Latest => write!(f, "@latest"),
			VersionModifier::Greater => write!(f, ">="),
			VersionModifier::GreatestCompatible => write!(f, "@^"),
			VersionModifier::PatchVersion => write!(f, "@~"),
			VersionModifier::Range => write!(f, "@"),
		}
	}
}

/// Where a pack reference came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
	/// A `.pack`/`.zip`/`.pdsc` path on the local filesystem.
	LocalFile(PathBuf),
	/// A `.pack`/`.zip`/`.pdsc` URL.
	RemoteUrl(Url),
	/// A symbolic `Vendor.Name`/`Vendor::Name...` identifier.
	Identifier,
}

/// A parsed, not-yet-resolved reference to a pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PackReference {
	/// The pack's vendor.
	pub vendor: String,
	/// The pack's name.
	pub name: String,
	/// The requested version, if the reference pinned one.
	pub version: Option<Version>,
	/// The requested version range, populated only for [`VersionModifier::Range`].
	pub version_req: Option<VersionReq>,
	/// How `version`/`version_req` should be resolved against a release history.
	pub modifier: VersionModifier,
	/// Where this reference came from.
	pub origin: Origin,
}

impl PackReference {
	/// The canonical `Vendor::Name@Version` identifier string, independent of the
	/// surface form the reference was parsed from. Used for round-tripping and for
	/// the sorted listing identifier in spec.md §4.7.6.
	#[must_use]
	pub fn canonical(&self) -> String {
		let mut s = format!("{}::{}", self.vendor, self.name);
		match (&self.modifier, &self.version, &self.version_req) {
			(VersionModifier::Any, None, _) => {}
			(VersionModifier::Latest, _, _) => s.push_str("@latest"),
			(VersionModifier::Greater, Some(v), _) => s.push_str(&format!(">={v}")),
			(VersionModifier::GreatestCompatible, Some(v), _) => s.push_str(&format!("@^{v}")),
			(VersionModifier::PatchVersion, Some(v), _) => s.push_str(&format!("@~{v}")),
			(VersionModifier::Range, _, Some(req)) => s.push_str(&format!("@{req}")),
			(VersionModifier::Exact, Some(v), _) | (_, Some(v), _) => s.push_str(&format!("@{v}")),
			_ => {}
		}
		s
	}

	/// Builds the archive/PDSC filename this reference would have, stripping
	/// build metadata (but keeping any pre-release tag) per invariant 4 in
	/// spec.md §3.
	#[must_use]
	pub fn file_stem(&self) -> Option<String> {
		self.version.as_ref().map(|v| {
			format!(
				"{}.{}.{}",
				self.vendor,
				self.name,
				version_without_build_metadata(v)
			)
		})
	}
}

impl fmt::Display for PackReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.canonical())
	}
}

/// Renders a version without its build-metadata (`+...`) suffix, per
/// invariant 4 in spec.md §3: stripped from directory/filenames, but kept
/// inside the PDSC itself.
#[must_use]
pub fn version_without_build_metadata(v: &Version) -> String {
	format!("{}.{}.{}{}", v.major, v.minor, v.patch, {
		if v.pre.is_empty() {
			String::new()
		} else {
			format!("-{}", v.pre)
		}
	})
}

fn validate_vendor(vendor: &str) -> Result<()> {
	if is_valid_identifier_part(vendor) {
		Ok(())
	} else {
		Err(Error::BadPackNameInvalidVendor(vendor.to_string()))
	}
}

fn validate_name(name: &str) -> Result<()> {
	if is_valid_identifier_part(name) {
		Ok(())
	} else {
		Err(Error::BadPackNameInvalidName(name.to_string()))
	}
}

fn parse_version(s: &str) -> Result<Version> {
	Version::parse(s).map_err(|_| Error::BadPackNameInvalidVersion(s.to_string()))
}

/// Strips user-info, query, and fragment from a URL, per spec.md §4.1.
fn normalize_url(mut url: Url) -> Url {
	let _ = url.set_username("");
	let _ = url.set_password(None);
	url.set_query(None);
	url.set_fragment(None);
	url
}

fn is_remote(s: &str) -> bool {
	s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

fn parse_archive_filename(stem: &str, ext: &str) -> Result<(String, String, Version)> {
	// `<Vendor>.<Name>.<X.Y.Z[-pre][+meta]>.<ext>` — split into exactly 3 leading
	// dot-separated parts (vendor, name, version), where version may itself
	// contain dots.
	let mut parts = stem.splitn(3, '.');
	let vendor = parts
		.next()
		.filter(|s| !s.is_empty())
		.ok_or_else(|| Error::BadPackName(format!("{stem}.{ext}")))?;
	let name = parts
		.next()
		.filter(|s| !s.is_empty())
		.ok_or_else(|| Error::BadPackName(format!("{stem}.{ext}")))?;
	let version_str = parts
		.next()
		.filter(|s| !s.is_empty())
		.ok_or_else(|| Error::BadPackName(format!("{stem}.{ext}")))?;

	validate_vendor(vendor)?;
	validate_name(name)?;
	let version = parse_version(version_str)?;

	Ok((vendor.to_string(), name.to_string(), version))
}

fn parse_pdsc_filename(stem: &str) -> Result<(String, String)> {
	let mut parts = stem.splitn(2, '.');
	let vendor = parts
		.next()
		.filter(|s| !s.is_empty())
		.ok_or_else(|| Error::BadPackName(format!("{stem}.pdsc")))?;
	let name = parts
		.next()
		.filter(|s| !s.is_empty())
		.ok_or_else(|| Error::BadPackName(format!("{stem}.pdsc")))?;

	validate_vendor(vendor)?;
	validate_name(name)?;

	Ok((vendor.to_string(), name.to_string()))
}

/// Splits `Vendor::Name<suffix>` into its vendor, name and raw modifier suffix.
fn split_identifier_suffix(rest: &str) -> (&str, &str) {
	match rest.find(['@', '>']) {
		Some(idx) => (&rest[..idx], &rest[idx..]),
		None => (rest, ""),
	}
}

fn parse_double_colon_form(vendor: &str, rest: &str) -> Result<PackReference> {
	validate_vendor(vendor)?;
	let (name, suffix) = split_identifier_suffix(rest);
	validate_name(name)?;

	let (version, version_req, modifier) = match suffix {
		"" => (None, None, VersionModifier::Any),
		"@latest" => (None, None, VersionModifier::Latest),
		s if s.starts_with("@~") => (Some(parse_version(&s[2..])?), None, VersionModifier::PatchVersion),
		s if s.starts_with("@^") => {
			(Some(parse_version(&s[2..])?), None, VersionModifier::GreatestCompatible)
		}
		s if s.starts_with(">=") => (Some(parse_version(&s[2..])?), None, VersionModifier::Greater),
		s if s.starts_with('@') => {
			let raw = &s[1..];
			match Version::parse(raw) {
				Ok(v) => (Some(v), None, VersionModifier::Exact),
				Err(_) => {
					let req = VersionReq::parse(raw)
						.map_err(|_| Error::BadPackNameInvalidVersion(raw.to_string()))?;
					(None, Some(req), VersionModifier::Range)
				}
			}
		}
		other => return Err(Error::BadPackName(other.to_string())),
	};

	Ok(PackReference {
		vendor: vendor.to_string(),
		name: name.to_string(),
		version,
		version_req,
		modifier,
		origin: Origin::Identifier,
	})
}

fn parse_dotted_form(s: &str) -> Result<PackReference> {
	let mut parts = s.splitn(3, '.');
	let vendor = parts.next().unwrap_or_default();
	let name = parts
		.next()
		.ok_or_else(|| Error::BadPackName(s.to_string()))?;
	validate_vendor(vendor)?;
	validate_name(name)?;

	let version = match parts.next() {
		Some(v) if !v.is_empty() => Some(parse_version(v)?),
		_ => None,
	};

	let modifier = if version.is_some() {
		VersionModifier::Exact
	} else {
		VersionModifier::Any
	};

	Ok(PackReference {
		vendor: vendor.to_string(),
		name: name.to_string(),
		version,
		version_req: None,
		modifier,
		origin: Origin::Identifier,
	})
}

fn parse_identifier(s: &str) -> Result<PackReference> {
	if let Some((vendor, rest)) = s.split_once("::") {
		parse_double_colon_form(vendor, rest)
	} else if s.contains('.') {
		parse_dotted_form(s)
	} else {
		Err(Error::BadPackName(s.to_string()))
	}
}

impl FromStr for PackReference {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		if let Some(stem) = s.strip_suffix(".pdsc") {
			let file_name = Path::new(stem)
				.file_name()
				.and_then(|f| f.to_str())
				.unwrap_or(stem);
			let (vendor, name) = parse_pdsc_filename(file_name)?;
			let origin = if is_remote(s) {
				let url = Url::parse(s).map_err(|_| Error::BadPackURL(s.to_string()))?;
				Origin::RemoteUrl(normalize_url(url))
			} else {
				Origin::LocalFile(PathBuf::from(s))
			};
			return Ok(PackReference {
				vendor,
				name,
				version: None,
				version_req: None,
				modifier: VersionModifier::Any,
				origin,
			});
		}

		for ext in [".pack", ".zip"] {
			if let Some(stem) = s.strip_suffix(ext) {
				let file_name = Path::new(stem)
					.file_name()
					.and_then(|f| f.to_str())
					.unwrap_or(stem);
				let (vendor, name, version) = parse_archive_filename(file_name, &ext[1..])?;
				let origin = if is_remote(s) {
					let url = Url::parse(s).map_err(|_| Error::BadPackURL(s.to_string()))?;
					Origin::RemoteUrl(normalize_url(url))
				} else {
					Origin::LocalFile(PathBuf::from(s))
				};
				return Ok(PackReference {
					vendor,
					name,
					version: Some(version),
					version_req: None,
					modifier: VersionModifier::Exact,
					origin,
				});
			}
		}

		if is_remote(s) {
			return Err(Error::BadPackNameInvalidExtension(s.to_string()));
		}

		parse_identifier(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bare_dotted_identifier() {
		let r: PackReference = "ARM.CMSIS".parse().unwrap();
		assert_eq!(r.vendor, "ARM");
		assert_eq!(r.name, "CMSIS");
		assert_eq!(r.modifier, VersionModifier::Any);
		assert!(r.version.is_none());
	}

	#[test]
	fn parses_dotted_identifier_with_version() {
		let r: PackReference = "ARM.CMSIS.5.9.0".parse().unwrap();
		assert_eq!(r.modifier, VersionModifier::Exact);
		assert_eq!(r.version.unwrap().to_string(), "5.9.0");
	}

	#[test]
	fn parses_double_colon_latest() {
		let r: PackReference = "ARM::CMSIS@latest".parse().unwrap();
		assert_eq!(r.modifier, VersionModifier::Latest);
	}

	#[test]
	fn parses_double_colon_patch_compatible() {
		let r: PackReference = "ARM::CMSIS@~5.9.0".parse().unwrap();
		assert_eq!(r.modifier, VersionModifier::PatchVersion);
		assert_eq!(r.version.unwrap().to_string(), "5.9.0");
	}

	#[test]
	fn parses_double_colon_major_compatible() {
		let r: PackReference = "ARM::CMSIS@^5.9.0".parse().unwrap();
		assert_eq!(r.modifier, VersionModifier::GreatestCompatible);
	}

	#[test]
	fn parses_double_colon_minimum() {
		let r: PackReference = "ARM::CMSIS>=5.9.0".parse().unwrap();
		assert_eq!(r.modifier, VersionModifier::Greater);
	}

	#[test]
	fn parses_archive_filename() {
		let r: PackReference = "ARM.CMSIS.5.9.0.pack".parse().unwrap();
		assert_eq!(r.vendor, "ARM");
		assert_eq!(r.name, "CMSIS");
		assert_eq!(r.version.unwrap().to_string(), "5.9.0");
		assert!(matches!(r.origin, Origin::LocalFile(_)));
	}

	#[test]
	fn parses_remote_archive_url() {
		let r: PackReference = "https://example.com/ARM.CMSIS.5.9.0.pack?x=1#frag"
			.parse()
			.unwrap();
		match r.origin {
			Origin::RemoteUrl(url) => {
				assert_eq!(url.query(), None);
				assert_eq!(url.fragment(), None);
			}
			_ => panic!("expected remote origin"),
		}
	}

	#[test]
	fn rejects_bad_vendor() {
		let err = "Vendor With Spaces.Name".parse::<PackReference>().unwrap_err();
		assert!(matches!(err, Error::BadPackNameInvalidVendor(_)));
	}

	#[test]
	fn rejects_unrecognized_shape() {
		let err = "totally not a pack reference!!".parse::<PackReference>().unwrap_err();
		assert!(matches!(err, Error::BadPackName(_)));
	}

	#[test]
	fn round_trips_canonical_form() {
		let r: PackReference = "ARM::CMSIS@~5.9.0".parse().unwrap();
		let reparsed: PackReference = r.canonical().parse().unwrap();
		assert_eq!(r.vendor, reparsed.vendor);
		assert_eq!(r.name, reparsed.name);
		assert_eq!(r.modifier, reparsed.modifier);
		assert_eq!(r.version, reparsed.version);
	}
}

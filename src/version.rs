//! Resolves a [`VersionModifier`] against a PDSC's release history to a
//! concrete [`Version`] (spec.md §4.2).
//!
//! The release list is walked newest-to-oldest; ties are impossible since
//! semver orders uniquely, but document order is preserved by
//! [`crate::pdsc::releases`] for anything that needs it. Build metadata is
//! ignored for ordering and comparison (semver itself ignores it) but is
//! carried through on the value that gets returned.

use crate::error::{Error, Result};
use crate::pdsc::Release;
use crate::refs::{PackReference, VersionModifier};
use semver::Version;

/// Picks the release that satisfies `reference`'s modifier, returning the
/// full matching [`Release`] (so its URL/date survive into the caller).
///
/// `releases` need not be pre-sorted; this function sorts its own working
/// copy newest-first.
pub fn resolve<'a>(reference: &PackReference, releases: &'a [Release]) -> Result<&'a Release> {
	let id = format!("{}::{}", reference.vendor, reference.name);

	let mut sorted: Vec<&Release> = releases.iter().collect();
	sorted.sort_by(|a, b| b.version.cmp(&a.version));

	match &reference.modifier {
		VersionModifier::Any | VersionModifier::Latest => sorted
			.into_iter()
			.next()
			.ok_or_else(|| Error::PackVersionNotAvailable(id.clone(), "any".to_string())),

		VersionModifier::Exact => {
			let wanted = reference
				.version
				.as_ref()
				.expect("Exact modifier always carries a version");
			sorted
				.into_iter()
				.find(|r| versions_equal_ignoring_build(&r.version, wanted))
				.ok_or_else(|| Error::PackVersionNotFoundInPdsc(wanted.to_string(), id.clone()))
		}

		VersionModifier::Greater => {
			let floor = reference
				.version
				.as_ref()
				.expect("Greater modifier always carries a version");
			// oldest release that is still >= floor
			sorted
				.into_iter()
				.rev()
				.find(|r| &r.version >= floor)
				.ok_or_else(|| Error::PackVersionNotAvailable(id.clone(), format!(">={floor}")))
		}

		VersionModifier::GreatestCompatible => {
			let floor = reference
				.version
				.as_ref()
				.expect("GreatestCompatible modifier always carries a version");
			sorted
				.into_iter()
				.find(|r| r.version.major == floor.major && &r.version >= floor)
				.ok_or_else(|| Error::PackVersionNotAvailable(id.clone(), format!("@^{floor}")))
		}

		VersionModifier::PatchVersion => {
			let floor = reference
				.version
				.as_ref()
				.expect("PatchVersion modifier always carries a version");
			sorted
				.into_iter()
				.find(|r| {
					r.version.major == floor.major && r.version.minor == floor.minor && &r.version >= floor
				})
				.ok_or_else(|| Error::PackVersionNotAvailable(id.clone(), format!("@~{floor}")))
		}

		VersionModifier::Range => {
			let req = reference
				.version_req
				.as_ref()
				.expect("Range modifier always carries a version_req");
			sorted
				.into_iter()
				.find(|r| req.matches(&r.version))
				.ok_or_else(|| Error::PackVersionNotAvailable(id.clone(), req.to_string()))
		}
	}
}

/// semver's `==` already ignores build metadata, but this makes the intent
/// explicit at the call site for Exact matching.
fn versions_equal_ignoring_build(a: &Version, b: &Version) -> bool {
	a.major == b.major && a.minor == b.minor && a.patch == b.patch && a.pre == b.pre
}

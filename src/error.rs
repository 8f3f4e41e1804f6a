//! The error taxonomy shared by every operation in the engine.
//!
//! Unlike the teacher's per-operation error enums, the kinds here are a
//! flat, stable taxonomy (spec.md §7 calls each one out as "a distinct
//! value carrying a stable identity") — a CLI or another embedder matches
//! on [`Error`] directly to pick an exit code or decide whether a failure
//! is a sentinel rather than a user-visible error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by any cpackget engine operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A pack reference string did not match any recognized shape.
	#[error("`{0}` is not a recognizable pack reference")]
	BadPackName(String),

	/// The vendor part of a pack reference contained invalid characters.
	#[error("invalid vendor name `{0}`")]
	BadPackNameInvalidVendor(String),

	/// The name part of a pack reference contained invalid characters.
	#[error("invalid pack name `{0}`")]
	BadPackNameInvalidName(String),

	/// The version part of a pack reference was not a valid semver.
	#[error("invalid version `{0}`")]
	BadPackNameInvalidVersion(String),

	/// An archive filename's extension was not `.pack`, `.zip`, or `.pdsc`.
	#[error("invalid pack file extension in `{0}`")]
	BadPackNameInvalidExtension(String),

	/// A URL could not be parsed.
	#[error("invalid URL `{0}`")]
	BadPackURL(String),

	/// A file referenced by a command-line argument does not exist.
	#[error("file not found: {0}")]
	FileNotFound(PathBuf),

	/// A file does not exist and the pack root itself has never been initialized.
	#[error("file not found: {0} (run with a pack root configured)")]
	FileNotFoundUseInit(PathBuf),

	/// `SetPackRoot` was given an empty path.
	#[error("pack root path not specified")]
	PackRootNotFound,

	/// The pack root directory does not exist and `create` was false.
	#[error("pack root {0} does not exist")]
	PackRootDoesNotExist(PathBuf),

	/// The pack is already installed and `forceReinstall` was not requested.
	#[error("pack {0} is already installed")]
	PackAlreadyInstalled(String),

	/// The pack referenced by a remove/purge operation is not installed.
	#[error("pack {0} is not installed")]
	PackNotInstalled(String),

	/// `purge` found nothing in the download cache matching the reference.
	#[error("pack {0} has nothing to purge")]
	PackNotPurgeable(String),

	/// The requested exact version was not present in the PDSC release history.
	#[error("version {0} not found in PDSC for {1}")]
	PackVersionNotFoundInPdsc(String, String),

	/// The archive's asserted version did not match its embedded PDSC's `LatestVersion`.
	#[error("pack version {0} does not match the PDSC's latest release {1}")]
	PackVersionNotLatestReleasePdsc(String, String),

	/// No release in the PDSC satisfies the requested version modifier.
	#[error("no version of {0} satisfies {1}")]
	PackVersionNotAvailable(String, String),

	/// Neither `.Web/` nor `.Local/` has a PDSC for this pack, so no URL can be resolved.
	#[error("cannot find a URL for pack {0}")]
	PackURLCannotBeFound(String),

	/// Neither index has a PDSC entry for this pack at all.
	#[error("cannot find a PDSC for pack {0}")]
	PackPdscCannotBeFound(String),

	/// Adding a PDSC tag refused because an equal tag already exists.
	#[error("PDSC entry for {0} already exists")]
	PdscEntryExists(String),

	/// Removing/finding a PDSC tag matched nothing.
	#[error("no PDSC entry found for {0}")]
	PdscEntryNotFound(String),

	/// The archive does not contain the PDSC file it was expected to.
	#[error("PDSC file not found inside archive")]
	PdscFileNotFound,

	/// The embedded PDSC was nested deeper than one directory inside the archive.
	#[error("PDSC file is nested too deeply inside the pack")]
	PdscFileTooDeepInPack,

	/// The archive could not be inflated.
	#[error("failed decompressing file {0}")]
	FailedDecompressingFile(String),

	/// A directory required by the install could not be created.
	#[error("failed creating directory {0}")]
	FailedCreatingDirectory(PathBuf),

	/// An archive entry would have escaped its destination directory.
	#[error("insecure zip entry name `{0}`")]
	InsecureZipFileName(String),

	/// `extractEula`/`checkEula` needs a license that the PDSC did not declare, or that
	/// is missing from the archive.
	#[error("license not found for pack {0}")]
	LicenseNotFound(String),

	/// Sentinel: the user declined the EULA. Not a user-visible failure.
	#[error("EULA was not accepted")]
	Eula,

	/// A path supplied to the index synchronizer escapes the pack root.
	#[error("index path `{0}` is not safe")]
	IndexPathNotSafe(String),

	/// The public index source reference was malformed.
	#[error("invalid public index reference `{0}`")]
	InvalidPublicIndexReference(String),

	/// Refused to overwrite `.Web/index.pidx` (e.g. destination is not actually the public index).
	#[error("refusing to overwrite the public index at {0}")]
	CannotOverwritePublicIndex(PathBuf),

	/// Sentinel: the public index is older than its configured time-to-live.
	#[error("public index is older than its time-to-live")]
	IndexTooOld,

	/// The remote server responded with an HTTP status `>= 400`.
	#[error("server returned an error status for {0}")]
	BadRequest(String),

	/// The network was unreachable.
	#[error("network unreachable")]
	Offline(#[source] reqwest::Error),

	/// The operation was aborted via the cancellation token.
	#[error("operation terminated by user")]
	TerminatedByUser,

	/// A system error was already logged at the point of failure; re-raised to avoid
	/// double-logging further up the call stack.
	#[error("an unrecoverable error occurred (see log)")]
	AlreadyLogged,

	/// A filesystem operation failed.
	#[error("I/O error")]
	Io(#[from] std::io::Error),

	/// An XML document could not be parsed.
	#[error("XML parse error")]
	XmlDeserialize(#[from] quick_xml::DeError),

	/// An XML document could not be serialized.
	#[error("XML serialize error")]
	XmlSerialize(#[from] quick_xml::SeError),

	/// A zip archive could not be read.
	#[error("zip archive error")]
	Zip(#[from] async_zip::error::ZipError),
}

impl Error {
	/// Maps an error to the CLI exit code families spec.md §6 defines:
	/// `1` user error, `2` environment, `3` unrecoverable internal.
	#[must_use]
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::BadPackName(_)
			| Error::BadPackNameInvalidVendor(_)
			| Error::BadPackNameInvalidName(_)
			| Error::BadPackNameInvalidVersion(_)
			| Error::BadPackNameInvalidExtension(_)
			| Error::BadPackURL(_)
			| Error::FileNotFound(_)
			| Error::PackAlreadyInstalled(_)
			| Error::PackNotInstalled(_)
			| Error::PackNotPurgeable(_)
			| Error::PackVersionNotFoundInPdsc(_, _)
			| Error::PackVersionNotLatestReleasePdsc(_, _)
			| Error::PackVersionNotAvailable(_, _)
			| Error::PackURLCannotBeFound(_)
			| Error::PackPdscCannotBeFound(_)
			| Error::PdscEntryExists(_)
			| Error::PdscEntryNotFound(_)
			| Error::PdscFileNotFound
			| Error::PdscFileTooDeepInPack
			| Error::InsecureZipFileName(_)
			| Error::LicenseNotFound(_)
			| Error::InvalidPublicIndexReference(_) => 1,

			Error::FileNotFoundUseInit(_)
			| Error::PackRootNotFound
			| Error::PackRootDoesNotExist(_)
			| Error::Offline(_)
			| Error::BadRequest(_)
			| Error::IndexPathNotSafe(_)
			| Error::CannotOverwritePublicIndex(_) => 2,

			_ => 3,
		}
	}

	/// True for the sentinel values that are control signals, not user-visible failures.
	#[must_use]
	pub fn is_sentinel(&self) -> bool {
		matches!(self, Error::Eula | Error::IndexTooOld)
	}
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

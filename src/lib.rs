//! A package manager for CMSIS software packs.
//!
//! This crate implements the installation engine described in the design
//! docs alongside it: resolving a pack reference (a URL, a local archive,
//! or a symbolic `Vendor::Name` identifier) to a concrete archive,
//! materializing it inside a managed *pack root*, and keeping the PDSC/PIDX
//! indexes that describe what is installed, cached, and publicly available
//! coherent with the pack root's contents.

/// Archive Extractor: safely inflates a pack/zip archive.
pub mod archive;
/// Installation Engine: add, remove, update, and list packs.
pub mod engine;
/// The crate-wide error taxonomy.
pub mod error;
/// Download/Fetch Service: retrieves a URL into the `.Download/` cache.
pub mod fetch;
/// Pack-Root Layout Manager: directory structure, locking, pruning.
pub mod layout;
/// Vendor/name character-class validation shared by every reference form.
pub mod names;
/// PDSC documents: release histories, licenses, dependencies.
pub mod pdsc;
/// PIDX files: the public and local pack indexes.
pub mod pidx;
/// Pack Reference Parser.
pub mod refs;
/// Progress reporting and EULA-prompt capabilities.
pub mod reporters;
/// Public-Index Synchronizer: sparse/full refresh with bounded concurrency.
pub mod sync;
pub(crate) mod util;
/// Version Resolver: picks a concrete release from a version modifier.
pub mod version;

pub use engine::{AddContext, AddOptions, Engine, ListEntry, ListMode};
pub use error::{Error, Result};
pub use layout::PackRoot;
pub use refs::PackReference;

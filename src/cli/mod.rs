//! CLI wiring: pack-root resolution and the `Subcommand` dispatch tree
//! (spec.md §6 External Interfaces).

use anyhow::Context as _;
use std::path::PathBuf;

pub mod commands;
pub mod reporters;

/// Environment variable that overrides the default pack root (spec.md §6).
pub const DEFAULT_MODE_PATH_ENV: &str = "CPACKGET_DEFAULT_MODE_PATH";

/// Resolves the default pack root per spec.md §6's precedence:
/// `CPACKGET_DEFAULT_MODE_PATH`, then the platform cache directory
/// (`%LOCALAPPDATA%\Arm\Packs` on Windows, `$XDG_CACHE_HOME/arm/packs` on
/// Unix).
pub fn default_pack_root() -> anyhow::Result<PathBuf> {
	if let Ok(path) = std::env::var(DEFAULT_MODE_PATH_ENV) {
		if !path.is_empty() {
			return Ok(PathBuf::from(path));
		}
	}

	let cache_dir = dirs::cache_dir().context("failed to determine the platform cache directory")?;
	if cfg!(target_os = "windows") {
		Ok(cache_dir.join("Arm").join("Packs"))
	} else {
		Ok(cache_dir.join("arm").join("packs"))
	}
}

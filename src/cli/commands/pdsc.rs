//! `pdsc add|rm` (spec.md §6): registers or unregisters a standalone PDSC.

use anyhow::Context as _;
use cpackget::Engine;
use std::path::PathBuf;

#[derive(Debug, clap::Subcommand)]
pub enum PdscCommands {
	/// Registers a standalone PDSC file in the local index
	Add(AddCommand),
	/// Unregisters a standalone PDSC file from the local index
	Rm(RemoveCommand),
}

impl PdscCommands {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		match self {
			PdscCommands::Add(cmd) => cmd.run(engine).await,
			PdscCommands::Rm(cmd) => cmd.run(engine).await,
		}
	}
}

#[derive(Debug, clap::Args)]
pub struct AddCommand {
	/// Path to the `.pdsc` file to register
	path: PathBuf,
}

impl AddCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		engine
			.pdsc_add(&self.path)
			.await
			.with_context(|| format!("failed to add PDSC {}", self.path.display()))
	}
}

#[derive(Debug, clap::Args)]
pub struct RemoveCommand {
	/// Path to the `.pdsc` file, or a `Vendor.Name`/`Vendor::Name` identifier
	reference: String,
}

impl RemoveCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		engine
			.pdsc_remove(&self.reference)
			.await
			.with_context(|| format!("failed to remove PDSC {}", self.reference))
	}
}

//! `list` (spec.md §6): enumerates installed, cached, or public packs.

use cpackget::{Engine, ListMode};

#[derive(Debug, clap::Args)]
pub struct ListCommand {
	/// List cached archives instead of installed packs
	#[arg(long)]
	cached: bool,

	/// List packs available in the public index instead of installed packs
	#[arg(long)]
	public: bool,

	/// Only show packs with an available update
	#[arg(long)]
	updates: bool,

	/// Only show packs with unmet dependency requirements
	#[arg(long)]
	requirements: bool,

	/// Only show entries whose identifier contains this substring
	#[arg(long)]
	filter: Option<String>,
}

impl ListCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		let mode = match (self.cached, self.public) {
			(true, false) => ListMode::Cached,
			(false, true) => ListMode::Public,
			(false, false) => ListMode::Installed,
			(true, true) => anyhow::bail!("--cached and --public are mutually exclusive"),
		};

		let entries = engine.list(mode, self.updates, self.requirements, self.filter.as_deref()).await?;

		for entry in &entries {
			println!("{}", entry.identifier);
		}
		Ok(())
	}
}

//! The `Subcommand` dispatch tree (spec.md §6): `pack`, `pdsc`, `index`, `list`.

mod index;
mod list;
mod pack;
mod pdsc;

use cpackget::Engine;

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
	/// Add, remove, or update installed packs
	#[command(subcommand)]
	Pack(pack::PackCommands),

	/// Register or unregister a standalone PDSC file
	#[command(subcommand)]
	Pdsc(pdsc::PdscCommands),

	/// Refresh the mirrored public index
	Index(index::IndexCommand),

	/// Enumerate installed, cached, or public packs
	List(list::ListCommand),
}

impl Subcommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		match self {
			Subcommand::Pack(cmd) => cmd.run(engine).await,
			Subcommand::Pdsc(cmd) => cmd.run(engine).await,
			Subcommand::Index(cmd) => cmd.run(engine).await,
			Subcommand::List(cmd) => cmd.run(engine).await,
		}
	}
}

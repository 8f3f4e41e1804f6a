//! `pack add|rm|update` (spec.md §6).

use anyhow::Context as _;
use cpackget::{AddContext, AddOptions, Engine};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::reporters::{CliDownloadReporter, CliEulaPrompt, CliExtractReporter};

#[derive(Debug, clap::Subcommand)]
pub enum PackCommands {
	/// Installs one or more packs
	Add(AddCommand),
	/// Removes one or more installed packs
	Rm(RemoveCommand),
	/// Updates installed packs to their latest available version
	Update(UpdateCommand),
}

impl PackCommands {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		match self {
			PackCommands::Add(cmd) => cmd.run(engine).await,
			PackCommands::Rm(cmd) => cmd.run(engine).await,
			PackCommands::Update(cmd) => cmd.run(engine).await,
		}
	}
}

#[derive(Debug, clap::Args)]
pub struct AddCommand {
	/// Pack reference(s): a path, URL, or `Vendor::Name[@version]` identifier
	#[arg(required = true)]
	references: Vec<String>,

	/// Accept the pack's embedded license non-interactively
	#[arg(short = 'a', long = "agree-embedded-license")]
	agree_embedded_license: bool,

	/// Extract the pack's embedded license instead of installing
	#[arg(short = 'x', long = "extract-embedded-license")]
	extract_embedded_license: bool,

	/// Reinstall even if the pack is already installed
	#[arg(short = 'F', long = "force-reinstall")]
	force_reinstall: bool,

	/// Skip installing the pack's declared dependencies
	#[arg(short = 'R', long = "no-requirements")]
	no_requirements: bool,

	/// Network timeout in seconds (0 = client default)
	#[arg(long, default_value_t = 0)]
	timeout: u64,
}

impl AddCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		let options = AddOptions {
			check_eula: !self.agree_embedded_license && !self.extract_embedded_license,
			extract_eula: self.extract_embedded_license,
			force_reinstall: self.force_reinstall,
			no_requirements: self.no_requirements,
			timeout: Duration::from_secs(self.timeout),
		};

		let ctx = AddContext {
			download_reporter: Arc::new(CliDownloadReporter::new()),
			extract_reporter: Arc::new(CliExtractReporter),
			eula_prompt: Arc::new(CliEulaPrompt),
			..Default::default()
		};

		for reference in &self.references {
			engine
				.add(reference, &options, &ctx)
				.await
				.with_context(|| format!("failed to add {reference}"))?;
		}
		Ok(())
	}
}

#[derive(Debug, clap::Args)]
pub struct RemoveCommand {
	/// Pack reference(s) to remove
	#[arg(required = true)]
	references: Vec<String>,

	/// Also delete the pack's cached archive and PDSC from `.Download/`
	#[arg(long)]
	purge: bool,
}

impl RemoveCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		for reference in &self.references {
			engine
				.remove(reference, self.purge)
				.await
				.with_context(|| format!("failed to remove {reference}"))?;
		}
		Ok(())
	}
}

#[derive(Debug, clap::Args)]
pub struct UpdateCommand {
	/// Pack reference(s) to update; omit to update every installed pack
	references: Vec<String>,

	/// Accept the pack's embedded license non-interactively
	#[arg(long = "agree-embedded-license")]
	agree_embedded_license: bool,

	/// Skip installing the pack's declared dependencies
	#[arg(long = "no-requirements")]
	no_requirements: bool,

	/// Network timeout in seconds (0 = client default)
	#[arg(long, default_value_t = 0)]
	timeout: u64,
}

impl UpdateCommand {
	pub async fn run(self, engine: &Engine) -> anyhow::Result<()> {
		let options = AddOptions {
			check_eula: !self.agree_embedded_license,
			extract_eula: false,
			force_reinstall: false,
			no_requirements: self.no_requirements,
			timeout: Duration::from_secs(self.timeout),
		};

		let ctx = AddContext {
			download_reporter: Arc::new(CliDownloadReporter::new()),
			extract_reporter: Arc::new(CliExtractReporter),
			eula_prompt: Arc::new(CliEulaPrompt),
			..Default::default()
		};

		if self.references.is_empty() {
			engine.update(None, &options, &ctx).await?;
		} else {
			for reference in &self.references {
				engine.update(Some(reference.as_str()), &options, &ctx).await?;
			}
		}
		Ok(())
	}
}

use anyhow::Context as _;
use clap::Parser;
use colored::Colorize;
use cpackget::{Engine, PackRoot};

mod cli;

#[derive(Parser, Debug)]
#[clap(version, about = "A package manager for CMSIS software packs")]
struct Cli {
	/// The pack root to operate against; overrides `CPACKGET_DEFAULT_MODE_PATH`
	/// and the platform cache directory (spec.md §6)
	#[arg(long, global = true)]
	pack_root: Option<std::path::PathBuf>,

	/// Create the pack root if it doesn't already exist
	#[arg(long, global = true)]
	create: bool,

	/// Refresh the public index on startup if it is missing or stale
	/// (spec.md §4.4); best-effort, against the URL stored in the index
	#[arg(long, global = true)]
	refresh_index: bool,

	/// Increase log verbosity (`-v` debug, `-vv` trace)
	#[arg(short = 'v', long, global = true, action = clap::builder::ArgAction::Count)]
	verbose: u8,

	/// Suppress all logging below `warn`
	#[arg(short = 'q', long, global = true)]
	quiet: bool,

	#[command(subcommand)]
	subcommand: cli::commands::Subcommand,
}

fn init_logging(verbose: u8, quiet: bool) {
	use tracing_subscriber::EnvFilter;

	let default_level = if quiet {
		"warn"
	} else {
		match verbose {
			0 => "info",
			1 => "debug",
			_ => "trace",
		}
	};

	let filter = std::env::var("CPACKGET_LOG")
		.ok()
		.and_then(|s| EnvFilter::try_new(s).ok())
		.unwrap_or_else(|| EnvFilter::new(default_level));

	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run() -> anyhow::Result<()> {
	let cli = Cli::parse();

	init_logging(cli.verbose, cli.quiet);

	let root_path = match &cli.pack_root {
		Some(path) => path.clone(),
		None => cli::default_pack_root()?,
	};

	let root = PackRoot::set_pack_root(&root_path, cli.create, cli.refresh_index)
		.await
		.with_context(|| format!("failed to set the pack root at {}", root_path.display()))?;
	let engine = Engine::new(root).context("failed to initialize the engine")?;

	cli.subcommand.run(&engine).await
}

fn display_err(err: &anyhow::Error) {
	eprintln!("{}: {err}", "error".red().bold());

	let cause = err.chain().skip(1).collect::<Vec<_>>();
	if !cause.is_empty() {
		eprintln!("{}:", "caused by".red().bold());
		for err in cause {
			eprintln!("  - {err}");
		}
	}
}

fn exit_code(err: &anyhow::Error) -> i32 {
	match err.downcast_ref::<cpackget::Error>() {
		Some(err) => err.exit_code(),
		None => 1,
	}
}

fn main() {
	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(err) => {
			eprintln!("{}: failed to start the async runtime: {err}", "error".red().bold());
			std::process::exit(3);
		}
	};

	match runtime.block_on(run()) {
		Ok(()) => {}
		Err(err) => {
			display_err(&err);
			std::process::exit(exit_code(&err));
		}
	}
}

mod cache;
mod commands;
mod config;
mod error;
mod event;
mod logging;
mod net;
mod worker;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Offline asset cache controller for the bookkeeping app shell")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shellcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Worker script URL carrying the app version, e.g. https://host/sw.js?v=2.0.1
  #[arg(long)]
  script_url: Option<String>,

  /// Cache database file
  #[arg(long)]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration, command line wins
  let config = config::Config::load(args.config.as_deref())?.with_overrides(args.script_url, args.db);

  let _log_guard = logging::init(config.log_file.as_deref())?;

  commands::run(args.command, &config).await
}

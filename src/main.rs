mod app;
mod input;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use pocket_critters::config::{project_paths, Paths};
use std::fs::OpenOptions;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "pocket-critters")]
#[command(about = "Adopt a terminal pet and keep it fed")]
pub(crate) struct Cli {
    /// Directory holding save.json, settings.json and the log file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override how often stats decay (milliseconds)
    #[arg(long)]
    decay_interval_ms: Option<u64>,

    /// Force monochrome (no colors)
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Keep the pet in memory only; nothing is written to disk
    #[arg(long, default_value_t = false)]
    ephemeral: bool,

    /// Forget the saved pet and start at species selection
    #[arg(long, default_value_t = false)]
    fresh: bool,
}

fn init_logging(paths: &Paths) -> Result<()> {
    // the terminal is in raw mode, so logs go to a file instead of stderr
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
        .with_context(|| format!("could not open log file {}", paths.log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = project_paths(cli.data_dir.as_deref())?;
    init_logging(&paths)?;
    log::info!("starting, save file at {}", paths.save_path.display());
    app::run(cli, paths)
}

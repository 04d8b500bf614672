use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use docfix_core::commands::CommandNormalizer;
use docfix_core::config::{DEFAULT_CONFIG_FILENAME, Settings, SettingsOverrides};
use docfix_core::pipeline::{RunOptions, normalize_tree};

#[derive(Debug, Parser)]
#[command(
    name = "replace-commands",
    version,
    about = "Convert command blocks in Markdown files."
)]
struct Cli {
    #[arg(help = "Path to the root directory to scan.")]
    directory: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let settings = Settings::load(
        &PathBuf::from(DEFAULT_CONFIG_FILENAME),
        &SettingsOverrides::default(),
    )?;
    let options = RunOptions {
        extensions: settings.extensions,
        log_dir: settings.changelog_dir.value,
    };
    let report = normalize_tree(&CommandNormalizer, &cli.directory, &options)?;
    println!("{}", report.summary_line());
    Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use docfix_core::commands::CommandNormalizer;
use docfix_core::config::{DEFAULT_CONFIG_FILENAME, Settings, SettingsOverrides};
use docfix_core::images::ImageNormalizer;
use docfix_core::pipeline::{DocumentNormalizer, RunOptions, normalize_tree};
use docfix_core::redirect_test::{RedirectTestOptions, RedirectTester, http_client, write_report};
use docfix_core::redirects::{RedirectMapping, generate_redirects};
use docfix_core::sitemap::fetch_sitemap;

#[derive(Debug, Parser)]
#[command(
    name = "docfix",
    version,
    about = "Documentation maintenance: command blocks, image syntax and redirects"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Settings file (default: docfix.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved settings")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Convert {{< command >}} blocks into bash code fences")]
    Commands(DirectoryArgs),
    #[command(about = "Convert <img>, MDX-disabled and figure embeds into Markdown images")]
    Images(DirectoryArgs),
    Redirects(RedirectsArgs),
}

#[derive(Debug, Args)]
struct DirectoryArgs {
    #[arg(help = "Path to the root directory to scan")]
    directory: PathBuf,
}

#[derive(Debug, Args)]
struct RedirectsArgs {
    #[command(subcommand)]
    command: RedirectsSubcommand,
}

#[derive(Debug, Subcommand)]
enum RedirectsSubcommand {
    #[command(about = "Generate a _redirects file from the JSON redirect mapping")]
    Generate(GenerateArgs),
    #[command(about = "Check that old URLs land on their new URLs on a staging site")]
    Test(TestArgs),
    #[command(about = "Print every URL listed in a sitemap, to collect old links")]
    Sitemap(SitemapArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, value_name = "PATH", help = "JSON redirect mapping")]
    redirects: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Output file")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TestArgs {
    #[arg(long, value_name = "PATH", help = "JSON redirect mapping")]
    redirects: Option<PathBuf>,
    #[arg(long, value_name = "URL", help = "Staging base URL")]
    staging_url: Option<String>,
    #[arg(long, value_name = "SECS", help = "Request timeout in seconds")]
    timeout: Option<u64>,
    #[arg(long, value_name = "PATH", help = "Save a Markdown report to this file")]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SitemapArgs {
    #[arg(help = "Sitemap URL")]
    url: String,
    #[arg(long, value_name = "SECS", help = "Request timeout in seconds")]
    timeout: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Commands(args)) => run_commands(&runtime, &args.directory),
        Some(Commands::Images(args)) => run_images(&runtime, &args.directory),
        Some(Commands::Redirects(RedirectsArgs { command })) => match command {
            RedirectsSubcommand::Generate(args) => run_redirects_generate(&runtime, args),
            RedirectsSubcommand::Test(args) => run_redirects_test(&runtime, args),
            RedirectsSubcommand::Sitemap(args) => run_redirects_sitemap(&runtime, args),
        },
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_commands(runtime: &RuntimeOptions, directory: &Path) -> Result<()> {
    let settings = resolve_settings(runtime, &SettingsOverrides::default())?;
    run_normalizer(runtime, &settings, &CommandNormalizer, directory)
}

fn run_images(runtime: &RuntimeOptions, directory: &Path) -> Result<()> {
    let settings = resolve_settings(runtime, &SettingsOverrides::default())?;
    let normalizer = ImageNormalizer::new(&settings.image_prefix.value);
    run_normalizer(runtime, &settings, &normalizer, directory)
}

fn run_normalizer(
    runtime: &RuntimeOptions,
    settings: &Settings,
    normalizer: &dyn DocumentNormalizer,
    directory: &Path,
) -> Result<()> {
    let options = RunOptions {
        extensions: settings.extensions.clone(),
        log_dir: settings.changelog_dir.value.clone(),
    };
    let report = normalize_tree(normalizer, directory, &options)?;
    println!("{}", report.summary_line());
    print_diagnostics(runtime, settings);
    Ok(())
}

fn run_redirects_generate(runtime: &RuntimeOptions, args: GenerateArgs) -> Result<()> {
    let settings = resolve_settings(
        runtime,
        &SettingsOverrides {
            redirect_mapping: args.redirects,
            redirect_output: args.output,
            ..SettingsOverrides::default()
        },
    )?;
    let report = generate_redirects(
        &settings.redirect_mapping.value,
        &settings.redirect_output.value,
        &settings.products,
    )?;

    println!(
        "Generated {} redirects in {}",
        report.lines.len(),
        normalize_path(&report.output)
    );
    if report.pending_review > 0 {
        println!(
            "Skipped {} entries that still need manual review (remove `_note` from reviewed entries to include them)",
            report.pending_review
        );
    }
    print_diagnostics(runtime, &settings);
    Ok(())
}

fn run_redirects_test(runtime: &RuntimeOptions, args: TestArgs) -> Result<()> {
    let settings = resolve_settings(
        runtime,
        &SettingsOverrides {
            redirect_mapping: args.redirects,
            staging_url: args.staging_url,
            timeout_secs: args.timeout,
            ..SettingsOverrides::default()
        },
    )?;
    let mapping = RedirectMapping::load(&settings.redirect_mapping.value)?;
    let selected = mapping.select(&settings.products)?;
    let tester = RedirectTester::new(&RedirectTestOptions {
        base_url: settings.staging_url.value.clone(),
        timeout: settings.timeout,
        delay: settings.delay,
        user_agent: settings.user_agent.value.clone(),
    })?;

    println!("redirect test");
    println!("staging_url: {}", tester.base_url());
    println!(
        "mapping: {}",
        normalize_path(&settings.redirect_mapping.value)
    );
    let results = tester.run_with_progress(&selected, |index, check| {
        println!(
            "  [{index}] {} {}: {}",
            if check.success { "PASS" } else { "FAIL" },
            check.old_url,
            check.message
        );
    });

    println!("total: {}", results.total());
    println!("passed: {}", results.passed());
    println!("failed: {}", results.failed());
    println!("pending_review: {}", results.pending_review);
    if let Some(rate) = results.success_rate() {
        println!("success_rate: {rate:.1}%");
    }
    print_diagnostics(runtime, &settings);

    if results.total() == 0 {
        bail!(
            "no redirects to test in {}",
            normalize_path(&settings.redirect_mapping.value)
        );
    }
    if let Some(report_path) = args.report {
        write_report(&results, tester.base_url(), &report_path)?;
        println!("report: {}", normalize_path(&report_path));
    }
    if results.failed() > 0 {
        bail!("{} of {} redirect(s) failed", results.failed(), results.total());
    }
    Ok(())
}

fn run_redirects_sitemap(runtime: &RuntimeOptions, args: SitemapArgs) -> Result<()> {
    let settings = resolve_settings(
        runtime,
        &SettingsOverrides {
            timeout_secs: args.timeout,
            ..SettingsOverrides::default()
        },
    )?;
    let client = http_client(settings.timeout, &settings.user_agent.value)?;
    for location in fetch_sitemap(&client, &args.url)? {
        println!("{location}");
    }
    print_diagnostics(runtime, &settings);
    Ok(())
}

fn resolve_settings(runtime: &RuntimeOptions, overrides: &SettingsOverrides) -> Result<Settings> {
    dotenvy::dotenv().ok();

    let config_path = runtime
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    Settings::load(&config_path, overrides)
}

fn print_diagnostics(runtime: &RuntimeOptions, settings: &Settings) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", settings.diagnostics());
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

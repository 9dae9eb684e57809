use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indexbot_core::config::{DEFAULT_CONFIG_PATH, IndexerConfig, load_config};
use indexbot_core::runner::{InspectReport, RunOptions, RunReport, inspect, run_indexer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "indexbot",
    version,
    about = "Builds thread indexes for talk page archives on a MediaWiki wiki"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Index every opted-in talk page, or only the given ones")]
    Run(RunArgs),
    #[command(about = "Show parsed instructions and matched archives for one talk page")]
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long = "page", value_name = "TITLE", help = "Talk page to process (repeatable)")]
    pages: Vec<String>,
    #[arg(long, help = "Build indexes without saving anything")]
    dry_run: bool,
    #[arg(long, help = "Save the run log to the configured log page")]
    publish_log: bool,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    title: String,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match cli.command {
        Some(Commands::Run(args)) => {
            let config = load_runtime_config(&config_path, cli.diagnostics)?;
            run_run(&config, args)
        }
        Some(Commands::Inspect(args)) => {
            let config = load_runtime_config(&config_path, cli.diagnostics)?;
            run_inspect(&config, args)
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn load_runtime_config(path: &Path, diagnostics: bool) -> Result<IndexerConfig> {
    let config = load_config(path)?;
    if diagnostics {
        let settings = config.settings();
        println!("[diagnostics]");
        println!("config_path: {}", normalize_path(path));
        println!("config_exists: {}", format_flag(path.exists()));
        println!(
            "api_url: {}",
            config.api_url().unwrap_or_else(|| "<unset>".to_string())
        );
        println!("user_agent: {}", config.user_agent());
        println!("opt_in_template: {}", settings.opt_in_template);
        println!("default_template: {}", settings.default_template);
        println!("bot_user: {}", settings.bot_user);
        println!(
            "log_page: {}",
            settings.log_page.as_deref().unwrap_or("<none>")
        );
        println!(
            "enable_page: {}",
            settings.enable_page.as_deref().unwrap_or("<none>")
        );
        println!("task_id: {}", settings.task_id);
    }
    Ok(config)
}

fn run_run(config: &IndexerConfig, args: RunArgs) -> Result<()> {
    let options = RunOptions {
        pages: args.pages,
        dry_run: args.dry_run,
        publish_log: args.publish_log,
    };
    let report = run_indexer(config, &options)?;
    tracing::info!(
        processed = report.processed,
        indexed = report.indexed,
        unchanged = report.unchanged,
        configuration_errors = report.configuration_errors,
        safety_refusals = report.safety_refusals,
        failures = report.failures,
        requests = report.request_count,
        "run finished"
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_run_report(&report);
    Ok(())
}

fn print_run_report(report: &RunReport) {
    println!("enabled: {}", format_flag(report.enabled));
    println!("dry_run: {}", format_flag(report.dry_run));
    println!("processed: {}", report.processed);
    println!("indexed: {}", report.indexed);
    println!("unchanged: {}", report.unchanged);
    println!("configuration_errors: {}", report.configuration_errors);
    println!("safety_refusals: {}", report.safety_refusals);
    println!("failures: {}", report.failures);
    println!("published_log: {}", format_flag(report.published_log));
    println!("request_count: {}", report.request_count);
    for line in report.log.lines() {
        println!("{line}");
    }
}

fn run_inspect(config: &IndexerConfig, args: InspectArgs) -> Result<()> {
    let report = inspect(config, &args.title)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_inspect_report(&report);
    Ok(())
}

fn print_inspect_report(report: &InspectReport) {
    println!("talk_page: {}", report.talk_page);
    println!("problem: {}", report.problem.as_deref().unwrap_or("<none>"));
    if let Some(instructions) = &report.instructions {
        println!(
            "target: {}",
            instructions.target.as_deref().unwrap_or("<none>")
        );
        for mask in &instructions.masks {
            println!("mask: {mask}");
        }
        println!("template: {}", instructions.template);
        println!("leading_zeros: {}", instructions.leading_zeros);
        println!("indexhere: {}", format_flag(instructions.index_here));
        println!(
            "first_archive: {}",
            instructions.first_archive.as_deref().unwrap_or("<none>")
        );
    }
    println!("archives: {}", report.archives.len());
    for archive in &report.archives {
        println!("archive: {archive}");
    }
    println!("threads: {}", report.threads);
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_repeated_pages() {
        let cli = Cli::try_parse_from([
            "indexbot",
            "--config",
            "bot.toml",
            "run",
            "--page",
            "Talk:Foo",
            "--page",
            "Talk:Bar",
            "--dry-run",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.pages, vec!["Talk:Foo", "Talk:Bar"]);
                assert!(args.dry_run);
                assert!(!args.publish_log);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_inspect_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["indexbot", "inspect", "User talk:Example", "--diagnostics"])
            .expect("parse");
        assert!(cli.diagnostics);
        match cli.command {
            Some(Commands::Inspect(args)) => assert_eq!(args.title, "User talk:Example"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}

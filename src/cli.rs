use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::commands::diff::DiffOptions;
use crate::commands::history::HistoryOptions;
use crate::logging;
use crate::toc::config::SamplingMode;

#[derive(Debug, Parser)]
#[command(
    name = "toc-history",
    version,
    about = "Reconstruct how a wiki article's table of contents changed over time"
)]
struct Cli {
    /// trace|debug|info|warn|error|off (default: TOC_LOG or warn)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sample the page's revisions and print the outline timeline.
    History(HistoryArgs),
    /// Print the normalised outline of one wikitext file.
    Outline {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compare two outlines: renames, additions, removals and significance.
    Diff(DiffArgs),
    /// Show paths, effective configuration and environment overrides.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    page: String,
    /// Read revisions from a local JSON5 dump instead of the wiki API.
    #[arg(long)]
    revisions_file: Option<PathBuf>,
    #[arg(long, value_enum)]
    mode: Option<SamplingMode>,
    #[arg(long)]
    start_year: Option<i32>,
    #[arg(long)]
    end_year: Option<i32>,
    #[arg(long)]
    years_back: Option<u32>,
    #[arg(long)]
    significance_threshold: Option<f64>,
    #[arg(long)]
    rename_threshold: Option<f64>,
    #[arg(long)]
    no_renames: bool,
    #[arg(long)]
    no_cache: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct DiffArgs {
    old: PathBuf,
    new: PathBuf,
    #[arg(long)]
    rename_threshold: Option<f64>,
    #[arg(long)]
    no_renames: bool,
    #[arg(long)]
    json: bool,
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for line in &report.body {
            println!("{line}");
        }
        if !report.body.is_empty() {
            println!();
        }
        println!(
            "{}: {}",
            report.command,
            if report.ok { "ok" } else { "failed" }
        );
        for detail in &report.details {
            println!("  {detail}");
        }
        for issue in &report.issues {
            println!("  issue: {issue}");
        }
    }

    if !report.ok {
        anyhow::bail!(
            "{} reported {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Command::History(args) => {
            let opts = HistoryOptions {
                page: args.page,
                revisions_file: args.revisions_file,
                mode: args.mode,
                start_year: args.start_year,
                end_year: args.end_year,
                years_back: args.years_back,
                significance_threshold: args.significance_threshold,
                rename_threshold: args.rename_threshold,
                no_renames: args.no_renames,
                no_cache: args.no_cache,
            };
            render(&commands::history::run(&opts)?, args.json)
        }
        Command::Outline { file, json } => render(&commands::outline::run(&file)?, json),
        Command::Diff(args) => {
            let opts = DiffOptions {
                rename_threshold: args.rename_threshold,
                no_renames: args.no_renames,
            };
            render(&commands::diff::run(&args.old, &args.new, &opts)?, args.json)
        }
        Command::Status { json } => render(&commands::status::run()?, json),
    }
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::tracker::config::RunMode;

#[derive(Debug, Parser)]
#[command(
    name = "guild-lastseen",
    version,
    about = "Track when guild members were last seen online and post a daily summary"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape, update presence and post the daily report when due (default).
    Run(RunArgs),
    /// Show resolved paths, configuration and stored state.
    Status,
}

#[derive(Debug, Clone, Default, Args)]
struct RunArgs {
    /// Override the configured run mode.
    #[arg(long, value_enum)]
    mode: Option<RunMode>,
    /// Post a test report that ignores the once-per-day gate.
    #[arg(long)]
    preview: bool,
    /// Print the rendered report to stdout.
    #[arg(long)]
    print: bool,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if let Some(output) = &report.output {
        println!("{output}");
        println!();
    }
    let verdict = if report.ok { "ok" } else { "issues" };
    println!("{}: {verdict}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => commands::run::run(&commands::run::RunOptions {
            mode: args.mode,
            preview: args.preview,
            print: args.print,
        })?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

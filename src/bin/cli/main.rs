mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cadence-cli", about = "Spaced-repetition scheduler for memorization tasks", version)]
struct Cli {
    /// Config file (default: <config dir>/cadence/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file (default: <data dir>/cadence/state.json)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Task host file (default: <data dir>/cadence/host.json)
    #[arg(long, global = true)]
    host: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile, advance completed items, then take in new ones
    Tick,

    /// Advance completed items only
    Advance,

    /// Repair identity and title drift only
    Reconcile,

    /// Move backlog items into daily only
    Intake,

    /// Fill empty item bodies with their text
    FillNotes,

    /// Show every progress record
    State,

    /// List records with no matching task
    Stale,

    /// Print the body an item would get right now
    Preview {
        /// Item title
        title: String,
    },

    /// Add a task to a collection
    Add {
        /// Item title (a passage reference)
        title: String,
        /// Stage collection to add to
        #[arg(long, default_value = "backlog")]
        stage: String,
        /// Initial body text
        #[arg(long)]
        body: Option<String>,
    },

    /// Tick off a task as reviewed
    Complete {
        /// Item title
        title: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.config.as_deref(), cli.state.as_deref(), cli.host.as_deref())?;

    match cli.command {
        Command::Tick => commands::run::tick(&app, &cli.format, use_color)?,
        Command::Advance => commands::run::advance(&app, &cli.format, use_color)?,
        Command::Reconcile => commands::run::reconcile(&app, &cli.format, use_color)?,
        Command::Intake => commands::run::intake(&app, &cli.format, use_color)?,
        Command::FillNotes => commands::run::fill_notes(&app, &cli.format, use_color)?,
        Command::State => commands::state::run(&app, &cli.format, use_color)?,
        Command::Stale => commands::stale::run(&app, &cli.format)?,
        Command::Preview { title } => commands::preview::run(&app, &title)?,
        Command::Add { title, stage, body } => {
            commands::host::add(&app, &title, &stage, body.as_deref(), &cli.format)?
        }
        Command::Complete { title } => commands::host::complete(&app, &title)?,
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}

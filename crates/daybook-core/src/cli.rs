use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::recurrence::RepeatMode;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "daybook",
    version,
    about = "Daybook: daily task planner with recurring tasks and undo",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Select this date (YYYY-MM-DD or "today") before running the command
    #[arg(long = "date", global = true)]
    pub date: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task to the selected date, optionally repeating
    ///
    /// Example: daybook add Water the plants --repeat weekly --days mon,thu --until 2024-03-31
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long, default_value = "none")]
        repeat: RepeatMode,
        /// Day step for --repeat every
        #[arg(long)]
        every: Option<String>,
        /// Weekdays for --repeat weekly, e.g. mon,wed,fri
        #[arg(long)]
        days: Option<String>,
        /// Last date (inclusive) of the repetition
        #[arg(long)]
        until: Option<String>,
    },
    /// Set a task's status (todo, ongoing, completed)
    #[command(alias = "move")]
    Status { id: u64, status: String },
    /// Replace a task's text
    Edit {
        id: u64,
        #[arg(num_args = 0..)]
        text: Vec<String>,
    },
    /// Delete a task
    Delete { id: u64 },
    /// Undo the last change
    Undo,
    /// Redo the last undone change
    Redo,
    /// Show the selected date's tasks grouped by status
    Board,
    /// Show the month calendar
    Calendar {
        /// Jump to a month, YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Move the viewed month back
        #[arg(long, conflicts_with = "next")]
        prev: Option<i32>,
        /// Move the viewed month forward
        #[arg(long)]
        next: Option<i32>,
    },
    /// Select a date (YYYY-MM-DD or "today")
    Select { date: String },
    /// Write the whole history as JSON to stdout, a file or a directory
    Export { path: Option<PathBuf> },
    /// Replace the whole history with an exported file
    Import {
        path: PathBuf,
        /// Do not ask before replacing existing tasks
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

impl Command {
    pub fn from_default_name(name: &str) -> anyhow::Result<Self> {
        match name.trim() {
            "board" | "" => Ok(Command::Board),
            "calendar" => Ok(Command::Calendar {
                month: None,
                prev: None,
                next: None,
            }),
            other => Err(anyhow!("unsupported default.command: {other}")),
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

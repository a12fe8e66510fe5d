//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Life Planner - guided yearly planning with a weekly log
#[derive(Parser)]
#[command(
    name = "lp",
    about = "Guided life planning flow, weekly plan log and progress dashboard",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Must match --password
        #[arg(long)]
        confirm: String,
    },

    /// Sign in to an existing account
    Signin {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out and clear local planner state
    Signout,

    /// Show the signed-in user
    Whoami,

    /// Work through the planner flow
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },

    /// Log weekly plans
    Weekly {
        #[command(subcommand)]
        command: WeeklyCommand,
    },

    /// Rate captured goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommand,
    },

    /// Show overall progress (default when no command is given)
    Dashboard {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Planner flow subcommands
#[derive(Debug, Subcommand)]
pub enum FlowCommand {
    /// List steps with completion and reachability
    Status,

    /// Show the current step's fields and values
    Show,

    /// Save the current step and advance
    Submit {
        /// Field value as key=value (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// Go back one step
    Back,

    /// Jump to a reachable step (1-based)
    Goto {
        step: usize,
    },
}

/// Weekly plan subcommands
#[derive(Debug, Subcommand)]
pub enum WeeklyCommand {
    /// Save a plan for a week, replacing any plan for the same week
    Save {
        /// Defaults to the current year
        #[arg(short, long)]
        year: Option<i32>,

        /// 1-12, defaults to the current month
        #[arg(short, long)]
        month: Option<u32>,

        /// Week of month, 1-5
        #[arg(short, long, default_value = "1")]
        week: u32,

        /// Weekly focus
        #[arg(short, long)]
        focus: String,

        /// A win for the week (repeatable)
        #[arg(long = "win")]
        wins: Vec<String>,

        /// Schedule notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List saved plans, newest first
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Edit a saved plan; unset options keep their stored values
    Edit {
        /// Plan id (year-month-week)
        id: String,

        #[arg(short, long)]
        focus: Option<String>,

        /// Replace the wins (repeatable)
        #[arg(long = "win")]
        wins: Vec<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete a saved plan (requires sign-in)
    Delete {
        /// Plan id (year-month-week)
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Goal score subcommands
#[derive(Debug, Subcommand)]
pub enum GoalsCommand {
    /// Show every goal with its score
    List,

    /// Rate a goal from 1 to 10
    Set {
        /// Goal id, e.g. goal_self
        id: String,

        score: u8,
    },
}

/// Parse a `key=value` pair
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    debug!(%s, "parse_key_val: called");
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lifeplanner")
        .join("logs")
        .join("lifeplanner.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for list/dashboard commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

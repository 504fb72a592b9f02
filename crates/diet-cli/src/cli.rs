//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Screen-time diet tracker.
///
/// Reconstructs per-app foreground time from usage events, tracks daily goals
/// and streaks, and raises alerts as usage approaches each goal.
#[derive(Debug, Parser)]
#[command(name = "diet", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database location and what has been recorded.
    Status,

    /// Record a single usage event or daily total.
    Ingest {
        #[command(subcommand)]
        record: IngestRecord,
    },

    /// Import events and daily totals from JSONL on stdin.
    Import,

    /// Manage daily goals.
    #[command(subcommand)]
    Goal(GoalAction),

    /// Manage the set of monitored apps.
    #[command(subcommand)]
    Track(TrackAction),

    /// Set the display label of an app.
    Label {
        /// Package identifier.
        package: String,
        /// Human-readable name.
        label: String,
    },

    /// Show or change alert settings.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Run one refresh pass: publish the view and fire due alerts.
    Refresh {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Calendar report for one month.
    Report(ReportArgs),

    /// Run refresh passes periodically until interrupted.
    Watch {
        /// Seconds between passes (defaults to `refresh_interval_secs`).
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

/// Records that can be ingested.
#[derive(Debug, Subcommand)]
pub enum IngestRecord {
    /// Record a foreground/background/screen-off event.
    Event {
        /// Package identifier.
        #[arg(long)]
        package: String,

        /// Event kind (e.g., `foreground_enter`, `foreground_exit`, `screen_off`).
        #[arg(long)]
        kind: String,

        /// When it happened: RFC 3339 or relative (e.g., '5 minutes ago'). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Record the coarse total of one app for one day.
    Daily {
        /// Calendar day (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Package identifier.
        #[arg(long)]
        package: String,

        /// Foreground minutes that day.
        #[arg(long, allow_hyphen_values = true)]
        minutes: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum GoalAction {
    /// Set the daily goal of an app in minutes (0 removes it).
    Set { package: String, minutes: u32 },
    /// List configured goals.
    List,
}

#[derive(Debug, Subcommand)]
pub enum TrackAction {
    /// Start monitoring apps.
    Add {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Stop monitoring apps.
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// List monitored apps.
    List,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the current alert settings.
    Show,
    /// Change alert settings; omitted flags keep their value.
    Set(SettingsArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Alert when an app reaches 50% of its goal.
    #[arg(long = "individual-50")]
    pub individual_50: Option<bool>,
    /// Alert when an app reaches 70% of its goal.
    #[arg(long = "individual-70")]
    pub individual_70: Option<bool>,
    /// Alert when an app exceeds its goal.
    #[arg(long = "individual-100")]
    pub individual_100: Option<bool>,
    /// Alert when total usage reaches 50% of the total goal.
    #[arg(long = "total-50")]
    pub total_50: Option<bool>,
    /// Alert when total usage reaches 70% of the total goal.
    #[arg(long = "total-70")]
    pub total_70: Option<bool>,
    /// Alert when total usage exceeds the total goal.
    #[arg(long = "total-100")]
    pub total_100: Option<bool>,
    /// Minutes between repeated over-goal alerts.
    #[arg(long)]
    pub repeat_interval: Option<i64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    /// Report a single app instead of all tracked apps.
    #[arg(long)]
    pub package: Option<String>,

    /// Month to report (YYYY-MM). Defaults to the current month.
    #[arg(long)]
    pub month: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

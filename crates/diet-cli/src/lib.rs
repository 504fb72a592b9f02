//! Screen-time diet tracker CLI library.
//!
//! This crate provides the CLI interface for the tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{
    Cli, Commands, GoalAction, IngestRecord, ReportArgs, SettingsAction, SettingsArgs, TrackAction,
};
pub use config::Config;

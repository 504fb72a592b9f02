//! CLI subcommand implementations.

pub mod import;
pub mod ingest;
pub mod preferences;
pub mod refresh;
pub mod report;
pub mod settings;
pub mod status;
pub mod util;
pub mod watch;

//! Core domain logic for the screen-time diet tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Reconstruction: turning foreground/background events into minutes per app
//! - History: merging coarse daily totals with today's precise usage
//! - Streaks: consecutive days at or over each app's goal
//! - Alerts: 50/70/100% threshold notifications with debouncing
//! - Refresh: the single-flight pass that publishes a consistent usage view

pub mod calendar;
pub mod event;
pub mod history;
pub mod notify;
mod reconstruct;
pub mod service;
pub mod source;
mod streak;
mod types;
pub mod view;

pub use calendar::{
    CalendarMark, DayStatus, calendar_marks, classify_day, month_success_days, monthly_series,
};
pub use event::{EventKind, RawEvent};
pub use history::{
    CoarseDailyStat, DATE_FORMAT, DEFAULT_HISTORY_DAYS, DailyUsage, aggregate_history, history_start,
    parse_day,
};
pub use notify::{
    AlertScope, DebounceMemory, Evaluation, FiredAlert, NotificationKey, NotificationSettings,
    ScopeUsage, Threshold, UsageSnapshot, evaluate_thresholds,
};
pub use reconstruct::{UsageWindow, exclude_packages, reconstruct_usage};
pub use service::{
    Collaborators, PassOutcome, PassReport, RefreshConfig, RefreshError, RefreshService,
};
pub use source::{
    AlertDispatcher, AppMetadata, BoxError, DebounceStore, MemoryDebounceStore, NoMetadata,
    Preferences, UsageSource,
};
pub use streak::{compute_streaks, fold_today, past_streak, streak_summary};
pub use types::{
    Goals, MILLIS_PER_MINUTE, PackageName, UsageMinutes, ValidationError, format_minutes,
};
pub use view::{AppUsage, UsageView, ViewInputs, build_view};

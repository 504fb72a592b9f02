//! Refresh service: one batch pass over all core components.
//!
//! A pass runs strictly in order:
//!
//! 1. Load preferences and fetch raw events plus coarse totals
//! 2. Reconstruct today, aggregate history, compute streaks, build the view
//! 3. Evaluate alert thresholds and commit debounce memory once
//! 4. Publish the view (whole-value swap), then hand alerts to the dispatcher
//!
//! Nothing externally visible changes until step 3 succeeds, so a failed or
//! aborted pass leaves the last committed view and memory in place. Delivery
//! failures are logged and never undo the commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::watch;

use crate::history::{DEFAULT_HISTORY_DAYS, aggregate_history, history_start};
use crate::notify::{FiredAlert, evaluate_thresholds};
use crate::reconstruct::{UsageWindow, exclude_packages, reconstruct_usage};
use crate::source::{AlertDispatcher, AppMetadata, BoxError, DebounceStore, Preferences, UsageSource};
use crate::types::{Goals, PackageName};
use crate::view::{UsageView, ViewInputs, build_view};

/// Retryable failure of a refresh pass.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("usage source failed")]
    Source(#[source] BoxError),
    #[error("failed to load preferences")]
    Preferences(#[source] BoxError),
    #[error("failed to load debounce memory")]
    DebounceLoad(#[source] BoxError),
    #[error("failed to commit debounce memory")]
    DebounceCommit(#[source] BoxError),
}

/// Tunables of the refresh pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Trailing days of coarse history to merge.
    pub history_days: u32,
    /// Packages never counted as usage (the tracker itself, the launcher).
    pub excluded_packages: Vec<PackageName>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            excluded_packages: Vec::new(),
        }
    }
}

/// External collaborators of the service.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn UsageSource>,
    pub preferences: Arc<dyn Preferences>,
    pub debounce: Arc<dyn DebounceStore>,
    pub metadata: Arc<dyn AppMetadata>,
    pub dispatcher: Arc<dyn AlertDispatcher>,
}

/// What a completed pass produced.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub view: Arc<UsageView>,
    pub fired: Vec<FiredAlert>,
    /// Alerts the dispatcher failed to deliver. They stay recorded as fired.
    pub undelivered: usize,
}

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass was in flight; this trigger was folded into it.
    Coalesced,
}

/// Owns the published usage view and serializes refresh passes.
///
/// Construct one per process (or per account) and share it by reference.
pub struct RefreshService {
    collaborators: Collaborators,
    config: RefreshConfig,
    pass_gate: Mutex<()>,
    published: watch::Sender<Arc<UsageView>>,
}

impl RefreshService {
    pub fn new(collaborators: Collaborators, config: RefreshConfig) -> Self {
        let (published, _) = watch::channel(Arc::new(UsageView::default()));
        Self {
            collaborators,
            config,
            pass_gate: Mutex::new(()),
            published,
        }
    }

    /// Receiver that observes every published view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<UsageView>> {
        self.published.subscribe()
    }

    /// Last fully committed view.
    pub fn current(&self) -> Arc<UsageView> {
        self.published.borrow().clone()
    }

    /// Runs a pass at the current local time, waiting for any pass in flight.
    pub fn refresh(&self) -> Result<PassReport, RefreshError> {
        self.refresh_at(&Local::now())
    }

    /// Runs a pass at `now`, waiting for any pass in flight.
    pub fn refresh_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<PassReport, RefreshError> {
        let _gate = self
            .pass_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.run_pass(now)
    }

    /// Runs a pass at `now` unless one is already in flight.
    pub fn try_refresh_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<PassOutcome, RefreshError> {
        let _gate = match self.pass_gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("refresh already in flight, coalescing trigger");
                return Ok(PassOutcome::Coalesced);
            }
        };
        self.run_pass(now).map(PassOutcome::Completed)
    }

    /// Computes a view at `now` without publishing it or evaluating alerts.
    pub fn compute_view_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<UsageView, RefreshError> {
        let preferences = &self.collaborators.preferences;
        let goals = preferences.goals().map_err(RefreshError::Preferences)?;
        let tracked = preferences
            .tracked_packages()
            .map_err(RefreshError::Preferences)?;
        self.compute_view(now, &goals, &tracked)
    }

    fn run_pass<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<PassReport, RefreshError> {
        let preferences = &self.collaborators.preferences;
        let goals = preferences.goals().map_err(RefreshError::Preferences)?;
        let tracked = preferences
            .tracked_packages()
            .map_err(RefreshError::Preferences)?;
        let settings = preferences
            .notification_settings()
            .map_err(RefreshError::Preferences)?;

        let view = self.compute_view(now, &goals, &tracked)?;

        let debounce = &self.collaborators.debounce;
        let memory = debounce.load().map_err(RefreshError::DebounceLoad)?;
        let evaluation = evaluate_thresholds(&view.snapshot(), &settings, &memory, now);
        debounce
            .commit(&evaluation.memory)
            .map_err(RefreshError::DebounceCommit)?;

        let view = Arc::new(view);
        self.published.send_replace(Arc::clone(&view));

        let mut undelivered = 0;
        for alert in &evaluation.fired {
            tracing::info!(key = %alert.key, title = %alert.title, "firing alert");
            if let Err(err) = self.collaborators.dispatcher.dispatch(alert) {
                tracing::warn!(key = %alert.key, error = %err, "alert delivery failed");
                undelivered += 1;
            }
        }

        tracing::info!(
            today = %view.today,
            apps = view.apps.len(),
            total_usage = view.total_usage,
            fired = evaluation.fired.len(),
            "refresh pass complete"
        );

        Ok(PassReport {
            view,
            fired: evaluation.fired,
            undelivered,
        })
    }

    fn compute_view<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        goals: &Goals,
        tracked: &BTreeSet<PackageName>,
    ) -> Result<UsageView, RefreshError> {
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);
        let window = UsageWindow::new(local_midnight(&now.timezone(), today, now_utc), now_utc);

        let source = &self.collaborators.source;
        let events = source.events(&window).map_err(RefreshError::Source)?;
        let oldest = history_start(today, self.config.history_days);
        let coarse = source
            .daily_totals(oldest, today)
            .map_err(RefreshError::Source)?;
        tracing::debug!(
            events = events.len(),
            coarse = coarse.len(),
            start = %window.start,
            end = %window.end,
            "fetched usage data"
        );

        let today_usage = exclude_packages(
            reconstruct_usage(&events, &window),
            self.config.excluded_packages.iter().map(PackageName::as_str),
        );
        let history = aggregate_history(&coarse, &today_usage, today, self.config.history_days);

        let labels = self.resolve_labels(
            tracked
                .iter()
                .chain(today_usage.keys())
                .chain(goals.keys()),
        );

        Ok(build_view(&ViewInputs {
            generated_at: now_utc,
            today,
            history: &history,
            today_usage: &today_usage,
            goals,
            tracked,
            labels: &labels,
        }))
    }

    fn resolve_labels<'a, I>(&self, packages: I) -> BTreeMap<PackageName, String>
    where
        I: IntoIterator<Item = &'a PackageName>,
    {
        let mut labels = BTreeMap::new();
        for package in packages {
            if labels.contains_key(package) {
                continue;
            }
            match self.collaborators.metadata.label(package) {
                Some(label) => {
                    labels.insert(package.clone(), label);
                }
                None => tracing::debug!(%package, "no label, falling back to package name"),
            }
        }
        labels
    }
}

/// Start of `day` in `tz`, as UTC. Falls back to 01:00 when midnight falls in
/// a DST gap, and to `fallback` if neither exists.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate, fallback: DateTime<Utc>) -> DateTime<Utc> {
    [NaiveTime::MIN, NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN)]
        .into_iter()
        .find_map(|time| tz.from_local_datetime(&day.and_time(time)).earliest())
        .map_or(fallback, |start| start.with_timezone(&Utc))
}

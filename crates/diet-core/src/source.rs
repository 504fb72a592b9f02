//! Collaborator interfaces the refresh service depends on.
//!
//! Implementations live outside this crate (SQLite storage, OS bridges,
//! notification delivery). All of them must be shareable across threads.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::event::RawEvent;
use crate::history::CoarseDailyStat;
use crate::notify::{DebounceMemory, FiredAlert, NotificationSettings};
use crate::reconstruct::UsageWindow;
use crate::types::{Goals, PackageName};

/// Boxed error returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// OS usage-tracking subsystem.
///
/// Returning `Ok` with no data means "no usage", not a failure.
pub trait UsageSource: Send + Sync {
    /// Lifecycle events in `window`, sorted by timestamp ascending.
    fn events(&self, window: &UsageWindow) -> Result<Vec<RawEvent>, BoxError>;

    /// Coarse daily totals for days in `[since, until]`.
    fn daily_totals(
        &self,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<CoarseDailyStat>, BoxError>;
}

/// User preferences: goals, tracked packages and alert settings.
pub trait Preferences: Send + Sync {
    fn goals(&self) -> Result<Goals, BoxError>;

    fn tracked_packages(&self) -> Result<BTreeSet<PackageName>, BoxError>;

    fn notification_settings(&self) -> Result<NotificationSettings, BoxError>;
}

/// Durable storage for [`DebounceMemory`].
///
/// `commit` must replace the stored memory as a whole or not at all.
pub trait DebounceStore: Send + Sync {
    fn load(&self) -> Result<DebounceMemory, BoxError>;

    fn commit(&self, memory: &DebounceMemory) -> Result<(), BoxError>;
}

/// Display metadata lookup. `None` means "fall back to the package name".
pub trait AppMetadata: Send + Sync {
    fn label(&self, package: &PackageName) -> Option<String>;
}

/// Notification delivery. The outcome is never fed back into the core.
pub trait AlertDispatcher: Send + Sync {
    fn dispatch(&self, alert: &FiredAlert) -> Result<(), BoxError>;
}

/// Metadata source that knows no labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl AppMetadata for NoMetadata {
    fn label(&self, _package: &PackageName) -> Option<String> {
        None
    }
}

/// Process-local debounce store, for tests and single-run tools.
#[derive(Debug, Default)]
pub struct MemoryDebounceStore {
    memory: Mutex<DebounceMemory>,
}

impl MemoryDebounceStore {
    pub fn new(memory: DebounceMemory) -> Self {
        Self {
            memory: Mutex::new(memory),
        }
    }

    pub fn snapshot(&self) -> DebounceMemory {
        self.memory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl DebounceStore for MemoryDebounceStore {
    fn load(&self) -> Result<DebounceMemory, BoxError> {
        Ok(self.snapshot())
    }

    fn commit(&self, memory: &DebounceMemory) -> Result<(), BoxError> {
        *self
            .memory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = memory.clone();
        Ok(())
    }
}

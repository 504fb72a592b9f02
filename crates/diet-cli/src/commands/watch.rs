//! Watch command: periodic refresh passes until Ctrl-C.
//!
//! Each tick hands a pass to the blocking pool. A tick that lands while the
//! previous pass is still running is coalesced by the service, and a pass
//! held by another process (via the lock file) is skipped.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use diet_core::{PassOutcome, RefreshService};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::Config;
use crate::commands::refresh::{TerminalDispatcher, build_service};
use crate::commands::util::{PassLock, open_store};

pub fn run(config: &Config, interval_secs: Option<u64>) -> Result<()> {
    let interval_secs = interval_secs.unwrap_or(config.refresh_interval_secs);
    if interval_secs == 0 {
        anyhow::bail!("refresh interval must be at least one second");
    }
    let store = Arc::new(open_store(config)?);
    let service = Arc::new(build_service(store, Arc::new(TerminalDispatcher), config)?);
    let lock_path = config.lock_path();

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime.block_on(watch_loop(
        service,
        lock_path,
        Duration::from_secs(interval_secs),
        tokio::signal::ctrl_c(),
    ))
}

async fn watch_loop(
    service: Arc<RefreshService>,
    lock_path: PathBuf,
    period: Duration,
    shutdown: impl Future<Output = io::Result<()>>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut passes = JoinSet::new();
    let mut updates = service.subscribe();

    tracing::info!(interval_secs = period.as_secs(), "watching usage");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                while passes.try_join_next().is_some() {}
                let service = Arc::clone(&service);
                let lock_path = lock_path.clone();
                passes.spawn_blocking(move || run_pass(&service, &lock_path));
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                println!(
                    "{} total {} min across {} tracked apps",
                    view.generated_at.with_timezone(&Local).format("%H:%M"),
                    view.total_usage,
                    view.tracked.len()
                );
            }
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("interrupted, waiting for running pass");
                break;
            }
        }
    }

    while passes.join_next().await.is_some() {}
    Ok(())
}

fn run_pass(service: &RefreshService, lock_path: &Path) {
    let _lock = match PassLock::try_acquire(lock_path) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            tracing::debug!("another process is refreshing, skipping tick");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to take refresh lock");
            return;
        }
    };
    match service.try_refresh_at(&Local::now()) {
        Ok(PassOutcome::Completed(report)) => {
            tracing::debug!(fired = report.fired.len(), "watch pass complete");
        }
        Ok(PassOutcome::Coalesced) => {}
        Err(err) => tracing::warn!(error = %err, "refresh pass failed, will retry next tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn temp_config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("diet.db"),
            ..Config::default()
        }
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp_config(&temp);
        assert!(run(&config, Some(0)).is_err());
    }

    #[test]
    fn test_pass_is_skipped_while_lock_is_held() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp_config(&temp);
        let store = Arc::new(open_store(&config).unwrap());
        let service = build_service(store, Arc::new(TerminalDispatcher), &config).unwrap();

        let held = PassLock::acquire(&config.lock_path()).unwrap();
        run_pass(&service, &config.lock_path());
        assert_eq!(service.current().generated_at, DateTime::<Utc>::default());
        drop(held);

        run_pass(&service, &config.lock_path());
        assert_ne!(service.current().generated_at, DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn test_shutdown_drains_running_pass() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp_config(&temp);
        let store = Arc::new(open_store(&config).unwrap());
        let service = Arc::new(build_service(store, Arc::new(TerminalDispatcher), &config).unwrap());

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), io::Error>(())
        };
        watch_loop(
            Arc::clone(&service),
            config.lock_path(),
            Duration::from_secs(3600),
            shutdown,
        )
        .await
        .unwrap();

        assert_ne!(service.current().generated_at, DateTime::<Utc>::default());
    }
}

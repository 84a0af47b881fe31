//! CNI configuration directory watcher
//!
//! Filesystem notifications on the CNI conf dir trigger a network catalog
//! reload. Bursts of events (editors writing temp files, config management
//! replacing several files) are coalesced into one reload.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

pub struct ConfigWatcher {
    dir: PathBuf,
    debounce: Duration,
}

/// Stops watching when dropped
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConfigWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn start(self, state: Arc<AppState>) -> Result<WatcherHandle> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if is_relevant(&event) => {
                    let _ = tx.send(event);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "CNI config watch error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", self.dir.display()))?;
        info!(path = %self.dir.display(), "Watching CNI config directory");

        let debounce = self.debounce;
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!(paths = ?event.paths, kind = ?event.kind, "CNI config changed");

                tokio::time::sleep(debounce).await;
                while rx.try_recv().is_ok() {}

                // Failures are recorded by the reload itself
                if let Ok(summary) = state.reload_network_config().await {
                    debug!(net_classes = summary.net_classes, "Reload after CNI config change");
                }
            }
            debug!("CNI config watcher channel closed");
        });

        Ok(WatcherHandle {
            _watcher: watcher,
            task,
        })
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

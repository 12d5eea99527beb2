//! File-change notifications and the invalidation bridge.
//!
//! The engine consumes `{path, kind}` events from a watch service through an
//! mpsc channel; a `Modified` event for any watched path discards every
//! namespace. The service itself is a boundary trait so tests inject a
//! recording fake; [`FsWatchService`] covers the on-disk case with the
//! platform watcher from `notify`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Weak};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::EngineCore;
use crate::error::WatchError;

/// Capacity of the change-event channel between service and bridge.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One file-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// What happened to the file. Only `Modified` invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Created,
    Removed,
    Other,
}

/// Boundary to the watch service feeding [`ChangeEvent`]s.
pub trait WatchService: Send + Sync + 'static {
    /// Register one path for change notifications.
    fn watch(&self, path: &Path) -> Result<(), WatchError>;

    /// Release the service's resources.
    fn close(&self) -> Result<(), WatchError>;
}

/// Invalidation loop, spawned once per engine.
///
/// Runs until the engine is dropped or the event channel closes. Which path
/// changed does not matter: any file may contribute named bodies consumed by
/// other cached templates, so eviction is all-or-nothing.
pub(crate) async fn run_bridge(engine: Weak<EngineCore>, mut events: mpsc::Receiver<ChangeEvent>) {
    while let Some(event) = events.recv().await {
        if event.kind != ChangeKind::Modified {
            debug!(path = %event.path.display(), kind = ?event.kind, "ignoring change event");
            continue;
        }
        let Some(engine) = engine.upgrade() else {
            break;
        };
        info!(path = %event.path.display(), "template source modified");
        engine.invalidate();
    }
    debug!("watch bridge stopped");
}

/// [`WatchService`] over `notify`'s recommended platform watcher.
///
/// Events are forwarded from the notify callback thread into the bridge
/// channel; paths are watched non-recursively, one registration per loaded
/// source file.
pub struct FsWatchService {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FsWatchService {
    /// Start the watcher. Returns the service and its event stream.
    pub fn start() -> Result<(Self, mpsc::Receiver<ChangeEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(DEFAULT_EVENT_CAPACITY);
        let watcher =
            notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(error) => {
                        warn!(%error, "watch service reported an error, skipping event");
                        return;
                    }
                };
                let kind = match event.kind {
                    notify::EventKind::Modify(_) => ChangeKind::Modified,
                    notify::EventKind::Create(_) => ChangeKind::Created,
                    notify::EventKind::Remove(_) => ChangeKind::Removed,
                    _ => ChangeKind::Other,
                };
                for path in event.paths {
                    if tx.blocking_send(ChangeEvent { path, kind }).is_err() {
                        // bridge is gone, drop the rest
                        return;
                    }
                }
            })
            .map_err(|error| WatchError::Start(error.to_string()))?;

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
            },
            rx,
        ))
    }
}

impl WatchService for FsWatchService {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        let mut guard = self.watcher.lock().expect("lock poisoned");
        let Some(watcher) = guard.as_mut() else {
            return Err(WatchError::Register {
                path: path.to_path_buf(),
                reason: "watch service is closed".to_string(),
            });
        };
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|error| WatchError::Register {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })
    }

    fn close(&self) -> Result<(), WatchError> {
        // dropping the platform watcher is what releases its resources
        self.watcher.lock().expect("lock poisoned").take();
        Ok(())
    }
}

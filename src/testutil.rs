//! Shared test doubles: a canned file store and recording watch services.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::engine::Engine;
use crate::error::WatchError;
use crate::source::FileStore;
use crate::watch::{ChangeEvent, WatchService};

pub const ROOT: &str = "testdata";

/// The source path the resolver computes for a template name under [`ROOT`].
pub fn source_path(name: &str) -> PathBuf {
    Path::new(ROOT).join(format!("{name}.html"))
}

/// In-memory file store with read recording.
#[derive(Clone, Default)]
pub struct MapStore {
    files: Arc<HashMap<PathBuf, String>>,
    reads: Arc<Mutex<Vec<PathBuf>>>,
}

impl MapStore {
    pub fn reads(&self) -> usize {
        self.reads.lock().unwrap().len()
    }
}

impl FileStore for MapStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no template at {}", path.display()),
            )
        })
    }
}

/// A store holding `(name, body)` templates under [`ROOT`].
pub fn store(files: &[(&str, &str)]) -> MapStore {
    let files = files
        .iter()
        .map(|(name, body)| (source_path(name), body.to_string()))
        .collect();
    MapStore {
        files: Arc::new(files),
        reads: Arc::default(),
    }
}

/// Watch service recording registrations and close calls.
#[derive(Clone, Default)]
pub struct RecordingWatcher {
    pub watched: Arc<Mutex<Vec<PathBuf>>>,
    pub closed: Arc<AtomicBool>,
}

impl WatchService for RecordingWatcher {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        self.watched.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn close(&self) -> Result<(), WatchError> {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Watch service that refuses every registration.
pub struct FailingWatcher;

impl WatchService for FailingWatcher {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        Err(WatchError::Register {
            path: path.to_path_buf(),
            reason: "registration refused".to_string(),
        })
    }

    fn close(&self) -> Result<(), WatchError> {
        Ok(())
    }
}

/// An engine over [`ROOT`] with canned templates, plus the handles tests
/// observe and drive it through.
pub fn engine_with(
    files: &[(&str, &str)],
) -> (Engine, MapStore, RecordingWatcher, mpsc::Sender<ChangeEvent>) {
    let store = store(files);
    let watcher = RecordingWatcher::default();
    let (tx, rx) = mpsc::channel(8);
    let engine = Engine::with_store(ROOT, watcher.clone(), rx, store.clone());
    (engine, store, watcher, tx)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

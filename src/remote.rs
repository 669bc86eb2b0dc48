//! Remote key-value store gateway.
//!
//! The session needs exactly two capabilities from the remote store: a merge
//! write at a path and a read that delivers one snapshot or keeps delivering
//! until the caller drops the stream. Any backend that can express those two
//! operations plugs in through [`RemoteStore`].

use crate::error::RemoteError;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::sync::Mutex;
use tracing::debug;

/// Root node all translation data lives under.
pub const TRANSLATIONS_ROOT: &str = "translations";

/// Node diagnostics are appended to.
pub const ERROR_LOG_PATH: &str = "translations/logs/errors";

/// Value found at a path; `None` when nothing is stored there.
pub type Snapshot = Option<Value>;

/// Stream of snapshots. Dropping it cancels the subscription.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, RemoteError>>;

/// Path of the translation set for an (app, language) pair.
pub fn translations_path(app: &str, language: &str) -> String {
    format!("{}/{}/{}", TRANSLATIONS_ROOT, app, language)
}

/// Path of a single translation entry.
pub fn entry_path(app: &str, language: &str, key: &str) -> String {
    format!("{}/{}", translations_path(app, language), key)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Deliver exactly one snapshot and complete
    pub only_once: bool,
}

impl ReadOptions {
    pub fn once() -> Self {
        Self { only_once: true }
    }

    pub fn live() -> Self {
        Self { only_once: false }
    }
}

/// Read/write access to a hierarchical key-value store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Merge the fields of `value` into the node at `path`.
    ///
    /// Fields not named in `value` are left as they are.
    async fn write(&self, path: &str, value: Map<String, Value>) -> Result<(), RemoteError>;

    /// Open a read of the node at `path`.
    ///
    /// With `only_once` the stream yields a single item and ends. Otherwise it
    /// yields the current value and then every change until dropped.
    async fn read(&self, path: &str, options: ReadOptions) -> Result<SnapshotStream, RemoteError>;
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Either path is a prefix of (or equal to) the other.
fn paths_overlap(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

struct Watcher {
    path: Vec<String>,
    sender: mpsc::UnboundedSender<Result<Snapshot, RemoteError>>,
}

#[derive(Default)]
struct MemoryTree {
    root: Map<String, Value>,
    watchers: Vec<Watcher>,
    read_failure: Option<String>,
    write_failure: Option<String>,
    writes: usize,
}

impl MemoryTree {
    fn value_at(&self, path: &[String]) -> Snapshot {
        let mut node = self.root.get(path.first()?)?;
        for segment in &path[1..] {
            node = node.as_object()?.get(segment)?;
        }
        Some(node.clone())
    }

    fn merge_at(&mut self, path: &[String], value: Map<String, Value>) {
        let mut node = &mut self.root;
        for segment in path {
            let child = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            let Value::Object(map) = child else {
                return;
            };
            node = map;
        }
        for (key, field) in value {
            node.insert(key, field);
        }
    }

    fn notify(&mut self, written: &[String]) {
        let mut watchers = std::mem::take(&mut self.watchers);
        watchers.retain(|watcher| {
            if watcher.sender.is_closed() {
                return false;
            }
            if !paths_overlap(&watcher.path, written) {
                return true;
            }
            let snapshot = self.value_at(&watcher.path);
            watcher.sender.unbounded_send(Ok(snapshot)).is_ok()
        });
        self.watchers = watchers;
    }
}

/// In-process remote store: a JSON tree with merge writes and live reads.
#[derive(Default)]
pub struct MemoryRemoteStore {
    tree: Mutex<MemoryTree>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a JSON object as its root.
    pub fn with_data(data: Value) -> Self {
        let store = Self::new();
        if let (Value::Object(root), Ok(mut tree)) = (data, store.tree.lock()) {
            tree.root = root;
        }
        store
    }

    /// Current value at `path`.
    pub fn value_at(&self, path: &str) -> Snapshot {
        let path: Vec<String> = segments(path).into_iter().map(String::from).collect();
        self.tree.lock().ok()?.value_at(&path)
    }

    /// Number of writes that succeeded.
    pub fn write_count(&self) -> usize {
        self.tree.lock().map(|tree| tree.writes).unwrap_or_default()
    }

    /// Number of live subscriptions whose stream is still held.
    pub fn subscriber_count(&self) -> usize {
        self.tree
            .lock()
            .map(|tree| tree.watchers.iter().filter(|w| !w.sender.is_closed()).count())
            .unwrap_or_default()
    }

    /// Make every following read fail with `message` (or succeed again with `None`).
    pub fn fail_reads(&self, message: Option<&str>) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.read_failure = message.map(String::from);
        }
    }

    /// Make every following write fail with `message` (or succeed again with `None`).
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.write_failure = message.map(String::from);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryTree>, RemoteError> {
        self.tree
            .lock()
            .map_err(|_| RemoteError::Unavailable("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn write(&self, path: &str, value: Map<String, Value>) -> Result<(), RemoteError> {
        let mut tree = self.lock()?;
        if let Some(message) = &tree.write_failure {
            return Err(RemoteError::Write {
                path: path.to_string(),
                message: message.clone(),
            });
        }

        let path: Vec<String> = segments(path).into_iter().map(String::from).collect();
        debug!("Merging {} field(s) at {}", value.len(), path.join("/"));
        tree.merge_at(&path, value);
        tree.writes += 1;
        tree.notify(&path);
        Ok(())
    }

    async fn read(&self, path: &str, options: ReadOptions) -> Result<SnapshotStream, RemoteError> {
        let mut tree = self.lock()?;
        if let Some(message) = &tree.read_failure {
            return Err(RemoteError::Read {
                path: path.to_string(),
                message: message.clone(),
            });
        }

        let segments: Vec<String> = segments(path).into_iter().map(String::from).collect();
        let current = tree.value_at(&segments);

        if options.only_once {
            return Ok(stream::once(async move { Ok(current) }).boxed());
        }

        let (sender, receiver) = mpsc::unbounded();
        // An unbounded send only fails once the receiver is gone, and we hold it.
        let _ = sender.unbounded_send(Ok(current));
        tree.watchers.push(Watcher {
            path: segments,
            sender,
        });
        Ok(receiver.boxed())
    }
}

//! Session state shared by the request pipeline and the build tracker.
//!
//! The compiler owns the writing side of [`SharedAssets`]; everything here
//! only reads it. The last compile outcome and the live-reload subscribers
//! sit behind their own `parking_lot` locks so a slow SSE client never blocks
//! asset lookups.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffered events per live-reload subscriber.
const SUBSCRIBER_BUFFER: usize = 100;

/// Outcome of the most recent compilation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildStatus {
    #[default]
    Pending,
    Compiling,
    Compiled {
        duration_ms: u64,
    },
    /// All errors of the failed compile, joined
    Failed {
        error: String,
    },
}

impl BuildStatus {
    pub fn is_compiling(&self) -> bool {
        matches!(self, BuildStatus::Compiling)
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, BuildStatus::Compiled { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// One compiled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAsset {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Compiled output kept in memory, keyed by URL path (`/static/js/main.js`).
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    files: HashMap<String, CompiledAsset>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, content: Vec<u8>, content_type: String) {
        self.files.insert(
            path,
            CompiledAsset {
                content,
                content_type,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&CompiledAsset> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Compiled assets shared between the compiler (writer) and the pipeline (readers).
pub type SharedAssets = Arc<RwLock<BundleCache>>;

/// Messages on the live-reload stream, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    BuildStarted,
    BuildCompleted { duration_ms: u64 },
    BuildFailed { error: String },
    /// A file under the content base changed
    ContentChanged { path: String },
    ClientConnected { id: usize },
}

/// Live-reload subscribers, each fed through its own bounded channel.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    senders: RwLock<HashMap<usize, mpsc::Sender<String>>>,
    next_id: AtomicUsize,
}

impl ClientRegistry {
    pub fn subscribe(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.senders.write().insert(id, tx);
        (id, rx)
    }

    pub fn remove(&self, id: usize) {
        self.senders.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.senders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.read().is_empty()
    }

    /// Deliver `message` to everyone; returns the ids whose receiver is gone.
    async fn deliver(&self, message: &str) -> Vec<usize> {
        // never hold the lock across an await
        let senders: Vec<(usize, mpsc::Sender<String>)> = self
            .senders
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut gone = Vec::new();
        for (id, tx) in senders {
            if tx.send(message.to_string()).await.is_err() {
                gone.push(id);
            }
        }
        gone
    }
}

/// State of one running session.
#[derive(Debug)]
pub struct DevServerState {
    status: RwLock<BuildStatus>,
    /// Compiled assets, shared with the compiler
    pub assets: SharedAssets,
    clients: ClientRegistry,
}

impl DevServerState {
    /// State reading compiled output from `assets`.
    pub fn new(assets: SharedAssets) -> Self {
        Self {
            status: RwLock::new(BuildStatus::Pending),
            assets,
            clients: ClientRegistry::default(),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::Compiling;
    }

    pub fn complete_build(&self, duration_ms: u64) {
        *self.status.write() = BuildStatus::Compiled { duration_ms };
    }

    pub fn fail_build(&self, error: String) {
        *self.status.write() = BuildStatus::Failed { error };
    }

    pub fn get_status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn get_compiled(&self, path: &str) -> Option<CompiledAsset> {
        self.assets.read().get(path).cloned()
    }

    pub fn has_compiled(&self, path: &str) -> bool {
        self.assets.read().contains(path)
    }

    /// Add a live-reload subscriber.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        self.clients.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Send `event` to every subscriber, dropping the ones that left.
    pub async fn broadcast(&self, event: &DevEvent) {
        let message = match serde_json::to_string(event) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize dev event");
                return;
            }
        };

        for id in self.clients.deliver(&message).await {
            tracing::debug!(client = id, "Live reload client left");
            self.clients.remove(id);
        }
    }
}

impl Default for DevServerState {
    fn default() -> Self {
        Self::new(SharedAssets::default())
    }
}

pub type SharedState = Arc<DevServerState>;

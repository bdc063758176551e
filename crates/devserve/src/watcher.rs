//! Debounced directory watching.
//!
//! Used for the bundler's output directory (reload compiled assets) and the
//! content base (tell browsers to reload).

use crate::error::{DevServerError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What happened to a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over one directory.
///
/// Events for the same path inside the debounce window are dropped. Dropping
/// the watcher stops it and closes the receiver.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`.
    ///
    /// Paths containing a component listed in `ignore` (or any hidden
    /// component) are filtered out.
    pub fn new(
        root: PathBuf,
        ignore: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.is_dir() {
            return Err(DevServerError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(256);
        let debounce = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let filter_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "File watcher error");
                    return;
                }
            };

            for path in &event.paths {
                if Self::is_ignored(path, &filter_root, &ignore) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, at)) = &last_event {
                    if last_path == path && now.duration_since(*at) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // receiver gone means the session is shutting down
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "Watching directory");

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    fn is_ignored(path: &Path, root: &Path, ignore: &[String]) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return true;
        };

        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            name.starts_with('.') || ignore.iter().any(|pattern| *pattern == name)
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Wait for the first change, then swallow the burst that follows it.
///
/// Returns `None` once the watcher is gone.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<FileChange>,
    settle: Duration,
) -> Option<Vec<FileChange>> {
    let first = rx.recv().await?;
    Some(settle_burst(first, rx, settle).await)
}

/// Collect the changes following `first` until `settle` passes without one.
pub async fn settle_burst(
    first: FileChange,
    rx: &mut mpsc::Receiver<FileChange>,
    settle: Duration,
) -> Vec<FileChange> {
    let mut batch = vec![first];

    loop {
        match tokio::time::timeout(settle, rx.recv()).await {
            Ok(Some(change)) => batch.push(change),
            Ok(None) | Err(_) => break,
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ignores_listed_directories() {
        let root = PathBuf::from("/project/build");
        let ignore = vec!["node_modules".to_string()];

        assert!(FileWatcher::is_ignored(
            Path::new("/project/build/node_modules/a.js"),
            &root,
            &ignore
        ));
        assert!(!FileWatcher::is_ignored(
            Path::new("/project/build/static/js/main.js"),
            &root,
            &ignore
        ));
    }

    #[test]
    fn test_ignores_hidden_and_outside_paths() {
        let root = PathBuf::from("/project/public");

        assert!(FileWatcher::is_ignored(
            Path::new("/project/public/.DS_Store"),
            &root,
            &[]
        ));
        assert!(FileWatcher::is_ignored(
            Path::new("/elsewhere/index.html"),
            &root,
            &[]
        ));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        let err = FileWatcher::new(missing, vec![], 50).err().unwrap();
        assert!(matches!(err, DevServerError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_next_batch_collects_burst() {
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(FileChange::Created("a".into())).await.unwrap();
        tx.send(FileChange::Modified("b".into())).await.unwrap();
        drop(tx);

        let batch = next_batch(&mut rx, Duration::from_millis(20)).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_none());
    }
}

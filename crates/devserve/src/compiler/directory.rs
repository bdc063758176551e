//! A compiler backed by a bundler running in watch mode.
//!
//! The bundler writes into the build directory; this side loads that
//! directory into memory and reloads it whenever it changes.

use super::{BundlerCompiler, CompileEvent, CompileStats};
use crate::error::{DevServerError, Result};
use crate::server::{BundleCache, SharedAssets};
use crate::watcher::{self, FileChange, FileWatcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use walkdir::WalkDir;

/// Files larger than this are not served from memory.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Quiet period after a change before reloading.
const SETTLE: Duration = Duration::from_millis(100);

/// How often a missing or watched build directory is checked for existence.
const POLL: Duration = Duration::from_millis(250);

/// Serves whatever the bundler last wrote to `build_dir`.
pub struct DirectoryCompiler {
    build_dir: PathBuf,
    assets: SharedAssets,
    events: broadcast::Sender<CompileEvent>,
    reloader: Mutex<Option<JoinHandle<()>>>,
}

impl DirectoryCompiler {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            build_dir: build_dir.into(),
            assets: SharedAssets::default(),
            events,
            reloader: Mutex::new(None),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Load the build directory and publish the result.
    async fn compile(
        build_dir: PathBuf,
        assets: SharedAssets,
        events: broadcast::Sender<CompileEvent>,
    ) {
        // no subscribers is fine
        let _ = events.send(CompileEvent::Started);
        let started = Instant::now();

        let loaded = tokio::task::spawn_blocking(move || load_build_dir(&build_dir)).await;

        let event = match loaded {
            Ok(Ok((cache, warnings))) => {
                let stats = CompileStats {
                    duration_ms: started.elapsed().as_millis() as u64,
                    asset_count: cache.len(),
                    warnings,
                };
                *assets.write() = cache;
                CompileEvent::Done(stats)
            }
            Ok(Err(e)) => CompileEvent::Failed(vec![e.to_string()]),
            Err(e) => CompileEvent::Failed(vec![format!("Compiler task failed: {}", e)]),
        };

        let _ = events.send(event);
    }

    /// Keep the cache in sync with `build_dir` until aborted.
    ///
    /// The directory may not exist yet, and bundlers that clean their output
    /// delete it between builds; both cases fall back to polling until it
    /// shows up, then re-arm the watcher and reload.
    async fn reload_loop(
        build_dir: PathBuf,
        assets: SharedAssets,
        events: broadcast::Sender<CompileEvent>,
    ) {
        let mut stale = false;
        let mut watch_failed = false;
        let mut poll = tokio::time::interval(POLL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !build_dir.is_dir() {
                while !build_dir.is_dir() {
                    poll.tick().await;
                }
                tracing::debug!(dir = %build_dir.display(), "Build directory appeared");
                // give the bundler a moment to finish writing
                tokio::time::sleep(SETTLE).await;
                stale = true;
            }

            let (watcher, mut changes) = match FileWatcher::new(build_dir.clone(), vec![], 50) {
                Ok(pair) => pair,
                Err(e) => {
                    if !watch_failed {
                        tracing::warn!(
                            dir = %build_dir.display(),
                            error = %e,
                            "Build directory not watched"
                        );
                    }
                    watch_failed = true;
                    poll.tick().await;
                    continue;
                }
            };

            watch_failed = false;

            // the watcher is armed first so nothing written meanwhile is missed
            if stale {
                Self::compile(build_dir.clone(), assets.clone(), events.clone()).await;
            }

            loop {
                tokio::select! {
                    change = changes.recv() => {
                        let Some(first) = change else { break };
                        let batch = watcher::settle_burst(first, &mut changes, SETTLE).await;
                        tracing::debug!(changes = batch.len(), "Build output changed");
                        Self::compile(build_dir.clone(), assets.clone(), events.clone()).await;

                        let root_removed = batch.iter().any(|change| {
                            matches!(change, FileChange::Removed(path) if *path == build_dir)
                        });
                        if root_removed || !build_dir.is_dir() {
                            break;
                        }
                    }
                    _ = poll.tick() => {
                        if !build_dir.is_dir() {
                            tracing::debug!(dir = %build_dir.display(), "Build directory removed");
                            Self::compile(build_dir.clone(), assets.clone(), events.clone()).await;
                            break;
                        }
                    }
                }
            }

            drop(watcher);
            stale = true;
        }
    }
}

#[async_trait]
impl BundlerCompiler for DirectoryCompiler {
    fn subscribe(&self) -> broadcast::Receiver<CompileEvent> {
        self.events.subscribe()
    }

    async fn start(&self) -> Result<()> {
        Self::compile(self.build_dir.clone(), self.assets.clone(), self.events.clone()).await;

        let task = tokio::spawn(Self::reload_loop(
            self.build_dir.clone(),
            self.assets.clone(),
            self.events.clone(),
        ));

        if let Some(previous) = self.reloader.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop(&self) {
        if let Some(task) = self.reloader.lock().take() {
            task.abort();
        }
    }

    fn assets(&self) -> SharedAssets {
        self.assets.clone()
    }
}

/// Read every file under `root` into a cache keyed by URL path.
///
/// Oversized files are skipped and reported as warnings.
fn load_build_dir(root: &Path) -> Result<(BundleCache, Vec<String>)> {
    if !root.is_dir() {
        return Err(DevServerError::Compile(format!(
            "Build directory {} does not exist. Is the bundler running in watch mode?",
            root.display()
        )));
    }

    let mut cache = BundleCache::new();
    let mut warnings = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| DevServerError::Compile(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };

        let size = entry
            .metadata()
            .map_err(|e| DevServerError::Compile(e.to_string()))?
            .len();
        if size > MAX_FILE_SIZE {
            warnings.push(format!(
                "Skipping large file {}: {} bytes",
                relative.display(),
                size
            ));
            continue;
        }

        let url_path = format!(
            "/{}",
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        );
        let content = std::fs::read(path)?;
        cache.insert(url_path.clone(), content, content_type_for(&url_path).to_string());
    }

    Ok((cache, warnings))
}

/// MIME type from a path's extension.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" | "cjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("/static/js/main.js"), "application/javascript");
        assert_eq!(content_type_for("/main.js.map"), "application/json");
        assert_eq!(content_type_for("/index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("/file.xyz"), "application/octet-stream");
    }

    #[test]
    fn test_load_build_dir_uses_url_paths() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("static/js")).unwrap();
        fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("static/js/main.js"), "console.log(1)").unwrap();

        let (cache, warnings) = load_build_dir(temp.path()).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("/index.html"));
        assert_eq!(
            cache.get("/static/js/main.js").unwrap().content_type,
            "application/javascript"
        );
    }

    #[tokio::test]
    async fn test_missing_build_dir_reports_failure() {
        let temp = TempDir::new().unwrap();
        let compiler = DirectoryCompiler::new(temp.path().join("build"));
        let mut events = compiler.subscribe();

        compiler.start().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), CompileEvent::Started);
        match events.recv().await.unwrap() {
            CompileEvent::Failed(errors) => assert!(errors[0].contains("does not exist")),
            other => panic!("expected failure, got {:?}", other),
        }
        compiler.stop().await;
    }

    /// Waits until a successful compile has loaded `path`.
    async fn wait_for_asset(
        compiler: &DirectoryCompiler,
        events: &mut broadcast::Receiver<CompileEvent>,
        path: &str,
    ) -> bool {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(CompileEvent::Done(_)) if compiler.assets().read().contains(path) => {
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => panic!("compile events closed: {}", e),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), wait).await.is_ok()
    }

    #[tokio::test]
    async fn test_build_dir_created_after_start_is_loaded() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("build");
        let compiler = DirectoryCompiler::new(build_dir.clone());
        let mut events = compiler.subscribe();

        compiler.start().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), CompileEvent::Started);
        assert!(matches!(events.recv().await.unwrap(), CompileEvent::Failed(_)));

        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("index.html"), "<html></html>").unwrap();

        assert!(wait_for_asset(&compiler, &mut events, "/index.html").await);
        compiler.stop().await;
    }

    #[tokio::test]
    async fn test_build_dir_recreated_is_watched_again() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("build");
        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("main.js"), "export {}").unwrap();

        let compiler = DirectoryCompiler::new(build_dir.clone());
        let mut events = compiler.subscribe();
        compiler.start().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), CompileEvent::Started);
        assert!(matches!(events.recv().await.unwrap(), CompileEvent::Done(_)));

        fs::remove_dir_all(&build_dir).unwrap();
        let failed = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(CompileEvent::Failed(_)) = events.recv().await {
                    return;
                }
            }
        })
        .await;
        assert!(failed.is_ok(), "removing the build directory should be reported");

        fs::create_dir_all(&build_dir).unwrap();
        fs::write(build_dir.join("index.html"), "<html></html>").unwrap();

        assert!(wait_for_asset(&compiler, &mut events, "/index.html").await);
        fs::write(build_dir.join("app.css"), "body {}").unwrap();
        assert!(wait_for_asset(&compiler, &mut events, "/app.css").await);

        compiler.stop().await;
    }

    #[tokio::test]
    async fn test_start_publishes_assets() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.js"), "export {}").unwrap();

        let compiler = DirectoryCompiler::new(temp.path());
        let mut events = compiler.subscribe();
        compiler.start().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), CompileEvent::Started);
        match events.recv().await.unwrap() {
            CompileEvent::Done(stats) => assert_eq!(stats.asset_count, 1),
            other => panic!("expected success, got {:?}", other),
        }
        assert!(compiler.assets().read().contains("/main.js"));

        compiler.stop().await;
        compiler.stop().await;
    }
}

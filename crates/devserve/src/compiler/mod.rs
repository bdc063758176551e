//! Compiler integration.
//!
//! The dev server does not bundle anything itself. A [`BundlerCompiler`]
//! produces assets into a shared [`BundleCache`](crate::server::BundleCache)
//! and announces progress as [`CompileEvent`]s; the [`CompilerAdapter`] turns
//! those events into terminal status lines.

mod adapter;
mod directory;

pub use adapter::CompilerAdapter;
pub use directory::DirectoryCompiler;

use crate::error::Result;
use crate::server::SharedAssets;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Summary of a finished compilation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileStats {
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub asset_count: usize,
}

/// Progress reported by a compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileEvent {
    /// A (re)compilation began
    Started,
    /// A compilation finished; warnings do not make it a failure
    Done(CompileStats),
    /// A compilation failed; the server keeps running
    Failed(Vec<String>),
}

/// A bundler the dev server drives.
///
/// Subscribers should be attached before [`start`](Self::start) so they see
/// the initial compilation.
#[async_trait]
pub trait BundlerCompiler: Send + Sync {
    /// Receive compile events from now on.
    fn subscribe(&self) -> broadcast::Receiver<CompileEvent>;

    /// Run the initial compilation and begin watching for changes.
    async fn start(&self) -> Result<()>;

    /// Stop watching. Idempotent.
    async fn stop(&self);

    /// Where compiled output is published.
    fn assets(&self) -> SharedAssets;
}

//! Configuration for a dev server session.
//!
//! Settings are merged from several sources (later wins):
//! defaults → `devserve.config.json` → `PORT`/`HOST`/`HTTPS` → `DEVSERVE_*`.
//! They are then combined with the project manifest (`package.json`) into a
//! single immutable [`ServerConfiguration`] that every component reads.

mod defaults;
mod loading;
mod manifest;
mod validation;

use crate::features::FeatureFlags;
use crate::proxy::ProxyDeclaration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub use defaults::*;
pub use manifest::Manifest;

/// Config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "devserve.config.json";

/// Manifest file looked up in the project root.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// URL scheme the server is announced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where static files are served from.
///
/// In JSON: a path string, `true` for the default directory, or `false` to
/// disable static serving entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ContentBaseRepr", into = "ContentBaseRepr")]
pub enum ContentBase {
    Dir(PathBuf),
    Disabled,
}

impl ContentBase {
    pub fn dir(&self) -> Option<&Path> {
        match self {
            ContentBase::Dir(dir) => Some(dir),
            ContentBase::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ContentBase::Dir(_))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContentBaseRepr {
    Flag(bool),
    Dir(PathBuf),
}

impl From<ContentBaseRepr> for ContentBase {
    fn from(repr: ContentBaseRepr) -> Self {
        match repr {
            ContentBaseRepr::Flag(true) => ContentBase::Dir(default_content_base()),
            ContentBaseRepr::Flag(false) => ContentBase::Disabled,
            ContentBaseRepr::Dir(dir) => ContentBase::Dir(dir),
        }
    }
}

impl From<ContentBase> for ContentBaseRepr {
    fn from(base: ContentBase) -> Self {
        match base {
            ContentBase::Dir(dir) => ContentBaseRepr::Dir(dir),
            ContentBase::Disabled => ContentBaseRepr::Flag(false),
        }
    }
}

/// Layered settings as read from file and environment.
///
/// Field names are camelCase; `DEVSERVE_*` variables are mapped onto them
/// (`DEVSERVE_SERVER_SIDE_RENDER` sets `serverSideRender`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerSettings {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Preferred port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve over https
    #[serde(default)]
    pub https: bool,

    /// Gzip responses
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Static file directory, or `false`
    #[serde(default = "default_content_base_setting")]
    pub content_base: ContentBase,

    /// Live-reload when the content base changes
    #[serde(default = "default_true")]
    pub watch_content_base: bool,

    /// Rewrite navigations to `/index.html`
    #[serde(default = "default_true")]
    pub history_api_fallback: bool,

    /// Interpose the server-side render hook
    #[serde(default)]
    pub server_side_render: bool,

    /// Extra response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Directory the bundler writes compiled assets to
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Files that must exist before the server starts
    #[serde(default = "default_required_files")]
    pub required_files: Vec<PathBuf>,

    /// Open a browser tab once listening
    #[serde(default = "default_true")]
    pub open: bool,
}

/// The immutable configuration of one dev server session.
#[derive(Debug, Clone)]
pub struct ServerConfiguration {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub compress: bool,
    /// Absolute when enabled
    pub content_base: ContentBase,
    pub watch_content_base: bool,
    pub history_api_fallback: bool,
    pub server_side_render: bool,
    pub headers: BTreeMap<String, String>,
    pub proxy: Option<ProxyDeclaration>,
    pub app_name: String,
    /// Declared browser targets, checked by the compatibility preflight
    pub browserslist: Option<serde_json::Value>,
    pub build_dir: PathBuf,
    pub required_files: Vec<PathBuf>,
    pub open: bool,
    /// Project root every relative path was resolved against
    pub root: PathBuf,
}

impl ServerConfiguration {
    /// Combine layered settings with the manifest, resolving paths against `root`.
    pub fn from_parts(settings: DevServerSettings, manifest: Manifest, root: &Path) -> Self {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        };

        let content_base = match &settings.content_base {
            ContentBase::Dir(dir) => ContentBase::Dir(resolve(dir)),
            ContentBase::Disabled => ContentBase::Disabled,
        };

        Self {
            host: settings.host,
            port: settings.port,
            protocol: if settings.https {
                Protocol::Https
            } else {
                Protocol::Http
            },
            compress: settings.compress,
            content_base,
            watch_content_base: settings.watch_content_base,
            history_api_fallback: settings.history_api_fallback,
            server_side_render: settings.server_side_render,
            headers: settings.headers,
            proxy: manifest.proxy,
            app_name: manifest.name,
            browserslist: manifest.browserslist,
            build_dir: resolve(&settings.build_dir),
            required_files: settings.required_files.iter().map(|p| resolve(p)).collect(),
            open: settings.open,
            root: root.to_path_buf(),
        }
    }

    /// Planner-facing projection of this configuration.
    ///
    /// Hook presence is not configuration data, so the caller supplies it. The
    /// server-side render hook counts as an `after` hook.
    pub fn feature_flags(&self, has_before_hooks: bool, has_after_hooks: bool) -> FeatureFlags {
        FeatureFlags {
            compress: self.compress,
            content_base: self.content_base.is_enabled(),
            watch_content_base: self.watch_content_base && self.content_base.is_enabled(),
            history_api_fallback: self.history_api_fallback,
            server_side_render: self.server_side_render,
            proxy: self.proxy.is_some(),
            before: has_before_hooks,
            after: has_after_hooks || self.server_side_render,
        }
    }

    /// Root used to decide whether a request would be satisfied by a static file.
    pub fn static_asset_root(&self) -> PathBuf {
        self.content_base
            .dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.join(default_content_base()))
    }
}

use crate::error::{ConfigError, Result};
use crate::proxy::ProxyDeclaration;
use serde::Deserialize;
use std::path::Path;

/// The parts of `package.json` the dev server reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Application display name
    pub name: String,

    /// Backend to forward unmatched API calls to
    #[serde(default)]
    pub proxy: Option<ProxyDeclaration>,

    /// Targeted browsers (array of queries or per-environment object)
    #[serde(default)]
    pub browserslist: Option<serde_json::Value>,
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content).map_err(ConfigError::InvalidJson)?;

        if manifest.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "name".to_string(),
                hint: "Give your app a name in package.json".to_string(),
            }
            .into());
        }

        Ok(manifest)
    }
}

//! Checks run before any socket is touched.
//!
//! A failing check aborts startup with exit code 1.

use crate::config::{ServerConfiguration, MANIFEST_FILE_NAME};
use crate::error::{DevServerError, Result};
use crate::ui;
use std::path::PathBuf;

/// Set to `true` to skip the compatibility checks.
pub const SKIP_PREFLIGHT_ENV: &str = "SKIP_PREFLIGHT_CHECK";

/// Ensure every path exists as a file.
///
/// The first missing file is reported on the terminal; all missing files are
/// carried by the returned error.
pub fn check_required_files(files: &[PathBuf]) -> Result<()> {
    let missing: Vec<PathBuf> = files.iter().filter(|f| !f.is_file()).cloned().collect();

    let Some(first) = missing.first() else {
        return Ok(());
    };

    let name = first
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| first.display().to_string());
    let dir = first
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    ui::error("Could not find a required file.");
    ui::field("Name:", &name);
    ui::field("Searched in:", &dir);

    Err(DevServerError::MissingRequiredFiles(missing))
}

/// A project-level check that must pass before the server starts.
pub trait CompatibilityCheck {
    fn name(&self) -> &str;

    fn check(&self, config: &ServerConfiguration) -> Result<()>;
}

/// The manifest must declare which browsers the app targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserslistCheck;

impl CompatibilityCheck for BrowserslistCheck {
    fn name(&self) -> &str {
        "browserslist"
    }

    fn check(&self, config: &ServerConfiguration) -> Result<()> {
        let declared = match &config.browserslist {
            Some(serde_json::Value::Array(queries)) => !queries.is_empty(),
            Some(serde_json::Value::Object(envs)) => !envs.is_empty(),
            Some(serde_json::Value::String(query)) => !query.trim().is_empty(),
            _ => false,
        };

        if declared {
            return Ok(());
        }

        let manifest = config.root.join(MANIFEST_FILE_NAME);
        Err(DevServerError::CompatibilityCheckFailed(format!(
            "devserve requires targeted browsers to be specified.\n\n\
             Add a \"browserslist\" key to {}, for example:\n\n  \
             \"browserslist\": [\">0.2%\", \"not dead\", \"not op_mini all\"]",
            manifest.display()
        )))
    }
}

/// Whether the user opted out of compatibility checks.
pub fn skip_requested() -> bool {
    std::env::var(SKIP_PREFLIGHT_ENV).is_ok_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Run every check in order, stopping at the first failure.
///
/// Does nothing when [`SKIP_PREFLIGHT_ENV`] is set.
pub fn run_checks(config: &ServerConfiguration, checks: &[&dyn CompatibilityCheck]) -> Result<()> {
    if skip_requested() {
        tracing::debug!("Skipping compatibility checks");
        return Ok(());
    }

    for check in checks {
        tracing::debug!(check = check.name(), "Running compatibility check");
        check.check(config)?;
    }
    Ok(())
}

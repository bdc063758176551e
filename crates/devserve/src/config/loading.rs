use crate::config::{
    DevServerSettings, Manifest, ServerConfiguration, CONFIG_FILE_NAME, MANIFEST_FILE_NAME,
};
use crate::error::{ConfigError, Result};
use crate::ui;
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use serde::Serialize;
use std::path::Path;

/// `PORT`, `HOST` and `HTTPS` read the forgiving way shells and npm scripts
/// set them. Unset or unusable values are left out so lower layers apply.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct ShellOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    https: Option<bool>,
}

impl ShellOverrides {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT").and_then(|raw| {
            let port = leading_port(&raw);
            if port.is_none() && !raw.trim().is_empty() {
                ui::warning(&format!(
                    "Ignoring PORT={}: not a usable port number",
                    raw.trim()
                ));
            }
            port
        });

        let host = lookup("HOST")
            .map(|raw| raw.trim().to_string())
            .filter(|host| !host.is_empty());

        // only the exact string "true" turns https on
        let https = lookup("HTTPS").map(|raw| {
            let value = raw.trim();
            if value != "true" && value != "false" {
                ui::warning(&format!(
                    "HTTPS={} is not \"true\", serving over http",
                    value
                ));
            }
            value == "true"
        });

        Self { port, host, https }
    }
}

/// Leading decimal digits of `raw` as a port, so `3000` and `3000/tcp` both
/// give 3000. Zero and out-of-range numbers give `None`.
fn leading_port(raw: &str) -> Option<u16> {
    let trimmed = raw.trim();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse::<u16>().ok().filter(|port| *port != 0)
}

impl DevServerSettings {
    /// Load settings from multiple sources.
    /// Priority: `DEVSERVE_*` > `PORT`/`HOST`/`HTTPS` > config file > defaults
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default_settings()));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => {
                let default_path = root.join(CONFIG_FILE_NAME);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "Loading dev server config file");
            figment = figment.merge(Json::file(path));
        }

        figment = figment
            .merge(Serialized::defaults(ShellOverrides::from_env()))
            .merge(
                Env::prefixed("DEVSERVE_")
                    .map(|key| env_key_to_field(key.as_str()).into())
                    .lowercase(false),
            );

        let settings: Self = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            value: e.to_string(),
            hint: format!("Check {} and PORT/HOST/HTTPS for syntax and types", CONFIG_FILE_NAME),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Default settings values.
    pub fn default_settings() -> Self {
        use crate::config::defaults::*;

        Self {
            host: default_host(),
            port: default_port(),
            https: false,
            compress: true,
            content_base: default_content_base_setting(),
            watch_content_base: true,
            history_api_fallback: true,
            server_side_render: false,
            headers: Default::default(),
            build_dir: default_build_dir(),
            required_files: default_required_files(),
            open: true,
        }
    }
}

/// `SERVER_SIDE_RENDER` -> `serverSideRender`
fn env_key_to_field(key: &str) -> String {
    let mut field = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = !field.is_empty();
        } else if upper_next {
            field.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            field.push(ch.to_ascii_lowercase());
        }
    }
    field
}

impl ServerConfiguration {
    /// Build the session configuration for the project at `root`.
    ///
    /// Reads settings (file + environment) and `package.json`. Called once at
    /// process entry; the result is shared read-only from then on.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let settings = DevServerSettings::load(root, config_path)?;
        let manifest = Manifest::load(&root.join(MANIFEST_FILE_NAME))?;
        Ok(Self::from_parts(settings, manifest, root))
    }
}

use crate::config::DevServerSettings;
use crate::error::{ConfigError, Result};
use axum::http::{HeaderName, HeaderValue};

impl DevServerSettings {
    /// Validate settings for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: "0".to_string(),
                hint: "Port must be between 1 and 65535".to_string(),
            }
            .into());
        }

        if self.host.contains("://") || self.host.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "host".to_string(),
                value: self.host.clone(),
                hint: "Host must be a bare hostname or IP address, without scheme or path"
                    .to_string(),
            }
            .into());
        }

        for (name, value) in &self.headers {
            if HeaderName::try_from(name.as_str()).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "headers".to_string(),
                    value: name.clone(),
                    hint: "Header names may only contain token characters".to_string(),
                }
                .into());
            }
            if HeaderValue::try_from(value.as_str()).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: format!("headers.{}", name),
                    value: value.clone(),
                    hint: "Header values must be visible ASCII".to_string(),
                }
                .into());
            }
        }

        if self.required_files.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "requiredFiles".to_string(),
                value: "\"\"".to_string(),
                hint: "Required file paths cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

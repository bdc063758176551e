use std::path::PathBuf;

use crate::config::ContentBase;

pub const DEFAULT_PORT: u16 = 3000;

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    DEFAULT_PORT
}

pub fn default_true() -> bool {
    true
}

pub fn default_content_base() -> PathBuf {
    PathBuf::from("public")
}

pub fn default_content_base_setting() -> ContentBase {
    ContentBase::Dir(default_content_base())
}

pub fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

pub fn default_required_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("public/index.html"),
        PathBuf::from("src/index.js"),
    ]
}

//! Command implementations.
//!
//! - [`start`] - run a dev server session
//! - [`plan`] - print the middleware feature plan
//!
//! Each command provides an `execute` function taking its parsed arguments.

pub mod plan;
pub mod start;

use crate::cli::ProjectArgs;
use crate::config::ServerConfiguration;
use crate::error::{Result, ResultExt};
use std::path::PathBuf;

pub use plan::execute as plan_execute;
pub use start::execute as start_execute;

/// Absolute project root from `--cwd`, defaulting to the current directory.
pub(crate) fn project_root(args: &ProjectArgs) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let root = match &args.cwd {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    };

    root.canonicalize()
        .with_path(&root)
        .with_hint("--cwd must point to an existing project directory")
}

pub(crate) fn load_configuration(args: &ProjectArgs) -> Result<ServerConfiguration> {
    let root = project_root(args)?;
    ServerConfiguration::load(&root, args.config.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_root_from_cwd_flag() {
        let temp = TempDir::new().unwrap();
        let args = ProjectArgs {
            cwd: Some(temp.path().to_path_buf()),
            config: None,
        };
        assert_eq!(
            project_root(&args).unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_root_must_exist() {
        let temp = TempDir::new().unwrap();
        let args = ProjectArgs {
            cwd: Some(temp.path().join("missing")),
            config: None,
        };
        assert!(project_root(&args).is_err());
    }
}

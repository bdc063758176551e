//! Command-line interface definition.
//!
//! - `devserve start` - run the development server (the default workflow)
//! - `devserve plan` - print the middleware feature plan for the project

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// devserve - development server for single-page apps
#[derive(Parser, Debug)]
#[command(
    name = "devserve",
    version,
    about = "Development server for single-page apps",
    long_about = "devserve serves your app's freshly compiled assets, forwards API calls\n\
                  to a backend declared in package.json, and reloads the browser when\n\
                  the build or the static content changes."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Resolves a free port, compiles the app and serves it until Ctrl+C.
    Start(StartArgs),

    /// Print the middleware feature plan
    ///
    /// Shows which request pipeline stages would run, in order, for the
    /// current configuration.
    Plan(ProjectArgs),
}

/// Where the project lives and which config file to read.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Path to a config file, relative to the project root
    ///
    /// Defaults to devserve.config.json when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Don't open a browser once the server is listening
    #[arg(long)]
    pub no_open: bool,
}

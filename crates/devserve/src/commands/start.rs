//! `devserve start`.
//!
//! Orchestrates a session:
//! 1. Load the configuration
//! 2. Preflight: required files, then compatibility checks
//! 3. Wire the production collaborators
//! 4. Run the lifecycle until SIGINT/SIGTERM

use crate::browser::SystemBrowser;
use crate::cli::StartArgs;
use crate::commands::load_configuration;
use crate::compiler::DirectoryCompiler;
use crate::error::Result;
use crate::port::TerminalPrompt;
use crate::preflight::{self, BrowserslistCheck};
use crate::server::{shutdown_signal, Collaborators, DevServer, Hooks, Outcome};
use crate::ui;
use crate::urls::UdpLanLookup;

/// Execute the start command.
///
/// # Errors
///
/// Any failure before or during startup: invalid configuration, missing
/// required files, failed compatibility checks, bad proxy declarations and
/// bind failures. A busy port the user doesn't want to replace is not an
/// error; it yields [`Outcome::NoPortAvailable`].
pub async fn execute(args: StartArgs) -> Result<Outcome> {
    let mut config = load_configuration(&args.project)?;
    if args.no_open {
        config.open = false;
    }
    tracing::debug!(root = %config.root.display(), port = config.port, "Loaded configuration");

    preflight::check_required_files(&config.required_files)?;
    preflight::run_checks(&config, &[&BrowserslistCheck])?;

    if let Some(host) = explicit_host() {
        announce_host(&host);
    }

    let interactive = ui::is_interactive();
    let collaborators = Collaborators {
        compiler: Box::new(DirectoryCompiler::new(config.build_dir.clone())),
        prompt: Box::new(TerminalPrompt::new()),
        lan: Box::new(UdpLanLookup),
        browser: Box::new(SystemBrowser::from_env()),
        hooks: Hooks::default(),
        status_sink: Box::new(std::io::stdout()),
        interactive,
    };

    DevServer::new(config, collaborators)
        .run(shutdown_signal())
        .await
}

fn explicit_host() -> Option<String> {
    std::env::var("HOST")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

fn announce_host(host: &str) {
    ui::info(&format!(
        "Attempting to bind to HOST environment variable: {}",
        ui::emphasis(host)
    ));
    ui::info("If this was unintentional, check that you haven't mistakenly set it in your shell.");
    eprintln!();
}

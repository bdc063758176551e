//! Diagnostic logging through `tracing`.
//!
//! Only diagnostics go through here. The status lines a user reads while the
//! server runs (compile results, URLs) are written by [`crate::ui`] and the
//! compiler adapter, so `--quiet` leaves them alone.
//!
//! ```rust,no_run
//! use devserve::logger::{init_logger, Verbosity};
//!
//! init_logger(Verbosity::from_flags(false, false), false);
//! tracing::debug!(port = 3000, "Resolved port");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How chatty diagnostics are, from the global CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// `RUST_LOG` if set, otherwise info
    #[default]
    Normal,
    /// Debug for devserve and the HTTP layer
    Verbose,
}

impl Verbosity {
    /// `--verbose` wins if both flags are somehow set.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    fn directives(self) -> &'static str {
        match self {
            Verbosity::Quiet => "devserve=error",
            Verbosity::Normal => "devserve=info",
            Verbosity::Verbose => "devserve=debug,tower_http=debug",
        }
    }

    fn filter(self) -> EnvFilter {
        match self {
            Verbosity::Normal => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.directives())),
            _ => EnvFilter::new(self.directives()),
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logger(verbosity: Verbosity, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(verbosity.filter())
        .with(fmt_layer)
        .try_init();
}

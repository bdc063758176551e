//! Terminal output: color detection and the status-line printers used by the
//! commands.
//!
//! ```no_run
//! use devserve::ui;
//!
//! ui::init_colors(false);
//! ui::info("Starting the development server...");
//! ```

mod format;
mod messages;

pub use format::format_duration;
pub use messages::{emphasis, error, field, info, success, warning};

use console::Term;
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(false);

/// Whether the environment asks for colored output.
///
/// `NO_COLOR` beats `FORCE_COLOR`; without either, stderr has to be a terminal.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once, at startup, whether status lines get colored.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

/// Whether stdout is attached to an interactive terminal.
pub fn is_interactive() -> bool {
    Term::stdout().is_term()
}

pub fn clear_console() {
    let _ = Term::stdout().clear_screen();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_env(no_color: Option<&str>, force_color: Option<&str>, check: impl FnOnce()) {
        match no_color {
            Some(v) => std::env::set_var("NO_COLOR", v),
            None => std::env::remove_var("NO_COLOR"),
        }
        match force_color {
            Some(v) => std::env::set_var("FORCE_COLOR", v),
            None => std::env::remove_var("FORCE_COLOR"),
        }
        check();
        std::env::remove_var("NO_COLOR");
        std::env::remove_var("FORCE_COLOR");
    }

    #[test]
    #[serial]
    fn test_no_color_disables() {
        with_env(Some("1"), None, || assert!(!should_use_color()));
    }

    #[test]
    #[serial]
    fn test_force_color_enables() {
        with_env(None, Some("1"), || assert!(should_use_color()));
    }

    #[test]
    #[serial]
    fn test_no_color_beats_force_color() {
        with_env(Some("1"), Some("1"), || assert!(!should_use_color()));
    }

    #[test]
    #[serial]
    fn test_flag_overrides_forced_color() {
        with_env(None, Some("1"), || {
            init_colors(true);
            assert!(!colors_enabled());
            init_colors(false);
            assert!(colors_enabled());
            init_colors(true);
        });
    }
}

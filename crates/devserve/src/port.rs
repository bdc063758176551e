//! Port selection.
//!
//! The preferred port is probed by binding it and letting the listener drop
//! immediately. When it is taken, the next free port above it is offered once;
//! declining (or having no terminal to ask on) ends the session cleanly.

use crate::error::{ConfigError, Result};
use crate::ui;
use console::Term;
use std::io::{self, ErrorKind};
use std::net::TcpListener;

/// How many ports above the preferred one are probed for an alternative.
const ALTERNATIVE_SEARCH_SPAN: u16 = 50;

/// Yes/no questions asked during startup.
pub trait Prompt {
    /// Whether a human can answer.
    fn is_interactive(&self) -> bool;

    /// Ask `question`; an empty answer picks `default`.
    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool>;
}

/// Prompts on the controlling terminal.
#[derive(Debug)]
pub struct TerminalPrompt {
    term: Term,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        self.term.is_term() && console::user_attended()
    }

    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        self.term.write_str(&format!("? {} {} ", question, hint))?;
        let answer = self.term.read_line()?;

        Ok(match answer.trim().to_ascii_lowercase().as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }
}

fn bind_host(host: &str) -> &str {
    if host.is_empty() {
        "0.0.0.0"
    } else {
        host.trim_start_matches('[').trim_end_matches(']')
    }
}

/// Probe `host:port` by binding it.
///
/// `Ok(false)` means something else holds the port.
pub fn is_port_free(host: &str, port: u16) -> io::Result<bool> {
    match TcpListener::bind((bind_host(host), port)) {
        Ok(listener) => {
            drop(listener);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(false),
        Err(e) => Err(e),
    }
}

/// First free port in `(preferred, preferred + span]`.
fn find_alternative(host: &str, preferred: u16) -> Option<u16> {
    let last = preferred.saturating_add(ALTERNATIVE_SEARCH_SPAN);
    (preferred.saturating_add(1)..=last)
        .filter(|&port| port != preferred)
        .find(|&port| matches!(is_port_free(host, port), Ok(true)))
}

/// Settle on the port to listen on.
///
/// Returns `Ok(None)` when the preferred port is busy and no alternative was
/// accepted; the caller ends the session without an error.
pub fn choose_port(host: &str, preferred: u16, prompt: &mut dyn Prompt) -> Result<Option<u16>> {
    let free = is_port_free(host, preferred).map_err(|e| probe_error(host, preferred, e))?;
    if free {
        tracing::debug!(port = preferred, "Preferred port is free");
        return Ok(Some(preferred));
    }

    let busy = format!("Something is already running on port {}.", preferred);

    if !prompt.is_interactive() {
        ui::warning(&busy);
        return Ok(None);
    }

    let Some(alternative) = find_alternative(host, preferred) else {
        ui::warning(&busy);
        ui::error(&format!(
            "No free port found between {} and {}.",
            preferred.saturating_add(1),
            preferred.saturating_add(ALTERNATIVE_SEARCH_SPAN)
        ));
        return Ok(None);
    };

    let question = format!(
        "Something is already running on port {}. Would you like to run the app on another port instead?",
        preferred
    );

    if prompt.confirm(&question, true)? {
        tracing::info!(from = preferred, to = alternative, "Using alternative port");
        Ok(Some(alternative))
    } else {
        Ok(None)
    }
}

fn probe_error(host: &str, port: u16, err: io::Error) -> crate::error::DevServerError {
    let hint = if err.kind() == ErrorKind::PermissionDenied && port < 1024 {
        "Admin permissions are required to run a server on a port below 1024.".to_string()
    } else {
        "Check the HOST and PORT settings".to_string()
    };

    ConfigError::InvalidValue {
        field: "host".to_string(),
        value: format!("{}:{} ({})", host, port, err),
        hint,
    }
    .into()
}

//! Opening the app in a browser.

use std::io;
use std::process::Command;

/// Launches a browser tab.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// The user's browser, honouring the `BROWSER` environment variable.
///
/// `BROWSER=none` disables opening; any other value names the program to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemBrowser {
    Default,
    Program(String),
    Disabled,
}

impl SystemBrowser {
    pub fn from_env() -> Self {
        Self::from_value(std::env::var("BROWSER").ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => SystemBrowser::Default,
            Some(v) if v.eq_ignore_ascii_case("none") => SystemBrowser::Disabled,
            Some(v) => SystemBrowser::Program(v.to_string()),
        }
    }
}

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let spawned = match self {
            SystemBrowser::Disabled => return Ok(()),
            SystemBrowser::Program(program) => Command::new(program).arg(url).spawn(),
            SystemBrowser::Default if cfg!(target_os = "macos") => {
                Command::new("open").arg(url).spawn()
            }
            SystemBrowser::Default if cfg!(target_os = "windows") => {
                Command::new("cmd").args(["/C", "start", url]).spawn()
            }
            SystemBrowser::Default => Command::new("xdg-open").arg(url).spawn(),
        };

        spawned.map(|_| ())
    }
}

/// Never opens anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl BrowserOpener for NoBrowser {
    fn open(&self, _url: &str) -> io::Result<()> {
        Ok(())
    }
}

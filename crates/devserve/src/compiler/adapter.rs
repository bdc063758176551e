//! Compile events → terminal status.

use super::{CompileEvent, CompileStats};
use crate::ui::format_duration;
use crate::urls::ResolvedEndpoints;
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[3J\x1B[H";

/// Reports compile progress for one session.
///
/// Failures are reported, never propagated: the server stays up so the next
/// successful compile can be served.
pub struct CompilerAdapter {
    app_name: String,
    endpoints: ResolvedEndpoints,
    out: Box<dyn Write + Send>,
    color: bool,
    clear_console: bool,
}

impl CompilerAdapter {
    pub fn new(
        app_name: impl Into<String>,
        endpoints: ResolvedEndpoints,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            endpoints,
            out,
            color: false,
            clear_console: false,
        }
    }

    /// Colorize the headline of each report.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Clear the terminal before each report.
    pub fn with_clear_console(mut self, clear: bool) -> Self {
        self.clear_console = clear;
        self
    }

    /// Write the status lines for one event.
    pub fn handle(&mut self, event: &CompileEvent) -> io::Result<()> {
        if self.clear_console {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }

        match event {
            CompileEvent::Started => writeln!(self.out, "Compiling...")?,
            CompileEvent::Done(stats) if stats.warnings.is_empty() => self.report_success(stats)?,
            CompileEvent::Done(stats) => self.report_warnings(stats)?,
            CompileEvent::Failed(errors) => self.report_failure(errors)?,
        }

        self.out.flush()
    }

    fn headline(&self, text: &str, paint: fn(&str) -> String) -> String {
        if self.color {
            paint(text)
        } else {
            text.to_string()
        }
    }

    fn report_success(&mut self, stats: &CompileStats) -> io::Result<()> {
        let headline = self.headline("Compiled successfully!", |t| t.green().to_string());
        writeln!(self.out, "{}", headline)?;
        tracing::debug!(
            duration = %format_duration(Duration::from_millis(stats.duration_ms)),
            assets = stats.asset_count,
            "Compilation finished"
        );

        writeln!(self.out)?;
        writeln!(
            self.out,
            "You can now view {} in the browser.",
            self.app_name
        )?;
        writeln!(self.out)?;

        match &self.endpoints.lan_url {
            Some(lan_url) => {
                writeln!(self.out, "  Local:            {}", self.endpoints.local_url)?;
                writeln!(self.out, "  On Your Network:  {}", lan_url)?;
            }
            None => writeln!(self.out, "  {}", self.endpoints.local_url)?,
        }

        writeln!(self.out)?;
        writeln!(self.out, "Note that the development build is not optimized.")?;
        writeln!(
            self.out,
            "To create a production build, run your bundler's build command."
        )?;
        writeln!(self.out)
    }

    fn report_warnings(&mut self, stats: &CompileStats) -> io::Result<()> {
        let headline = self.headline("Compiled with warnings.", |t| t.yellow().to_string());
        writeln!(self.out, "{}", headline)?;
        writeln!(self.out)?;
        for warning in &stats.warnings {
            writeln!(self.out, "{}", warning)?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn report_failure(&mut self, errors: &[String]) -> io::Result<()> {
        let headline = self.headline("Failed to compile.", |t| t.red().to_string());
        writeln!(self.out, "{}", headline)?;
        writeln!(self.out)?;
        // the first error is usually the cause; the rest are fallout
        if let Some(first) = errors.first() {
            writeln!(self.out, "{}", first)?;
        }
        Ok(())
    }

    /// Report every event until the compiler goes away.
    pub async fn run(mut self, mut events: broadcast::Receiver<CompileEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle(&event) {
                        tracing::warn!(error = %e, "Failed to write compile status");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Compile status lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn endpoints(lan: bool) -> ResolvedEndpoints {
        ResolvedEndpoints {
            port: 3000,
            local_url: "http://localhost:3000/".to_string(),
            lan_url: lan.then(|| "http://192.168.1.5:3000/".to_string()),
            lan_url_for_config: lan.then(|| "http://192.168.1.5:3000".to_string()),
            browser_url: "http://localhost:3000/".to_string(),
        }
    }

    fn adapter(lan: bool) -> (CompilerAdapter, Captured) {
        let captured = Captured::default();
        let adapter = CompilerAdapter::new("my-app", endpoints(lan), Box::new(captured.clone()));
        (adapter, captured)
    }

    #[test]
    fn test_started() {
        let (mut adapter, out) = adapter(false);
        adapter.handle(&CompileEvent::Started).unwrap();
        assert_eq!(out.text(), "Compiling...\n");
    }

    #[test]
    fn test_success_lists_urls() {
        let (mut adapter, out) = adapter(true);
        adapter
            .handle(&CompileEvent::Done(CompileStats::default()))
            .unwrap();

        let text = out.text();
        assert!(text.starts_with("Compiled successfully!"));
        assert!(text.contains("You can now view my-app in the browser."));
        assert!(text.contains("Local:            http://localhost:3000/"));
        assert!(text.contains("On Your Network:  http://192.168.1.5:3000/"));
        assert!(text.contains("production build"));
    }

    #[test]
    fn test_success_without_lan_url() {
        let (mut adapter, out) = adapter(false);
        adapter
            .handle(&CompileEvent::Done(CompileStats::default()))
            .unwrap();

        let text = out.text();
        assert!(text.contains("  http://localhost:3000/"));
        assert!(!text.contains("On Your Network"));
    }

    #[test]
    fn test_warnings() {
        let (mut adapter, out) = adapter(false);
        let stats = CompileStats {
            warnings: vec!["Unused variable 'x'".to_string()],
            ..CompileStats::default()
        };
        adapter.handle(&CompileEvent::Done(stats)).unwrap();

        let text = out.text();
        assert!(text.starts_with("Compiled with warnings."));
        assert!(text.contains("Unused variable 'x'"));
        assert!(!text.contains("Compiled successfully!"));
    }

    #[test]
    fn test_failure_shows_first_error_only() {
        let (mut adapter, out) = adapter(false);
        adapter
            .handle(&CompileEvent::Failed(vec![
                "Syntax error in App.js".to_string(),
                "Cascade".to_string(),
            ]))
            .unwrap();

        let text = out.text();
        assert!(text.starts_with("Failed to compile."));
        assert!(text.contains("Syntax error in App.js"));
        assert!(!text.contains("Cascade"));
    }

    #[test]
    fn test_clear_console() {
        let (adapter, out) = adapter(false);
        let mut adapter = adapter.with_clear_console(true);
        adapter.handle(&CompileEvent::Started).unwrap();
        assert!(out.text().starts_with(CLEAR_SCREEN));
    }

    #[tokio::test]
    async fn test_run_survives_failures_until_closed() {
        let (adapter, out) = adapter(false);
        let (tx, rx) = broadcast::channel(16);
        let task = tokio::spawn(adapter.run(rx));

        tx.send(CompileEvent::Failed(vec!["boom".to_string()]))
            .unwrap();
        tx.send(CompileEvent::Started).unwrap();
        tx.send(CompileEvent::Done(CompileStats::default())).unwrap();
        drop(tx);
        task.await.unwrap();

        let text = out.text();
        let failed = text.find("Failed to compile.").unwrap();
        let succeeded = text.find("Compiled successfully!").unwrap();
        assert!(failed < succeeded);
    }
}

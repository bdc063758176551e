//! SIGTERM ends a running session the same way Ctrl+C does.
//!
//! Lives in its own test binary because the signal goes to the whole process.

#![cfg(unix)]

use devserve::browser::NoBrowser;
use devserve::compiler::DirectoryCompiler;
use devserve::config::{ContentBase, DevServerSettings, Manifest, ServerConfiguration};
use devserve::port::Prompt;
use devserve::server::{shutdown_signal, Collaborators, DevServer, Hooks, Outcome, Phase};
use std::io;
use std::net::{IpAddr, TcpListener};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;
use tokio::signal::unix::{signal, SignalKind};

struct NoTerminal;

impl Prompt for NoTerminal {
    fn is_interactive(&self) -> bool {
        false
    }

    fn confirm(&mut self, _question: &str, _default: bool) -> io::Result<bool> {
        Ok(false)
    }
}

fn no_lan() -> Option<IpAddr> {
    None
}

fn send_sigterm() {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_sigterm_stops_the_session() {
    // keeps the default disposition (terminate the process) out of the way
    let _listener = signal(SignalKind::terminate()).unwrap();

    let temp = TempDir::new().unwrap();
    let build_dir = temp.path().join("build");
    std::fs::create_dir_all(&build_dir).unwrap();
    std::fs::write(build_dir.join("index.html"), "<html></html>").unwrap();

    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut settings = DevServerSettings::default_settings();
    settings.host = "127.0.0.1".to_string();
    settings.port = port;
    settings.content_base = ContentBase::Disabled;
    settings.build_dir = build_dir.clone();
    settings.open = false;
    let manifest = Manifest {
        name: "my-app".to_string(),
        proxy: None,
        browserslist: None,
    };
    let config = ServerConfiguration::from_parts(settings, manifest, temp.path());

    let collaborators = Collaborators {
        compiler: Box::new(DirectoryCompiler::new(build_dir)),
        prompt: Box::new(NoTerminal),
        lan: Box::new(no_lan),
        browser: Box::new(NoBrowser),
        hooks: Hooks::default(),
        status_sink: Box::new(io::sink()),
        interactive: false,
    };

    let server = DevServer::new(config, collaborators);
    let mut phase = server.subscribe_phase();
    let stopped = server.subscribe_phase();

    let kill = async move {
        phase
            .wait_for(|p| *p == Phase::Listening)
            .await
            .unwrap();
        // let the session start waiting on the signal
        tokio::time::sleep(Duration::from_millis(200)).await;
        send_sigterm();
    };

    let (outcome, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(server.run(shutdown_signal()), kill) },
    )
    .await
    .expect("session did not stop after SIGTERM");

    let outcome = outcome.unwrap();
    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(*stopped.borrow(), Phase::Stopped);
}

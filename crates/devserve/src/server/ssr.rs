//! Server-side render hook.
//!
//! Runs in the `after` slot, behind static files and the history fallback.
//! Navigations are answered from the compiled `index.html` with the outlet
//! comment replaced by markup for the requested route.

use super::error_overlay::html_escape;
use super::stages::{html_response, inject_reload_script, is_navigation, Hook, StageOutcome};
use super::SharedState;
use async_trait::async_trait;
use axum::{body::Body, http::Request};

/// Placeholder in `index.html` where rendered markup goes.
pub const SSR_OUTLET: &str = "<!--ssr-outlet-->";

const SHELL: &str = "/index.html";

#[derive(Debug, Clone, Default)]
pub struct SsrRenderer;

impl SsrRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Substitute the outlet in `shell` with markup for `route`.
    ///
    /// Returns `None` when the shell has no outlet.
    pub fn render(&self, shell: &str, route: &str) -> Option<String> {
        if !shell.contains(SSR_OUTLET) {
            return None;
        }

        let route = html_escape(route);
        let markup = format!(
            r#"<div data-ssr-route="{route}" data-ssr-rendered="true">{route}</div>"#,
            route = route
        );
        Some(shell.replacen(SSR_OUTLET, &markup, 1))
    }
}

#[async_trait]
impl Hook for SsrRenderer {
    async fn handle(&self, request: Request<Body>, state: &SharedState) -> StageOutcome {
        if !is_navigation(&request) {
            return StageOutcome::Next(request);
        }

        let Some(shell) = state.get_compiled(SHELL) else {
            return StageOutcome::Next(request);
        };

        let shell = String::from_utf8_lossy(&shell.content);
        match self.render(&shell, request.uri().path()) {
            Some(html) => {
                tracing::debug!(route = request.uri().path(), "Server-side rendered");
                StageOutcome::Respond(html_response(inject_reload_script(&html)))
            }
            None => StageOutcome::Next(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::DevServerState;
    use axum::http::header;
    use std::sync::Arc;

    fn navigation(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap()
    }

    fn state_with_shell(shell: &str) -> SharedState {
        let state = Arc::new(DevServerState::default());
        state.assets.write().insert(
            SHELL.to_string(),
            shell.as_bytes().to_vec(),
            "text/html; charset=utf-8".to_string(),
        );
        state
    }

    #[test]
    fn test_render_replaces_outlet() {
        let html = SsrRenderer::new()
            .render("<div id=\"root\"><!--ssr-outlet--></div>", "/about")
            .unwrap();
        assert!(html.contains("data-ssr-route=\"/about\""));
        assert!(!html.contains(SSR_OUTLET));
    }

    #[test]
    fn test_render_without_outlet() {
        assert!(SsrRenderer::new().render("<div id=\"root\"></div>", "/").is_none());
    }

    #[test]
    fn test_render_escapes_route() {
        let html = SsrRenderer::new()
            .render(SSR_OUTLET, "/<script>")
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_hook_renders_navigations() {
        let state = state_with_shell("<body><!--ssr-outlet--></body>");
        let outcome = SsrRenderer::new()
            .handle(navigation("/dashboard"), &state)
            .await;
        assert!(matches!(outcome, StageOutcome::Respond(_)));
    }

    #[tokio::test]
    async fn test_hook_passes_non_navigations() {
        let state = state_with_shell("<body><!--ssr-outlet--></body>");
        let request = Request::builder()
            .uri("/api/data")
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let outcome = SsrRenderer::new().handle(request, &state).await;
        assert!(matches!(outcome, StageOutcome::Next(_)));
    }

    #[tokio::test]
    async fn test_hook_passes_without_compiled_shell() {
        let state = Arc::new(DevServerState::default());
        let outcome = SsrRenderer::new().handle(navigation("/"), &state).await;
        assert!(matches!(outcome, StageOutcome::Next(_)));
    }
}

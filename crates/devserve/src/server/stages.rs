//! The individual request pipeline stages.
//!
//! Every stage takes the request and either answers it or hands it (possibly
//! rewritten) to the next stage in the plan.

use super::error_overlay::generate_error_overlay;
use super::pipeline::PipelineContext;
use super::{SharedState, RELOAD_SCRIPT_PATH};
use crate::proxy::RequestView;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;

/// What a stage did with a request.
pub enum StageOutcome {
    /// The stage answered; later stages don't run
    Respond(Response),
    /// Continue with this request
    Next(Request<Body>),
}

/// User code plugged into the `before`, `setup` or `after` slots.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn handle(&self, request: Request<Body>, state: &SharedState) -> StageOutcome;
}

/// Hooks per slot, run in insertion order.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before: Vec<Arc<dyn Hook>>,
    pub setup: Vec<Arc<dyn Hook>>,
    pub after: Vec<Arc<dyn Hook>>,
}

impl Hooks {
    /// Whether anything runs ahead of the built-in stages.
    pub fn has_before(&self) -> bool {
        !self.before.is_empty() || !self.setup.is_empty()
    }

    pub fn has_after(&self) -> bool {
        !self.after.is_empty()
    }
}

pub(crate) async fn run_hooks(
    hooks: &[Arc<dyn Hook>],
    mut request: Request<Body>,
    state: &SharedState,
) -> StageOutcome {
    for hook in hooks {
        match hook.handle(request, state).await {
            StageOutcome::Next(next) => request = next,
            respond => return respond,
        }
    }
    StageOutcome::Next(request)
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

pub(crate) fn accept_header(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
}

/// GET/HEAD asking for HTML.
pub fn is_navigation(request: &Request<Body>) -> bool {
    is_read(request.method()) && accept_header(request).is_some_and(|a| a.contains("text/html"))
}

/// `root` joined with the request path, refusing to leave `root`.
fn resolve_under(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(root.join(relative))
}

/// Add the live-reload client to an HTML page.
pub fn inject_reload_script(html: &str) -> String {
    let script_tag = format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH);

    match html.rfind("</body>") {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + script_tag.len() + 4);
            result.push_str(&html[..pos]);
            result.push_str("  ");
            result.push_str(&script_tag);
            result.push('\n');
            result.push_str(&html[pos..]);
            result
        }
        None => format!("{}\n{}", html, script_tag),
    }
}

pub(crate) fn html_response(html: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response()
}

fn asset_response(content: Vec<u8>, content_type: String) -> Response {
    let body = if content_type.starts_with("text/html") {
        inject_reload_script(&String::from_utf8_lossy(&content)).into_bytes()
    } else {
        content
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

/// `middleware`: compiled assets from memory, or the error overlay while the
/// last build is broken.
pub async fn compiled_assets(ctx: &PipelineContext, request: Request<Body>) -> StageOutcome {
    if !is_read(request.method()) {
        return StageOutcome::Next(request);
    }

    if let Some(error) = ctx.state.get_status().error() {
        if is_navigation(&request) {
            return StageOutcome::Respond(html_response(generate_error_overlay(error)));
        }
    }

    let path = request.uri().path();
    let lookup = if path.ends_with('/') {
        format!("{}index.html", path)
    } else {
        path.to_string()
    };

    match ctx.state.get_compiled(&lookup) {
        Some(asset) => StageOutcome::Respond(asset_response(asset.content, asset.content_type)),
        None => StageOutcome::Next(request),
    }
}

/// `proxy`: the first matching rule forwards the request.
pub async fn proxy(ctx: &PipelineContext, request: Request<Body>) -> StageOutcome {
    let rule = {
        let view = RequestView {
            method: request.method(),
            path: request.uri().path(),
            accept: accept_header(&request),
        };
        ctx.proxy.find(&view).cloned()
    };

    match rule {
        Some(rule) => StageOutcome::Respond(ctx.forwarder.forward(&rule, request).await),
        None => StageOutcome::Next(request),
    }
}

/// `contentBaseFiles`: files from the content base directory.
pub async fn static_files(ctx: &PipelineContext, request: Request<Body>) -> StageOutcome {
    let Some(root) = &ctx.content_base else {
        return StageOutcome::Next(request);
    };
    if !is_read(request.method()) {
        return StageOutcome::Next(request);
    }

    let servable = resolve_under(root, request.uri().path())
        .is_some_and(|p| p.is_file() || p.join("index.html").is_file());
    if !servable {
        return StageOutcome::Next(request);
    }

    match ServeDir::new(root).try_call(request).await {
        Ok(response) => StageOutcome::Respond(response.into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serve static file");
            StageOutcome::Respond(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// `historyApiFallback`: client-side routes get the app shell.
pub fn history_fallback(mut request: Request<Body>) -> StageOutcome {
    let path = request.uri().path();
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    if is_navigation(&request) && !last_segment.contains('.') {
        tracing::debug!(from = path, "Rewriting to /index.html");
        *request.uri_mut() = Uri::from_static("/index.html");
    }

    StageOutcome::Next(request)
}

/// `magicHtml`: `/name` serves an HTML shell for a compiled `/name.js`.
pub fn magic_html(ctx: &PipelineContext, request: Request<Body>) -> StageOutcome {
    let path = request.uri().path();
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    if !is_read(request.method()) || last_segment.is_empty() || last_segment.contains('.') {
        return StageOutcome::Next(request);
    }

    let script = format!("{}.js", path);
    if !ctx.state.has_compiled(&script) {
        return StageOutcome::Next(request);
    }

    let html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body><script type=\"text/javascript\" charset=\"utf-8\" src=\"{}\"></script></body></html>",
        script
    );
    StageOutcome::Respond(html_response(inject_reload_script(&html)))
}

/// `contentBaseIndex`: listing of a content base directory.
pub async fn directory_index(ctx: &PipelineContext, request: Request<Body>) -> StageOutcome {
    let Some(root) = &ctx.content_base else {
        return StageOutcome::Next(request);
    };
    if !is_read(request.method()) {
        return StageOutcome::Next(request);
    }

    let path = request.uri().path().to_string();
    let Some(dir) = resolve_under(root, &path).filter(|p| p.is_dir()) else {
        return StageOutcome::Next(request);
    };

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(_) => return StageOutcome::Next(request),
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let base = if path.ends_with('/') {
        path.clone()
    } else {
        format!("{}/", path)
    };
    let items: String = names
        .iter()
        .map(|name| {
            let name = super::error_overlay::html_escape(name);
            format!("<li><a href=\"{}{}\">{}</a></li>", base, name, name)
        })
        .collect();

    let html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Index of {path}</title></head><body><h1>Index of {path}</h1><ul>{items}</ul></body></html>",
        path = super::error_overlay::html_escape(&path),
        items = items
    );
    StageOutcome::Respond(html_response(html))
}

/// Nothing answered the request.
pub fn not_found(request: &Request<Body>) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Cannot {} {}", request.method(), request.uri().path()),
    )
        .into_response()
}

//! Request pipeline.
//!
//! The live-reload endpoints are plain routes. Every other request falls
//! through to [`dispatch`], which walks the planned features in order.

use super::stages::{self, run_hooks, Hooks, StageOutcome};
use super::state::{DevEvent, SharedState};
use super::{LIVE_RELOAD_PATH, RELOAD_SCRIPT_PATH};
use crate::features::{Feature, MiddlewareFeaturePlan};
use crate::proxy::{ProxyForwarder, ProxyRuleSet};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    response::{sse::Event, IntoResponse, Response, Sse},
    routing::get,
    Router,
};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tower_http::compression::CompressionLayer;

const RELOAD_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__devserve_sse__");
  source.onmessage = function (message) {
    var event;
    try {
      event = JSON.parse(message.data);
    } catch (e) {
      return;
    }
    if (event.type === "BuildCompleted" || event.type === "ContentChanged") {
      window.location.reload();
    }
  };
})();
"#;

/// Everything the stages need, fixed for the session.
pub struct PipelineContext {
    pub plan: MiddlewareFeaturePlan,
    pub state: SharedState,
    /// Added to every response once the `headers` stage has run
    pub headers: HeaderMap,
    pub proxy: ProxyRuleSet,
    pub forwarder: ProxyForwarder,
    /// Static file root, `None` when disabled
    pub content_base: Option<PathBuf>,
    pub hooks: Hooks,
}

/// Convert configured headers; invalid entries were rejected at load time.
pub fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    headers
        .iter()
        .filter_map(|(name, value)| {
            Some((
                HeaderName::try_from(name.as_str()).ok()?,
                HeaderValue::try_from(value.as_str()).ok()?,
            ))
        })
        .collect()
}

/// Build the router for a session.
pub fn build_router(ctx: Arc<PipelineContext>) -> Router {
    let compress = ctx.plan.contains(Feature::Compress);

    let router = Router::new()
        .route(LIVE_RELOAD_PATH, get(handle_sse))
        .route(RELOAD_SCRIPT_PATH, get(handle_reload_script))
        .fallback(dispatch)
        .with_state(ctx);

    if compress {
        router.layer(CompressionLayer::new())
    } else {
        router
    }
}

/// Run the planned stages until one responds.
async fn dispatch(State(ctx): State<Arc<PipelineContext>>, request: Request<Body>) -> Response {
    let mut request = request;
    let mut add_headers = false;

    for feature in ctx.plan.features() {
        let outcome = match feature {
            // applied as a layer, and at startup, respectively
            Feature::Compress | Feature::WatchContentBase => continue,
            Feature::Headers => {
                add_headers = true;
                continue;
            }
            Feature::Before => run_hooks(&ctx.hooks.before, request, &ctx.state).await,
            Feature::Setup => run_hooks(&ctx.hooks.setup, request, &ctx.state).await,
            Feature::After => run_hooks(&ctx.hooks.after, request, &ctx.state).await,
            Feature::Middleware => stages::compiled_assets(&ctx, request).await,
            Feature::Proxy => stages::proxy(&ctx, request).await,
            Feature::ContentBaseFiles => stages::static_files(&ctx, request).await,
            Feature::HistoryApiFallback => stages::history_fallback(request),
            Feature::MagicHtml => stages::magic_html(&ctx, request),
            Feature::ContentBaseIndex => stages::directory_index(&ctx, request).await,
        };

        match outcome {
            StageOutcome::Respond(response) => return finish(&ctx, response, add_headers),
            StageOutcome::Next(next) => request = next,
        }
    }

    finish(&ctx, stages::not_found(&request), add_headers)
}

fn finish(ctx: &PipelineContext, mut response: Response, add_headers: bool) -> Response {
    if add_headers {
        for (name, value) in &ctx.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}

/// Live-reload event stream.
async fn handle_sse(
    State(ctx): State<Arc<PipelineContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = ctx.state.register_client();
    tracing::debug!(client = id, "Live reload client connected");

    ctx.state.broadcast(&DevEvent::ClientConnected { id }).await;

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_reload_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        RELOAD_SCRIPT,
    )
}

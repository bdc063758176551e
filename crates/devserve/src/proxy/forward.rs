//! Request forwarding to proxy targets.

use super::ProxyRule;
use crate::error::{DevServerError, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
};

/// Largest request body buffered before forwarding.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
];

/// Forwards requests matched by a [`ProxyRule`] to its target.
///
/// Two clients are kept because certificate verification is per rule.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl ProxyForwarder {
    pub fn new() -> Result<Self> {
        let build = |accept_invalid_certs: bool| {
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .danger_accept_invalid_certs(accept_invalid_certs)
                .build()
                .map_err(|e| DevServerError::Server(format!("Failed to create proxy client: {}", e)))
        };

        Ok(Self {
            verifying: build(false)?,
            insecure: build(true)?,
        })
    }

    /// Forward `request` according to `rule`.
    ///
    /// Upstream failures never escape: they become a `502 Bad Gateway`.
    pub async fn forward(&self, rule: &ProxyRule, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();
        let origin_host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost")
            .to_string();

        let mut url = format!("{}{}", rule.target.as_str(), rule.options.rewrite_path(path));
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }

        let mut headers = strip_hop_by_hop(&parts.headers);
        if rule.options.change_origin {
            headers.remove(header::HOST);
        }
        if rule.options.ws && parts.headers.contains_key(header::UPGRADE) {
            tracing::debug!(path, "Websocket upgrade forwarded as plain request");
        }

        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => return proxy_error(path, &origin_host, rule, &e.to_string()),
        };

        let client = if rule.options.secure {
            &self.verifying
        } else {
            &self.insecure
        };

        tracing::debug!(method = %parts.method, path, upstream = %url, "Proxying request");

        let upstream = client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        match upstream {
            Ok(response) => {
                let mut builder = Response::builder().status(response.status());
                if let Some(out) = builder.headers_mut() {
                    *out = strip_hop_by_hop(response.headers());
                }
                builder
                    .body(Body::from_stream(response.bytes_stream()))
                    .unwrap_or_else(|e| proxy_error(path, &origin_host, rule, &e.to_string()))
            }
            Err(e) => proxy_error(path, &origin_host, rule, &e.to_string()),
        }
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out
}

fn proxy_error(path: &str, host: &str, rule: &ProxyRule, cause: &str) -> Response {
    let message = format!(
        "Proxy error: Could not proxy request {} from {} to {}.",
        path, host, rule.target
    );
    tracing::warn!(cause, "{}", message);

    (
        StatusCode::BAD_GATEWAY,
        format!("{}\n\n{}", message, cause),
    )
        .into_response()
}

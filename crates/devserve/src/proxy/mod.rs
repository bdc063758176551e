//! Proxy configuration.
//!
//! The manifest's `proxy` field comes in two shapes:
//!
//! - a single target (`"http://localhost:5000"`), which forwards every request
//!   the dev server itself would not answer with a static file or the app shell;
//! - an object of path contexts (`{ "/api": { "target": ... } }`), each
//!   forwarding requests under that prefix.
//!
//! [`resolve_proxy`] validates either shape into an ordered [`ProxyRuleSet`].
//! Forwarding itself lives in [`forward`].

pub mod forward;

use crate::error::{DevServerError, Result};
use crate::server::LIVE_RELOAD_PATH;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub use forward::ProxyForwarder;

/// The raw `proxy` value from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyDeclaration {
    /// Shorthand: one backend for everything unmatched
    Target(String),
    /// Path context → rule
    Rules(BTreeMap<String, RuleSpec>),
}

/// One entry of the structured proxy form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub change_origin: bool,
    #[serde(default)]
    pub ws: bool,
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default)]
    pub path_rewrite: BTreeMap<String, String>,
}

fn default_secure() -> bool {
    true
}

/// A validated backend base URL (`http` or `https`, no trailing slash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
}

impl ProxyTarget {
    /// Validate `raw` as an http(s) URL or a bare `host:port`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| DevServerError::InvalidProxyDeclaration {
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("proxy target cannot be empty"));
        }

        let candidate = if raw.contains("://") {
            raw.to_string()
        } else if is_host_port(raw) {
            format!("http://{}", raw)
        } else {
            return Err(invalid(
                "proxy target must be an http:// or https:// URL, or host:port",
            ));
        };

        let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("proxy target must start with http:// or https://"));
        }
        if url.host_str().is_none() {
            return Err(invalid("proxy target must include a host"));
        }

        Ok(Self { url })
    }

    /// Base URL without the trailing slash.
    pub fn as_str(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// `host[:port]`, as sent in the `Host` header when the origin is changed.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_host_port(raw: &str) -> bool {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.chars().any(|c| c.is_whitespace() || c == '/')
                && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

/// Which requests a rule claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Everything that isn't a static asset, an HTML navigation, or the live-reload endpoint
    StaticFallthrough { asset_root: PathBuf },
    /// Paths starting with the given context
    Prefix(String),
}

/// Forwarding options, passed through from the declaration unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxyOptions {
    /// Rewrite `Host` to the target
    pub change_origin: bool,
    /// Websocket upgrades requested
    pub ws: bool,
    /// Verify the target's TLS certificate
    pub secure: bool,
    /// Prefix → replacement, first match wins
    pub path_rewrite: BTreeMap<String, String>,
}

impl ProxyOptions {
    /// Options used by the single-target shorthand.
    pub fn shorthand() -> Self {
        Self {
            change_origin: true,
            ws: true,
            secure: false,
            path_rewrite: BTreeMap::new(),
        }
    }

    /// Apply `path_rewrite` to `path`.
    ///
    /// Keys may carry a leading `^` anchor; they are matched as literal prefixes.
    pub fn rewrite_path(&self, path: &str) -> String {
        for (from, to) in &self.path_rewrite {
            let prefix = from.strip_prefix('^').unwrap_or(from);
            if let Some(rest) = path.strip_prefix(prefix) {
                let rewritten = format!("{}{}", to, rest);
                return if rewritten.starts_with('/') {
                    rewritten
                } else {
                    format!("/{}", rewritten)
                };
            }
        }
        path.to_string()
    }
}

/// The parts of a request rule matching looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub accept: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    pub matcher: PathMatcher,
    pub target: ProxyTarget,
    pub options: ProxyOptions,
}

impl ProxyRule {
    pub fn matches(&self, request: &RequestView<'_>) -> bool {
        match &self.matcher {
            PathMatcher::Prefix(prefix) => request.path.starts_with(prefix.as_str()),
            PathMatcher::StaticFallthrough { asset_root } => {
                if *request.method != Method::GET {
                    return true;
                }
                // a GET without Accept is a plain fetch of something local
                let api_call = request
                    .accept
                    .is_some_and(|accept| !accept.contains("text/html"));
                api_call
                    && request.path != LIVE_RELOAD_PATH
                    && !is_static_path(asset_root, request.path)
            }
        }
    }
}

/// Whether `path` names an existing file or directory below `root`.
fn is_static_path(root: &Path, path: &str) -> bool {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return false;
    }
    root.join(relative).exists()
}

/// Ordered proxy rules; the first match forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRuleSet {
    rules: Vec<ProxyRule>,
}

impl ProxyRuleSet {
    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// First rule claiming `request`.
    pub fn find(&self, request: &RequestView<'_>) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }
}

/// Turn the manifest's proxy declaration into forwarding rules.
///
/// # Examples
///
/// ```
/// use devserve::proxy::{resolve_proxy, ProxyDeclaration};
/// use std::path::Path;
///
/// let raw = ProxyDeclaration::Target("localhost:5000".to_string());
/// let rules = resolve_proxy(Some(&raw), Path::new("public")).unwrap();
/// assert_eq!(rules.rules()[0].target.as_str(), "http://localhost:5000");
/// ```
pub fn resolve_proxy(raw: Option<&ProxyDeclaration>, asset_root: &Path) -> Result<ProxyRuleSet> {
    let rules = match raw {
        None => Vec::new(),
        Some(ProxyDeclaration::Target(target)) => vec![ProxyRule {
            matcher: PathMatcher::StaticFallthrough {
                asset_root: asset_root.to_path_buf(),
            },
            target: ProxyTarget::parse(target)?,
            options: ProxyOptions::shorthand(),
        }],
        Some(ProxyDeclaration::Rules(specs)) => specs
            .iter()
            .map(|(context, spec)| resolve_rule(context, spec))
            .collect::<Result<Vec<_>>>()?,
    };

    for rule in &rules {
        tracing::debug!(target_url = %rule.target, matcher = ?rule.matcher, "Proxy rule");
    }

    Ok(ProxyRuleSet { rules })
}

fn resolve_rule(context: &str, spec: &RuleSpec) -> Result<ProxyRule> {
    if !context.starts_with('/') {
        return Err(DevServerError::InvalidProxyDeclaration {
            value: context.to_string(),
            reason: "proxy context must be a path starting with /".to_string(),
        });
    }
    if spec.target.trim().is_empty() {
        return Err(DevServerError::InvalidProxyDeclaration {
            value: context.to_string(),
            reason: format!("missing \"target\" for proxy context {}", context),
        });
    }

    Ok(ProxyRule {
        matcher: PathMatcher::Prefix(context.to_string()),
        target: ProxyTarget::parse(&spec.target)?,
        options: ProxyOptions {
            change_origin: spec.change_origin,
            ws: spec.ws,
            secure: spec.secure,
            path_rewrite: spec.path_rewrite.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn view<'a>(method: &'a Method, path: &'a str, accept: Option<&'a str>) -> RequestView<'a> {
        RequestView {
            method,
            path,
            accept,
        }
    }

    fn shorthand(asset_root: &Path) -> ProxyRuleSet {
        let raw = ProxyDeclaration::Target("http://localhost:5000".to_string());
        resolve_proxy(Some(&raw), asset_root).unwrap()
    }

    #[test]
    fn test_absent_declaration_yields_no_rules() {
        let rules = resolve_proxy(None, Path::new("public")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_shorthand_rule() {
        let rules = shorthand(Path::new("public"));
        assert_eq!(rules.len(), 1);

        let rule = &rules.rules()[0];
        assert_eq!(rule.target.as_str(), "http://localhost:5000");
        assert_eq!(rule.target.authority(), "localhost:5000");
        assert!(rule.options.change_origin);
        assert!(rule.options.ws);
        assert!(!rule.options.secure);
        assert!(matches!(
            rule.matcher,
            PathMatcher::StaticFallthrough { .. }
        ));
    }

    #[test]
    fn test_bare_host_port_is_normalised() {
        let target = ProxyTarget::parse("127.0.0.1:8080").unwrap();
        assert_eq!(target.as_str(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_malformed_targets_are_rejected() {
        for raw in ["not a url", "ftp://x", "", "localhost", "http://"] {
            let err = ProxyTarget::parse(raw).unwrap_err();
            assert!(
                matches!(err, DevServerError::InvalidProxyDeclaration { .. }),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_structured_rules_keep_options() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "/api".to_string(),
            RuleSpec {
                target: "https://backend.test".to_string(),
                change_origin: false,
                ws: true,
                secure: true,
                path_rewrite: BTreeMap::from([("^/api".to_string(), "".to_string())]),
            },
        );
        specs.insert(
            "/auth".to_string(),
            RuleSpec {
                target: "localhost:4000".to_string(),
                change_origin: true,
                ws: false,
                secure: true,
                path_rewrite: BTreeMap::new(),
            },
        );

        let rules = resolve_proxy(Some(&ProxyDeclaration::Rules(specs)), Path::new("public"))
            .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].matcher, PathMatcher::Prefix("/api".into()));
        assert!(rules.rules()[0].options.ws);
        assert!(!rules.rules()[0].options.change_origin);
        assert_eq!(rules.rules()[1].target.as_str(), "http://localhost:4000");

        let get = Method::GET;
        let found = rules.find(&view(&get, "/auth/login", None)).unwrap();
        assert_eq!(found.target.as_str(), "http://localhost:4000");
        assert!(rules.find(&view(&get, "/other", None)).is_none());
    }

    #[test]
    fn test_structured_rule_validation() {
        let missing_target = BTreeMap::from([(
            "/api".to_string(),
            RuleSpec {
                target: String::new(),
                change_origin: false,
                ws: false,
                secure: true,
                path_rewrite: BTreeMap::new(),
            },
        )]);
        assert!(resolve_proxy(
            Some(&ProxyDeclaration::Rules(missing_target)),
            Path::new("public")
        )
        .is_err());

        let bad_context = BTreeMap::from([(
            "api".to_string(),
            RuleSpec {
                target: "http://localhost:4000".to_string(),
                change_origin: false,
                ws: false,
                secure: true,
                path_rewrite: BTreeMap::new(),
            },
        )]);
        assert!(resolve_proxy(
            Some(&ProxyDeclaration::Rules(bad_context)),
            Path::new("public")
        )
        .is_err());
    }

    #[test]
    fn test_static_fallthrough_matching() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("favicon.ico"), b"icon").unwrap();
        fs::create_dir_all(temp.path().join("images")).unwrap();
        let rules = shorthand(temp.path());
        let rule = &rules.rules()[0];

        let get = Method::GET;
        let post = Method::POST;

        assert!(rule.matches(&view(&get, "/api/todos", Some("application/json"))));
        assert!(!rule.matches(&view(&get, "/api/todos", None)));
        assert!(!rule.matches(&view(&get, "/favicon.ico", Some("*/*"))));
        assert!(!rule.matches(&view(&get, "/images", Some("*/*"))));
        assert!(!rule.matches(&view(&get, "/", Some("*/*"))));
        // never resolved outside the asset root
        assert!(rule.matches(&view(&get, "/../secret", Some("*/*"))));
        assert!(!rule.matches(&view(&get, "/dashboard", Some("text/html,*/*"))));
        assert!(!rule.matches(&view(&get, LIVE_RELOAD_PATH, Some("text/event-stream"))));
        assert!(rule.matches(&view(&post, "/favicon.ico", Some("text/html"))));
    }

    #[test]
    fn test_path_rewrite() {
        let options = ProxyOptions {
            path_rewrite: BTreeMap::from([("^/api".to_string(), "/v2".to_string())]),
            ..ProxyOptions::default()
        };
        assert_eq!(options.rewrite_path("/api/users"), "/v2/users");
        assert_eq!(options.rewrite_path("/other"), "/other");

        let strip = ProxyOptions {
            path_rewrite: BTreeMap::from([("/api".to_string(), "".to_string())]),
            ..ProxyOptions::default()
        };
        assert_eq!(strip.rewrite_path("/api/users"), "/users");
    }

    #[test]
    fn test_declaration_deserializes_both_shapes() {
        let target: ProxyDeclaration = serde_json::from_str("\"http://localhost:5000\"").unwrap();
        assert_eq!(
            target,
            ProxyDeclaration::Target("http://localhost:5000".into())
        );

        let rules: ProxyDeclaration =
            serde_json::from_str(r#"{ "/api": { "target": "http://x:1", "changeOrigin": true } }"#)
                .unwrap();
        match rules {
            ProxyDeclaration::Rules(map) => {
                assert!(map["/api"].change_origin);
                assert!(map["/api"].secure);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

//! Middleware feature planning.
//!
//! The request pipeline is a fixed vocabulary of [`Feature`] stages run in
//! the order given by a [`MiddlewareFeaturePlan`]. Two orderings exist:
//!
//! - [`host_default_features`]: the stock ordering, used when no render hook
//!   needs to be interposed.
//! - [`plan_features`]: the server-side-render ordering. It re-runs the
//!   `after` stage right behind every `contentBaseFiles` stage so the render
//!   hook sees both the static-file short-circuit and any history-fallback
//!   rewrite, and it always finishes before `magicHtml`.
//!
//! Both are pure functions of [`FeatureFlags`].

use serde::Serialize;
use std::fmt;

/// A named, independently toggleable stage of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    /// Response compression; always the outermost stage when present
    Compress,
    /// User hooks that run before anything else
    Before,
    /// Legacy alias slot for user setup hooks
    Setup,
    /// Custom response headers
    Headers,
    /// Compiled assets served from memory
    Middleware,
    /// Proxy rules
    Proxy,
    /// Static files from the content base directory
    ContentBaseFiles,
    /// User hooks that run after static handling, including server-side rendering
    After,
    /// Content base watcher (no per-request effect)
    WatchContentBase,
    /// Rewrite navigations to `/index.html`
    HistoryApiFallback,
    /// `/name` → HTML shell for a compiled `/name.js`
    MagicHtml,
    /// Directory listing of the content base
    ContentBaseIndex,
}

impl Feature {
    /// Identifier used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Compress => "compress",
            Feature::Before => "before",
            Feature::Setup => "setup",
            Feature::Headers => "headers",
            Feature::Middleware => "middleware",
            Feature::Proxy => "proxy",
            Feature::ContentBaseFiles => "contentBaseFiles",
            Feature::After => "after",
            Feature::WatchContentBase => "watchContentBase",
            Feature::HistoryApiFallback => "historyApiFallback",
            Feature::MagicHtml => "magicHtml",
            Feature::ContentBaseIndex => "contentBaseIndex",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The planner's view of the server configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub compress: bool,
    /// `false` only when the content base is explicitly disabled
    pub content_base: bool,
    pub watch_content_base: bool,
    pub history_api_fallback: bool,
    pub server_side_render: bool,
    pub proxy: bool,
    pub before: bool,
    pub after: bool,
}

/// Ordered list of features. Duplicates are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MiddlewareFeaturePlan(Vec<Feature>);

impl MiddlewareFeaturePlan {
    pub fn features(&self) -> &[Feature] {
        &self.0
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ordering rules a render-hook plan must satisfy.
    ///
    /// Returns one message per violated rule; empty means the plan is sound.
    pub fn ordering_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let features = &self.0;

        if features.last() != Some(&Feature::MagicHtml) {
            violations.push("magicHtml must be the last feature".to_string());
        }

        if let Some(pos) = features.iter().position(|f| *f == Feature::Compress) {
            if pos != 0 {
                violations.push("compress must be the first feature".to_string());
            }
        }

        if features.contains(&Feature::ContentBaseFiles) {
            for (idx, feature) in features.iter().enumerate() {
                if *feature == Feature::After
                    && !features[..idx].contains(&Feature::ContentBaseFiles)
                {
                    violations.push(format!("after at {} runs before any contentBaseFiles", idx));
                }
            }
        }

        for (idx, feature) in features.iter().enumerate() {
            if *feature == Feature::After && !features[..idx].contains(&Feature::Middleware) {
                violations.push(format!("after at {} runs before middleware", idx));
            }
        }

        if let Some(proxy) = features.iter().position(|f| *f == Feature::Proxy) {
            let before = features[..proxy].contains(&Feature::Middleware);
            let after = features.get(proxy + 1) == Some(&Feature::Middleware);
            if !before || !after {
                violations.push("proxy must be surrounded by middleware".to_string());
            }
        }

        if let (Some(after), Some(magic)) = (
            features.iter().rposition(|f| *f == Feature::After),
            features.iter().position(|f| *f == Feature::MagicHtml),
        ) {
            if after > magic {
                violations.push("after must run before magicHtml".to_string());
            }
        }

        violations
    }
}

impl From<Vec<Feature>> for MiddlewareFeaturePlan {
    fn from(features: Vec<Feature>) -> Self {
        Self(features)
    }
}

impl fmt::Display for MiddlewareFeaturePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, feature) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(feature.as_str())?;
        }
        f.write_str("]")
    }
}

/// Static files, then the after-class hooks that must observe them.
fn push_static_then_after(features: &mut Vec<Feature>, flags: &FeatureFlags) {
    if flags.content_base {
        features.extend([Feature::ContentBaseFiles, Feature::After]);
    } else if flags.after {
        features.push(Feature::After);
    }
}

/// Feature ordering that interposes the `after` hooks (server-side rendering)
/// between static handling and the terminal `magicHtml` fallback.
///
/// # Examples
///
/// ```
/// use devserve::features::{plan_features, Feature, FeatureFlags};
///
/// let flags = FeatureFlags {
///     server_side_render: true,
///     content_base: true,
///     ..FeatureFlags::default()
/// };
/// let plan = plan_features(&flags);
/// assert_eq!(plan.features().last(), Some(&Feature::MagicHtml));
/// ```
pub fn plan_features(flags: &FeatureFlags) -> MiddlewareFeaturePlan {
    let mut features = vec![
        Feature::Before,
        Feature::Setup,
        Feature::Headers,
        Feature::Middleware,
    ];

    if flags.proxy {
        features.extend([Feature::Proxy, Feature::Middleware]);
    }

    push_static_then_after(&mut features, flags);

    if flags.watch_content_base {
        features.push(Feature::WatchContentBase);
    }

    if flags.history_api_fallback {
        features.extend([Feature::HistoryApiFallback, Feature::Middleware]);
        // the fallback may change which static file matches
        push_static_then_after(&mut features, flags);
    }

    features.push(Feature::MagicHtml);

    if flags.compress {
        features.insert(0, Feature::Compress);
    }

    MiddlewareFeaturePlan(features)
}

/// The stock ordering used when no render hook is interposed.
///
/// `after` hooks run last here, behind `magicHtml` and the directory index.
pub fn host_default_features(flags: &FeatureFlags) -> MiddlewareFeaturePlan {
    let mut features = vec![
        Feature::Setup,
        Feature::Before,
        Feature::Headers,
        Feature::Middleware,
    ];

    if flags.proxy {
        features.extend([Feature::Proxy, Feature::Middleware]);
    }

    if flags.content_base {
        features.push(Feature::ContentBaseFiles);
    }

    if flags.watch_content_base {
        features.push(Feature::WatchContentBase);
    }

    if flags.history_api_fallback {
        features.extend([Feature::HistoryApiFallback, Feature::Middleware]);
        if flags.content_base {
            features.push(Feature::ContentBaseFiles);
        }
    }

    features.push(Feature::MagicHtml);

    if flags.content_base {
        features.push(Feature::ContentBaseIndex);
    }

    if flags.after {
        features.push(Feature::After);
    }

    if flags.compress {
        features.insert(0, Feature::Compress);
    }

    MiddlewareFeaturePlan(features)
}

/// The plan the server actually runs: the render-hook ordering only when
/// server-side rendering is on.
pub fn select_plan(flags: &FeatureFlags) -> MiddlewareFeaturePlan {
    if flags.server_side_render {
        plan_features(flags)
    } else {
        host_default_features(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Feature::*;

    fn all_flag_combinations() -> impl Iterator<Item = FeatureFlags> {
        (0u32..128).map(|bits| FeatureFlags {
            compress: bits & 1 != 0,
            content_base: bits & 2 != 0,
            watch_content_base: bits & 4 != 0,
            history_api_fallback: bits & 8 != 0,
            proxy: bits & 16 != 0,
            before: bits & 32 != 0,
            after: bits & 64 != 0,
            server_side_render: true,
        })
    }

    #[test]
    fn test_end_to_end_ssr_plan() {
        let flags = FeatureFlags {
            server_side_render: true,
            content_base: true,
            history_api_fallback: true,
            compress: true,
            after: true,
            ..FeatureFlags::default()
        };

        assert_eq!(
            plan_features(&flags).features(),
            &[
                Compress,
                Before,
                Setup,
                Headers,
                Middleware,
                ContentBaseFiles,
                After,
                HistoryApiFallback,
                Middleware,
                ContentBaseFiles,
                After,
                MagicHtml,
            ]
        );
    }

    #[test]
    fn test_ssr_plan_invariants_hold_for_every_combination() {
        for flags in all_flag_combinations() {
            let plan = plan_features(&flags);
            let violations = plan.ordering_violations();
            assert!(violations.is_empty(), "{:?} -> {}: {:?}", flags, plan, violations);
        }
    }

    #[test]
    fn test_compress_is_first_when_enabled() {
        for flags in all_flag_combinations().filter(|f| f.compress) {
            assert_eq!(plan_features(&flags).features()[0], Compress);
        }
        for flags in all_flag_combinations().filter(|f| !f.compress) {
            assert!(!plan_features(&flags).contains(Compress));
        }
    }

    #[test]
    fn test_proxy_reruns_middleware() {
        let flags = FeatureFlags {
            proxy: true,
            server_side_render: true,
            ..FeatureFlags::default()
        };
        let plan = plan_features(&flags);
        assert_eq!(
            plan.features(),
            &[Before, Setup, Headers, Middleware, Proxy, Middleware, MagicHtml]
        );
    }

    #[test]
    fn test_disabled_content_base_keeps_after_hook() {
        let flags = FeatureFlags {
            content_base: false,
            after: true,
            history_api_fallback: true,
            server_side_render: true,
            ..FeatureFlags::default()
        };
        assert_eq!(
            plan_features(&flags).features(),
            &[
                Before,
                Setup,
                Headers,
                Middleware,
                After,
                HistoryApiFallback,
                Middleware,
                After,
                MagicHtml,
            ]
        );
    }

    #[test]
    fn test_disabled_content_base_without_after_hook() {
        let flags = FeatureFlags {
            server_side_render: true,
            ..FeatureFlags::default()
        };
        assert_eq!(
            plan_features(&flags).features(),
            &[Before, Setup, Headers, Middleware, MagicHtml]
        );
    }

    #[test]
    fn test_watch_content_base_sits_between_passes() {
        let flags = FeatureFlags {
            content_base: true,
            watch_content_base: true,
            history_api_fallback: true,
            server_side_render: true,
            ..FeatureFlags::default()
        };
        let plan = plan_features(&flags);
        let watch = plan
            .features()
            .iter()
            .position(|f| *f == WatchContentBase)
            .unwrap();
        let fallback = plan
            .features()
            .iter()
            .position(|f| *f == HistoryApiFallback)
            .unwrap();
        assert_eq!(plan.features()[watch - 1], After);
        assert_eq!(watch + 1, fallback);
    }

    #[test]
    fn test_planner_is_idempotent() {
        for flags in all_flag_combinations() {
            assert_eq!(plan_features(&flags), plan_features(&flags));
        }
    }

    #[test]
    fn test_host_default_plan() {
        let flags = FeatureFlags {
            compress: true,
            content_base: true,
            watch_content_base: true,
            history_api_fallback: true,
            proxy: true,
            after: true,
            ..FeatureFlags::default()
        };
        assert_eq!(
            host_default_features(&flags).features(),
            &[
                Compress,
                Setup,
                Before,
                Headers,
                Middleware,
                Proxy,
                Middleware,
                ContentBaseFiles,
                WatchContentBase,
                HistoryApiFallback,
                Middleware,
                ContentBaseFiles,
                MagicHtml,
                ContentBaseIndex,
                After,
            ]
        );
    }

    #[test]
    fn test_host_default_plan_lets_magic_html_win_over_after() {
        let flags = FeatureFlags {
            content_base: true,
            after: true,
            ..FeatureFlags::default()
        };
        let violations = host_default_features(&flags).ordering_violations();
        assert!(violations.iter().any(|v| v.contains("magicHtml")));
    }

    #[test]
    fn test_select_plan_only_overrides_for_ssr() {
        let mut flags = FeatureFlags {
            content_base: true,
            after: true,
            ..FeatureFlags::default()
        };
        assert_eq!(select_plan(&flags), host_default_features(&flags));

        flags.server_side_render = true;
        assert_eq!(select_plan(&flags), plan_features(&flags));
    }

    #[test]
    fn test_plan_display_and_serialization() {
        let plan = MiddlewareFeaturePlan::from(vec![Compress, ContentBaseFiles, MagicHtml]);
        assert_eq!(plan.to_string(), "[compress, contentBaseFiles, magicHtml]");
        assert_eq!(
            serde_json::to_string(&plan).unwrap(),
            r#"["compress","contentBaseFiles","magicHtml"]"#
        );
    }
}

//! Browser page shown for navigations while the last build is broken.
//!
//! The page listens on the live-reload stream and reloads itself as soon as a
//! build succeeds.

use super::RELOAD_SCRIPT_PATH;

/// Escape text for inclusion in HTML.
pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the overlay for `error`.
pub fn generate_error_overlay(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Failed to compile</title>
  <style>
    body {{ margin: 0; background: #1e1e1e; color: #e8e8e8; font-family: Menlo, Consolas, monospace; }}
    main {{ padding: 2rem; }}
    h1 {{ color: #ff6b6b; font-size: 1.4rem; }}
    pre {{ white-space: pre-wrap; line-height: 1.5; }}
  </style>
</head>
<body>
  <main>
    <h1>Failed to compile</h1>
    <pre>{error}</pre>
    <p>This page reloads when the next build succeeds.</p>
  </main>
  <script src="{script}"></script>
</body>
</html>
"#,
        error = html_escape(error),
        script = RELOAD_SCRIPT_PATH,
    )
}

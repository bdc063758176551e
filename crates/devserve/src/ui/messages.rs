use owo_colors::{OwoColorize, Style};

fn paint(text: &str, style: Style) -> String {
    if super::colors_enabled() {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

pub fn success(message: &str) {
    eprintln!("{} {}", paint("✓", Style::new().green().bold()), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", paint("ℹ", Style::new().cyan().bold()), message);
}

pub fn warning(message: &str) {
    let style = Style::new().yellow();
    eprintln!("{} {}", paint("⚠", style.bold()), paint(message, style));
}

pub fn error(message: &str) {
    let style = Style::new().red();
    eprintln!("{} {}", paint("✗", style.bold()), paint(message, style));
}

/// Indented `label value` line, e.g. `Searched in: /app/public`.
pub fn field(label: &str, value: &str) {
    eprintln!(
        "  {} {}",
        paint(label, Style::new().bold()),
        paint(value, Style::new().cyan())
    );
}

/// Highlight a value inside a sentence.
pub fn emphasis(text: &str) -> String {
    paint(text, Style::new().yellow().bold())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_plain_when_colors_are_off() {
        // colors stay off unless init_colors turned them on
        if !super::super::colors_enabled() {
            assert_eq!(emphasis("0.0.0.0"), "0.0.0.0");
        }
    }

    #[test]
    fn test_printers_do_not_panic() {
        success("Compiled successfully!");
        info("Starting the development server...");
        warning("Proxy target unreachable");
        error("Could not find a required file.");
        field("Name:", "index.html");
    }
}

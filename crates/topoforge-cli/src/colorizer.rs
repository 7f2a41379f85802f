//! Terminal colorization for diagnostics
//!
//! Applies ANSI escape codes to status lines using crossterm. Callers decide
//! whether color is enabled; everything here is a no-op when it is not.

use crossterm::style::{Color, Stylize};

/// How a piece of text should stand out
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Warning,
    Error,
    Heading,
}

/// Paint `text` in the given tone
pub fn paint(text: &str, tone: Tone, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    let styled = match tone {
        Tone::Ok => text.with(Color::Green),
        Tone::Warning => text.with(Color::Yellow),
        Tone::Error => text.with(Color::Red),
        Tone::Heading => text.bold(),
    };
    styled.to_string()
}

/// `✓ message` in green
pub fn ok_line(message: &str, enabled: bool) -> String {
    format!("{} {}", paint("✓", Tone::Ok, enabled), message)
}

/// `! message` in yellow
pub fn warning_line(message: &str, enabled: bool) -> String {
    format!("{} {}", paint("!", Tone::Warning, enabled), message)
}

/// `✗ message` in red
pub fn error_line(message: &str, enabled: bool) -> String {
    format!("{} {}", paint("✗", Tone::Error, enabled), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_plain() {
        assert_eq!(paint("web", Tone::Error, false), "web");
        assert_eq!(ok_line("valid", false), "✓ valid");
        assert_eq!(warning_line("isolated", false), "! isolated");
    }

    #[test]
    fn test_enabled_adds_ansi_codes() {
        let output = error_line("missing image", true);
        assert!(output.contains("\x1b["));
        assert!(output.contains("missing image"));
    }

    #[test]
    fn test_heading_keeps_text() {
        let output = paint("NAME", Tone::Heading, true);
        assert!(output.contains("NAME"));
    }
}

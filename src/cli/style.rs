//! Terminal styling helpers

use owo_colors::{OwoColorize, Stream};

/// Check mark used for completed steps
pub const CHECK: &str = "✓";

/// Styling shortcuts for CLI output
pub trait Stylize {
    /// Dimmed secondary text
    fn muted(&self) -> String;
    /// Highlighted value (PR numbers, shas)
    fn accent(&self) -> String;
    /// Bold text
    fn emphasis(&self) -> String;
    /// Warning text
    fn warn(&self) -> String;
}

impl<T: AsRef<str>> Stylize for T {
    fn muted(&self) -> String {
        self.as_ref()
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string()
    }

    fn accent(&self) -> String {
        self.as_ref()
            .if_supports_color(Stream::Stdout, |s| s.cyan())
            .to_string()
    }

    fn emphasis(&self) -> String {
        self.as_ref()
            .if_supports_color(Stream::Stdout, |s| s.bold())
            .to_string()
    }

    fn warn(&self) -> String {
        self.as_ref()
            .if_supports_color(Stream::Stdout, |s| s.yellow())
            .to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    CHECK
        .if_supports_color(Stream::Stdout, |s| s.green())
        .to_string()
}

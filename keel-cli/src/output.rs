//! Styled terminal output utilities.
//!
//! Colors are dropped when the stream is not a terminal or `NO_COLOR` is set.

use std::io::{self, BufRead, Write};

use owo_colors::{OwoColorize, Stream};

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!(
        "{}",
        text.if_supports_color(Stream::Stdout, |t| t.bold().cyan().to_string())
    );
    println!(
        "{}",
        "─"
            .repeat(text.chars().count())
            .if_supports_color(Stream::Stdout, |t| t.dimmed().to_string())
    );
    println!();
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!(
        "  {}: {}",
        key.if_supports_color(Stream::Stdout, |t| t.dimmed().to_string()),
        value
    );
}

/// Print a success message
pub fn success(text: &str) {
    println!(
        "{} {}",
        "✔".if_supports_color(Stream::Stdout, |t| t.green().bold().to_string()),
        text.if_supports_color(Stream::Stdout, |t| t.green().to_string())
    );
}

/// Print an info message
pub fn info(text: &str) {
    println!(
        "{} {}",
        "ℹ".if_supports_color(Stream::Stdout, |t| t.blue().bold().to_string()),
        text
    );
}

/// Print a warning message
pub fn warn(text: &str) {
    println!(
        "{} {}",
        "⚠".if_supports_color(Stream::Stdout, |t| t.yellow().bold().to_string()),
        text.if_supports_color(Stream::Stdout, |t| t.yellow().to_string())
    );
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!(
        "{} {}",
        "✖".if_supports_color(Stream::Stderr, |t| t.red().bold().to_string()),
        text.if_supports_color(Stream::Stderr, |t| t.red().to_string())
    );
}

/// Print a hint below an error
pub fn hint(text: &str) {
    eprintln!(
        "  {} {}",
        "help:".if_supports_color(Stream::Stderr, |t| t.cyan().bold().to_string()),
        text
    );
}

/// Print a numbered list item
pub fn numbered_item(number: usize, text: &str) {
    println!(
        "  {}. {}",
        number
            .to_string()
            .if_supports_color(Stream::Stdout, |t| t.dimmed().to_string()),
        text
    );
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!(
        "{}",
        text.if_supports_color(Stream::Stdout, |t| t.dimmed().to_string())
    );
}

/// Style text as success (green)
pub fn style_success(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.green().to_string())
        .to_string()
}

/// Style text as pending (yellow)
pub fn style_pending(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.yellow().to_string())
        .to_string()
}

/// Ask for confirmation, reading the answer from `input`.
///
/// Only `y` or `yes` (any case) consents; anything else, including end of
/// input, declines.
pub fn confirm_with(prompt: &str, input: &mut impl BufRead) -> bool {
    print!(
        "{} {} ",
        prompt,
        "[y/N]".if_supports_color(Stream::Stdout, |t| t.dimmed().to_string())
    );
    io::stdout().flush().ok();

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    println!();

    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_with() {
        assert!(confirm_with("ok?", &mut "y\n".as_bytes()));
        assert!(confirm_with("ok?", &mut " YES \n".as_bytes()));
        assert!(!confirm_with("ok?", &mut "n\n".as_bytes()));
        assert!(!confirm_with("ok?", &mut "sure\n".as_bytes()));
        assert!(!confirm_with("ok?", &mut "".as_bytes()));
    }
}

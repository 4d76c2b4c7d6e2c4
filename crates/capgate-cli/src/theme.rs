//! CLI theme and styling.

use capgate_grant::GrantState;
use colored::Colorize;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a grant state.
    pub(crate) fn grant_state(state: GrantState) -> String {
        match state {
            GrantState::Granted => "granted".green().to_string(),
            GrantState::Denied => "denied".red().to_string(),
            GrantState::Unknown => "unknown".yellow().to_string(),
        }
    }

    /// Format a yes/no flag.
    pub(crate) fn flag(value: bool) -> String {
        if value {
            "yes".bold().to_string()
        } else {
            "no".dimmed().to_string()
        }
    }

    /// Format a timestamp.
    pub(crate) fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M").to_string().dimmed().to_string()
    }

    /// Format a box around text using box-drawing characters.
    pub(crate) fn dialog_box(title: &str, content: &str) -> String {
        const WIDTH: usize = 60;
        let inner = WIDTH.saturating_sub(2);
        let top = format!("╭{}╮", "─".repeat(inner)).yellow().to_string();
        let bottom = format!("╰{}╯", "─".repeat(inner)).yellow().to_string();
        let empty = format!("│{:w$}│", "", w = inner).yellow().to_string();

        let pad_line = |text: &str| -> String {
            let visible_len = strip_ansi(text).chars().count();
            let padding = WIDTH.saturating_sub(4).saturating_sub(visible_len);
            format!("│ {text}{:p$} │", "", p = padding)
        };

        let mut lines = vec![top, pad_line(&title.bold().to_string()), empty];
        for line in wrap(content, WIDTH.saturating_sub(4)) {
            lines.push(pad_line(&line));
        }
        lines.push(bottom);
        lines.join("\n")
    }
}

/// Strip ANSI escape codes from a string for visible-length calculation.
fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if c == '\x1b' {
            in_escape = true;
        } else {
            result.push(c);
        }
    }
    result
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current
                .chars()
                .count()
                .saturating_add(word.chars().count())
                .saturating_add(1);
            if !current.is_empty() && needed > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

//! Table and text layout helpers used by the CLI.
//! Keeps ANSI-aware width calculations and simple table rendering in one place.

use terminal_size::{Width, terminal_size};

/// Render a simple text table. Column widths are auto-computed from the widest
/// cell (header or row) using display lengths that ignore ANSI color codes.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let mut widths: Vec<usize> =
        headers.iter().map(|h| display_len(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_len(cell));
        }
    }

    let mut out = String::new();
    out.push_str(format_row(headers, &widths).trim_end());
    out.push('\n');
    out.push_str(&"=".repeat(display_len(&format_row(headers, &widths))));
    for row in rows {
        out.push('\n');
        out.push_str(format_row(row, &widths).trim_end());
    }
    out
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (cell, width) in row.iter().zip(widths.iter()) {
        let plain_len = display_len(cell);
        parts.push(pad_field(cell, *width, plain_len));
    }
    parts.join(" | ")
}

/// Right-pad a field based on visible length (ignoring ANSI codes).
pub fn pad_field(display: &str, target: usize, plain_len: usize) -> String {
    let mut out = display.to_string();
    let padding = target.saturating_sub(plain_len);
    out.push_str(&" ".repeat(padding));
    out
}

/// Truncate text to a width, appending an ellipsis when needed.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = text.chars().count();
    if len <= max_width {
        return text.to_string();
    }
    if max_width == 1 {
        return "…".to_string();
    }
    let mut out =
        text.chars().take(max_width.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

/// Compute visible length of a string, ignoring ANSI escape sequences.
pub fn display_len(s: &str) -> usize {
    let mut len = 0;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        len += 1;
    }
    len
}

/// Width of the attached terminal, if stdout is one.
pub fn terminal_columns() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_len_ignores_ansi() {
        assert_eq!(display_len("\x1b[1;31mhi\x1b[0m"), 2);
        assert_eq!(display_len("plain"), 5);
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 6), "hello…");
        assert_eq!(truncate_with_ellipsis("hello", 1), "…");
        assert_eq!(truncate_with_ellipsis("hello", 0), "");
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let headers = vec!["ID".to_string(), "Note".to_string()];
        let rows = vec![
            vec!["n-1".to_string(), "short".to_string()],
            vec!["n-22".to_string(), "longer text".to_string()],
        ];
        let out = render_table(&headers, &rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID   | Note");
        assert!(lines[1].starts_with("====="));
        assert_eq!(lines[2], "n-1  | short");
        assert_eq!(lines[3], "n-22 | longer text");
    }
}

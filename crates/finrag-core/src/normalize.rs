//! Text normalization applied to document content before chunking.
//!
//! Extracted text tends to carry ragged whitespace (hard line wraps, tabs,
//! runs of blank lines) and stray non-ASCII glyphs from PDF ligatures and
//! box-drawing. Normalization reduces it to single-spaced printable ASCII.

/// Collapse whitespace and drop characters outside printable ASCII.
///
/// Every whitespace character counts as a space, anything outside
/// `0x20..=0x7E` is removed, runs of spaces become one space, and the
/// result is trimmed. Whitespace-only input yields an empty string.
///
/// ```rust
/// use finrag_core::normalize::normalize_text;
///
/// assert_eq!(normalize_text("  Net\tincome\n\n rose  "), "Net income rose");
/// assert_eq!(normalize_text("caf\u{e9} \u{2014} bar"), "caf bar");
/// ```
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if (' '..='~').contains(&c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t\r\n "), "");
    }

    #[test]
    fn test_collapses_runs() {
        assert_eq!(normalize_text("a\n\n\nb    c\t\td"), "a b c d");
    }

    #[test]
    fn test_removes_non_ascii_without_double_spaces() {
        assert_eq!(normalize_text("Revenue \u{2022} grew"), "Revenue grew");
        assert_eq!(normalize_text("\u{feff}Header"), "Header");
    }

    #[test]
    fn test_drops_control_characters() {
        assert_eq!(normalize_text("bell\u{7}ring"), "bellring");
    }

    #[test]
    fn test_keeps_table_pipes() {
        assert_eq!(
            normalize_text("Q1 | 10%\nQ2 | 12%\n"),
            "Q1 | 10% Q2 | 12%"
        );
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text(" x \u{e9}\n y ");
        assert_eq!(normalize_text(&once), once);
    }
}

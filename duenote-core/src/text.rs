//! Length limits for notification text.

/// Platform-safe title length.
pub const TITLE_MAX_CHARS: usize = 64;
/// Platform-safe body length for individual notifications.
pub const BODY_MAX_CHARS: usize = 240;

const ELLIPSIS: char = '…';

/// Truncate to at most `max` chars (not bytes), ending in an ellipsis when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("Quiz 3", 10), "Quiz 3");
    }

    #[test]
    fn counts_chars_not_bytes() {
        let s = "Übungsblatt für Analysis";
        let out = truncate_chars(s, 12);
        assert_eq!(out.chars().count(), 12);
        assert!(out.ends_with('…'));
        assert!(out.starts_with("Übungsblatt"));
    }

    #[test]
    fn trailing_space_is_not_kept_before_ellipsis() {
        assert_eq!(truncate_chars("Read chapter four", 6), "Read…");
    }
}

//! String utilities for the domain layer.

/// Truncate a string to a maximum byte length with ellipsis.
///
/// Never splits a UTF-8 character; used for log and transcript previews of
/// tool payloads.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3).min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

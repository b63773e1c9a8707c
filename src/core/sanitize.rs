//! Display-safe rendering of identifiers taken from analyzed source.

/// Escape the characters that matter to an HTML renderer and cap the length.
///
/// Escaping happens first, so the cap applies to the escaped form and may cut
/// an entity in half; callers only rely on the output being bounded and free
/// of raw markup characters.
pub fn sanitize_name(name: &str, max_len: usize) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    truncate_chars(&escaped, max_len)
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_and_quotes() {
        assert_eq!(
            sanitize_name("<script>\"x\"'y'", 200),
            "&lt;script&gt;&quot;x&quot;&#39;y&#39;"
        );
    }

    #[test]
    fn plain_identifiers_pass_through() {
        assert_eq!(sanitize_name("Widget.render", 200), "Widget.render");
    }

    #[test]
    fn long_names_are_capped() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_name(&long, 200).chars().count(), 200);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}

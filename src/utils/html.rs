use ammonia;

/// Clean user-supplied text using the ammonia library.
///
/// Whitelist-based sanitization: safe tags survive, dangerous tags
/// (<script>, <iframe>) and event-handler attributes are stripped before
/// the text is stored. Fail-safe against stored XSS in any client
/// rendering story or comment bodies.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("hello <script>alert(1)</script>world");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("hello"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_html("just a story"), "just a story");
    }
}

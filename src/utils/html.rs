/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, dangerous tags
/// (like <script>, <iframe>) and event attributes are stripped.
/// Used for course descriptions and chat message text.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans free text and trims it. Returns `None` when nothing is left.
pub fn clean_text(input: &str) -> Option<String> {
    let cleaned = clean_html(input.trim());
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts() {
        assert_eq!(clean_html("hi<script>alert(1)</script>"), "hi");
    }

    #[test]
    fn clean_text_drops_empty_results() {
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text("<script>x</script>"), None);
        assert_eq!(clean_text("  <b>why?</b> "), Some("<b>why?</b>".to_string()));
    }
}

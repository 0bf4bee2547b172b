// src/utils/html.rs

/// Sanitizes admin-entered text with ammonia's whitelist.
///
/// Safe formatting tags survive. Script tags (with their content), iframes
/// and event-handler attributes are removed. Learners' answers and option
/// labels are never passed through here since they are compared verbatim.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_handlers() {
        let cleaned = clean_html(r#"<b onclick="x()">Tarix</b><script>alert(1)</script>"#);
        assert_eq!(cleaned, "<b>Tarix</b>");
    }
}

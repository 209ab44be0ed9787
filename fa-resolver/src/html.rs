//! HTML text helpers

/// Escape a value for use in HTML text or a double-quoted attribute
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text rendering of annotation markup, used when the renderer is unavailable
pub fn plain_paragraph(text: &str) -> String {
    format!("<p>{}</p>", escape(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_leaves_plain_text_alone() {
        assert_eq!(escape("Felis catus"), "Felis catus");
    }

    #[test]
    fn test_plain_paragraph_escapes_markup() {
        assert_eq!(plain_paragraph("[[a|<b>]]"), "<p>[[a|&lt;b&gt;]]</p>");
    }
}

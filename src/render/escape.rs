use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(script)").expect("script close pattern"));

/// Escape text for element content and attribute values.
pub fn escape_html(s: impl AsRef<str>) -> String {
    s.as_ref()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Make data safe to inline inside a `<script>` block.
pub fn escape_script_data(s: impl AsRef<str>) -> String {
    SCRIPT_CLOSE.replace_all(s.as_ref(), r"<\/$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_neutralised() {
        assert_eq!(
            escape_html(r#"<b a="1">&'"#),
            "&lt;b a=&quot;1&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn script_terminators_are_broken_up() {
        assert_eq!(
            escape_script_data(r#"{"s":"</script><script>alert(1)</SCRIPT>"}"#),
            r#"{"s":"<\/script><script>alert(1)<\/SCRIPT>"}"#
        );
    }
}

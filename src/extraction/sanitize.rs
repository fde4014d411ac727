//! Strip markdown code fences from model output before JSON parsing.

use regex::Regex;
use std::sync::OnceLock;

/// Opening fences with a language tag (```` ```json ````) and bare fences.
fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("fence pattern is valid"))
}

/// Remove every code-fence marker and trim surrounding whitespace.
///
/// Total and idempotent; text without fences is only trimmed.
pub fn sanitize(raw: &str) -> String {
    fence_pattern().replace_all(raw, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_json_fence() {
        assert_eq!(sanitize("```json\n[1,2]\n```"), "[1,2]");
    }

    #[test]
    fn test_plain_text_only_trimmed() {
        assert_eq!(sanitize("no fences"), "no fences");
        assert_eq!(sanitize("  \n[\"a\"]\n "), "[\"a\"]");
    }

    #[test]
    fn test_bare_and_other_language_fences() {
        assert_eq!(sanitize("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(sanitize("```JSON\n[]```"), "[]");
        assert_eq!(sanitize("Here you go:\n```json\n[3]\n```\n"), "Here you go:\n\n[3]");
    }

    #[test]
    fn test_idempotent() {
        for input in ["```json\n[1,2]\n```", "no fences", "``````", "  ```js x``` "] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }
}

//! JSON cleanup for LLM replies
//!
//! Two passes, both cheap and deterministic:
//! - Markdown code fence removal (```json ... ```), applied before parsing
//! - Trailing comma removal before `]` / `}`, applied once when parsing fails
//!
//! Commas inside string literals are never touched.

use std::sync::LazyLock;

use regex::Regex;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("valid regex"));

/// Remove Markdown code fences and surrounding whitespace
pub fn strip_code_fences(raw: &str) -> String {
    let without_open = FENCE_OPEN.replace_all(raw, "");
    without_open
        .replace("```", "")
        .trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

/// Drop commas that directly precede a closing bracket or brace
pub fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), r#"{"key": "value"}"#);

        let bare = "```\n[1, 2]\n```\n";
        assert_eq!(strip_code_fences(bare), "[1, 2]");

        assert_eq!(strip_code_fences("  {\"a\": 1}  "), r#"{"a": 1}"#);
    }

    #[test]
    fn test_fence_with_leading_prose() {
        let input = "Here is the result:\n```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "Here is the result:\n{\"a\": 1}");
    }

    #[test]
    fn test_remove_trailing_commas() {
        let input = r#"{"business_rules":[{"id":"BR-001","title":"Test",}]}"#;
        let fixed = remove_trailing_commas(input);
        assert_eq!(fixed, r#"{"business_rules":[{"id":"BR-001","title":"Test"}]}"#);

        let spaced = "[1, 2,\n  ]";
        assert_eq!(remove_trailing_commas(spaced), "[1, 2\n  ]");
    }

    #[test]
    fn test_commas_inside_strings_untouched() {
        let input = r#"{"quote": "a, }", "escaped": "x\",]"}"#;
        assert_eq!(remove_trailing_commas(input), input);
    }
}

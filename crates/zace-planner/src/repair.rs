//! Best-effort JSON extraction and bounded repair (tier 3, §4.2 step 4).

/// Find the first balanced `{...}` payload in `text`, tracking string
/// literals and escapes so braces inside quoted strings are ignored.
pub fn extract_json_payload(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Apply the `attempt`-th repair strategy to `candidate`. Returns `None`
/// once the repair budget's strategies are exhausted.
pub fn repair_json(candidate: &str, attempt: u32) -> Option<String> {
    match attempt {
        0 => Some(strip_trailing_commas(candidate)),
        1 => truncate_to_last_balanced_brace(candidate),
        _ => None,
    }
}

fn strip_trailing_commas(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        output.push(chars[i]);
        i += 1;
    }
    output
}

/// Truncate `input` to the longest prefix that is brace-balanced, closing
/// any still-open braces at the cut point.
fn truncate_to_last_balanced_brace(input: &str) -> Option<String> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_balanced_end = None;

    for (i, ch) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    last_balanced_end = Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    last_balanced_end.map(|end| input[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_balanced_object_ignoring_surrounding_text() {
        let text = r#"here is the plan: {"a": {"b": 1}} trailing words"#;
        assert_eq!(extract_json_payload(text).unwrap(), r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn extract_ignores_braces_inside_strings() {
        let text = r#"{"note": "a { b } c"}"#;
        assert_eq!(extract_json_payload(text).unwrap(), text);
    }

    #[test]
    fn extract_returns_none_without_any_brace() {
        assert!(extract_json_payload("no braces here").is_none());
    }

    #[test]
    fn strip_trailing_commas_removes_before_closing_brace() {
        let out = strip_trailing_commas(r#"{"a":1,"b":2,}"#);
        assert_eq!(out, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn strip_trailing_commas_removes_before_closing_bracket() {
        let out = strip_trailing_commas(r#"[1,2,]"#);
        assert_eq!(out, "[1,2]");
    }

    #[test]
    fn balanced_truncation_cuts_at_last_closed_brace() {
        let out = truncate_to_last_balanced_brace(r#"{"a":1} garbage {"#).unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn repair_budget_exhausts_after_two_strategies() {
        assert!(repair_json("x", 0).is_some());
        assert!(repair_json("x", 1).is_some());
        assert!(repair_json("x", 2).is_none());
    }
}

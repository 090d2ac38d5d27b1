//! # JSON Extraction and Repair
//!
//! Models asked for JSON return it wrapped in prose, Markdown fences, or
//! with small syntax defects. Extraction strips code-fence markers, isolates
//! the first balanced `{...}` or `[...]` span, and parses it; on parse
//! failure a single repair pass fixes trailing commas, comments, and
//! unbalanced brackets before giving up with a `Failed to parse JSON` error.

use serde_json::Value;

/// Extract a JSON value from free-form model text.
pub fn extract_json(text: &str) -> Result<Value, String> {
    let stripped = strip_code_fences(text);
    let candidate = extract_balanced_span(stripped).unwrap_or(stripped);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let repaired = repair_json(candidate);
            serde_json::from_str(&repaired)
                .map_err(|_| format!("Failed to parse JSON: {first_err}"))
        }
    }
}

/// Remove Markdown code-fence markers (```json ... ```), keeping the body.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line
    let body = match after_open.find('\n') {
        Some(idx) => &after_open[idx + 1..],
        None => after_open,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Isolate the first balanced `{...}` or `[...]` span, respecting strings
/// and escapes.
fn extract_balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// One best-effort repair pass: strip comments, drop trailing commas, and
/// append missing closers.
fn repair_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' => {
                    out.push(c);
                    in_string = false;
                }
                _ => out.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                out.push(c);
                in_string = true;
            }
            '/' if chars.peek() == Some(&'/') => {
                // Line comment: consume to end of line
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                // Block comment: consume to closing marker
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '{' => {
                out.push(c);
                stack.push('}');
            }
            '[' => {
                out.push(c);
                stack.push(']');
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                out.push(c);
                stack.pop();
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        drop_trailing_comma(&mut out);
        out.push(closer);
    }
    out
}

/// Remove a trailing comma (ignoring whitespace) from the end of `out`.
fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object_round_trip() {
        let obj = json!({"name": "test", "nested": {"values": [1, 2, 3]}});
        let text = serde_json::to_string(&obj).unwrap();
        assert_eq!(extract_json(&text).unwrap(), obj);
    }

    #[test]
    fn test_fenced_object_round_trip() {
        let obj = json!({"name": "test", "count": 7});
        let text = format!("```json\n{}\n```", serde_json::to_string(&obj).unwrap());
        assert_eq!(extract_json(&text).unwrap(), obj);
    }

    #[test]
    fn test_fence_without_language_tag() {
        let obj = json!([1, 2, 3]);
        let text = format!("```\n{}\n```", serde_json::to_string(&obj).unwrap());
        assert_eq!(extract_json(&text).unwrap(), obj);
    }

    #[test]
    fn test_prose_around_object() {
        let text = r#"Here is the result you asked for:

{"status": "ok", "value": 42}

Let me know if you need anything else."#;
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed["value"], 42);
    }

    #[test]
    fn test_array_extraction() {
        let text = "The items are: [\"a\", \"b\"] as requested";
        assert_eq!(extract_json(text).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"template": "use {{var}} here", "depth": 1}"#;
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed["depth"], 1);
    }

    #[test]
    fn test_repair_trailing_comma() {
        let text = r#"{"a": 1, "b": [1, 2,],}"#;
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed, json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_repair_line_comment() {
        let text = "{\"a\": 1, // model commentary\n\"b\": 2}";
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn test_repair_unbalanced_brackets() {
        let text = r#"{"a": {"b": [1, 2"#;
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn test_unparseable_text_reports_error() {
        let err = extract_json("no json here at all").unwrap_err();
        assert!(err.starts_with("Failed to parse JSON:"), "got: {err}");
    }
}

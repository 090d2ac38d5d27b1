//! # Template Rendering
//!
//! Substitutes `{{variable}}` placeholders in prompt text with values from a
//! JSON object. String values are inserted verbatim; any other JSON value is
//! serialized, so an object variable lands in the prompt as compact JSON.
//! Placeholders with no matching variable are left untouched rather than
//! erased, which makes a half-filled template visible in the audit trail.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex"));

/// Render a template against a JSON object of variables.
///
/// A non-object `variables` value renders nothing and returns the template
/// unchanged.
pub fn render_template(template: &str, variables: &Value) -> String {
    let Some(map) = variables.as_object() else {
        return template.to_string();
    };

    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match map.get(name) {
                Some(Value::String(s)) => Cow::Owned(s.clone()),
                Some(other) => Cow::Owned(other.to_string()),
                // Unknown placeholder stays as written
                None => Cow::Owned(caps[0].to_string()),
            }
        })
        .into_owned()
}

/// Placeholder names referenced by a template, in order of first appearance
pub fn placeholder_names(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_variables_inserted_verbatim() {
        let rendered = render_template(
            "Hello {{name}}, welcome to {{city}}.",
            &json!({"name": "Ada", "city": "London"}),
        );
        assert_eq!(rendered, "Hello Ada, welcome to London.");
    }

    #[test]
    fn test_non_string_variables_serialized() {
        let rendered = render_template(
            "count={{count}} flags={{flags}} nested={{nested}}",
            &json!({"count": 3, "flags": [true, false], "nested": {"a": 1}}),
        );
        assert_eq!(rendered, r#"count=3 flags=[true,false] nested={"a":1}"#);
    }

    #[test]
    fn test_missing_variables_left_as_is() {
        let rendered = render_template("Hello {{name}}!", &json!({"other": "x"}));
        assert_eq!(rendered, "Hello {{name}}!");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let rendered = render_template("{{ name }} and {{  name}}", &json!({"name": "x"}));
        assert_eq!(rendered, "x and x");
    }

    #[test]
    fn test_non_object_variables_render_nothing() {
        let rendered = render_template("Hello {{name}}", &json!("not an object"));
        assert_eq!(rendered, "Hello {{name}}");
    }

    #[test]
    fn test_placeholder_names_deduplicated_in_order() {
        let names = placeholder_names("{{b}} {{a}} {{b}} {{c}}");
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_template_without_placeholders_unchanged() {
        let rendered = render_template("plain text", &json!({"name": "x"}));
        assert_eq!(rendered, "plain text");
    }
}

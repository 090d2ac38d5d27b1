//! # JSON Schema Validation
//!
//! Thin wrapper over the `jsonschema` crate used for two gates in the prompt
//! pipeline: input variables are validated before any model call, and JSON
//! model output is validated before an execution is reported successful.

use serde_json::Value;

/// Validate `instance` against `schema`.
///
/// Returns all violations joined into one message, each prefixed with its
/// instance path. A schema that does not compile is itself reported as a
/// violation.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let compiled = match jsonschema::validator_for(schema) {
        Ok(compiled) => compiled,
        Err(e) => return Err(format!("schema does not compile: {e}")),
    };

    let violations: Vec<String> = compiled
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            if path.is_empty() {
                error.to_string()
            } else {
                format!("{path}: {error}")
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_instance_passes() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        });
        assert!(validate(&schema, &json!({"name": "Ada"})).is_ok());
    }

    #[test]
    fn test_missing_required_field_reported() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        });
        let err = validate(&schema, &json!({})).unwrap_err();
        assert!(err.contains("name"), "unexpected message: {err}");
    }

    #[test]
    fn test_multiple_violations_joined() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "name": {"type": "string"}
            }
        });
        let err = validate(&schema, &json!({"count": "three", "name": 7})).unwrap_err();
        assert!(err.contains("; "), "expected joined violations: {err}");
    }

    #[test]
    fn test_violation_includes_instance_path() {
        let schema = json!({
            "type": "object",
            "properties": {"nested": {"type": "object", "properties": {"n": {"type": "number"}}}}
        });
        let err = validate(&schema, &json!({"nested": {"n": "nan"}})).unwrap_err();
        assert!(err.contains("/nested/n"), "unexpected message: {err}");
    }

    #[test]
    fn test_uncompilable_schema_reported() {
        let schema = json!({"type": "no-such-type"});
        assert!(validate(&schema, &json!({})).is_err());
    }
}

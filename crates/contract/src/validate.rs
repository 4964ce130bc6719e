//! Operation input validation.
//!
//! Pure fail-fast checks of caller-supplied parameters against an operation's
//! declared rules: required fields first (in declaration order), then field types.
//! The first violation is returned; nothing here collects all errors or touches
//! any state.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{FieldType, ValidationRules};

/// First validation failure found in a parameter map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Parameters were not a JSON object.
    #[error("params must be a JSON object, got {actual}")]
    NotAnObject { actual: &'static str },

    /// A required field is absent.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// A required field is present but null.
    #[error("required field '{0}' is null")]
    NullField(String),

    /// A field's runtime type does not match its declared type.
    #[error("field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },
}

/// Checks `params` against `rules`, returning the first failure.
///
/// Type rules constrain fields that are present; pair them with
/// `required_fields` to force presence. A present-but-null field fails its type
/// rule unless the declared type is `any`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered: required fields in
/// declaration order, then typed fields in name order.
pub fn validate_input(
    params: &Map<String, Value>,
    rules: &ValidationRules,
) -> Result<(), ValidationError> {
    for field in &rules.required_fields {
        match params.get(field) {
            None => return Err(ValidationError::MissingField(field.clone())),
            Some(Value::Null) => return Err(ValidationError::NullField(field.clone())),
            Some(_) => {}
        }
    }
    for (field, expected) in &rules.field_types {
        if let Some(value) = params.get(field)
            && !expected.matches(value)
        {
            return Err(ValidationError::TypeMismatch {
                field: field.clone(),
                expected: *expected,
                actual: json_type_name(value),
            });
        }
    }
    Ok(())
}

/// JSON type name as it appears in validation errors.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rules(required: &[&str], types: &[(&str, FieldType)]) -> ValidationRules {
        ValidationRules {
            required_fields: required.iter().map(ToString::to_string).collect(),
            field_types: types
                .iter()
                .map(|(name, ty)| ((*name).to_string(), *ty))
                .collect(),
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_rules_accept_anything() {
        let input = params(json!({"whatever": [1, 2, 3]}));
        assert_eq!(validate_input(&input, &ValidationRules::default()), Ok(()));
    }

    #[test]
    fn missing_required_field_fails_first() {
        let checks = rules(&["customer_id", "amount"], &[("amount", FieldType::Number)]);
        let input = params(json!({"amount": "not-a-number"}));

        // The missing required field wins over the type mismatch.
        assert_eq!(
            validate_input(&input, &checks),
            Err(ValidationError::MissingField("customer_id".to_string())),
        );
    }

    #[test]
    fn null_required_field_is_rejected() {
        let checks = rules(&["customer_id"], &[]);
        let input = params(json!({"customer_id": null}));
        assert_eq!(
            validate_input(&input, &checks),
            Err(ValidationError::NullField("customer_id".to_string())),
        );
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let checks = rules(&[], &[("amount", FieldType::Integer)]);
        let input = params(json!({"amount": 12.5}));
        let err = validate_input(&input, &checks).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'amount' expected integer, got number",
        );
    }

    #[test]
    fn absent_typed_field_passes() {
        let checks = rules(&[], &[("note", FieldType::String)]);
        let input = params(json!({}));
        assert_eq!(validate_input(&input, &checks), Ok(()));
    }

    #[test]
    fn any_accepts_every_type() {
        let checks = rules(&[], &[("blob", FieldType::Any)]);
        for value in [json!(null), json!(1), json!("s"), json!({"k": 1}), json!([1])] {
            let input = params(json!({"blob": value}));
            assert_eq!(validate_input(&input, &checks), Ok(()));
        }
    }

    #[test]
    fn present_null_fails_a_concrete_type_rule() {
        let checks = rules(&[], &[("note", FieldType::String)]);
        let input = params(json!({"note": null}));
        assert!(matches!(
            validate_input(&input, &checks),
            Err(ValidationError::TypeMismatch { .. }),
        ));
    }

    #[test]
    fn valid_input_passes_all_rules() {
        let checks = rules(
            &["customer_id", "amount"],
            &[
                ("amount", FieldType::Number),
                ("customer_id", FieldType::String),
                ("metadata", FieldType::Object),
            ],
        );
        let input = params(json!({
            "customer_id": "c-42",
            "amount": 19.99,
            "metadata": {"source": "web"}
        }));
        assert_eq!(validate_input(&input, &checks), Ok(()));
    }
}

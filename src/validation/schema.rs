//! Custom field schemas.
//!
//! Every event declares a JSON Schema for the extra attributes its tickets
//! carry. Each property may set `"editable": true` to allow the field to be
//! changed after the ticket has been issued. The schema document is checked
//! once when the event is created; tickets are validated against it on
//! creation and again, field by field, whenever an editable value changes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::utils::error::AppError;

const EDITABLE_KEYWORD: &str = "editable";

/// One field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// JSON pointer into the custom fields object, empty for the object itself.
    pub path: String,
    pub message: String,
}

/// A compiled, structurally valid custom fields schema.
pub struct CustomFieldsSchema {
    validator: jsonschema::Validator,
    /// Declared property names and their editable flags.
    properties: BTreeMap<String, bool>,
}

impl std::fmt::Debug for CustomFieldsSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomFieldsSchema")
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CustomFieldsSchema {
    /// Checks the shape of a schema document and compiles it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SchemaError` when the document is not an object
    /// schema, a property declaration is malformed, or the document is not a
    /// valid JSON Schema.
    pub fn compile(raw: &Value) -> Result<Self, AppError> {
        let root = raw
            .as_object()
            .ok_or_else(|| AppError::SchemaError("schema must be a JSON object".into()))?;

        if let Some(ty) = root.get("type") {
            if ty != "object" {
                return Err(AppError::SchemaError(format!(
                    "custom fields schema must describe an object, found type {ty}"
                )));
            }
        }

        let mut properties = BTreeMap::new();
        if let Some(declared) = root.get("properties") {
            let declared = declared.as_object().ok_or_else(|| {
                AppError::SchemaError("\"properties\" must be a JSON object".into())
            })?;

            for (name, schema) in declared {
                let decl = schema.as_object().ok_or_else(|| {
                    AppError::SchemaError(format!("property '{name}' must be a JSON object"))
                })?;
                let editable = match decl.get(EDITABLE_KEYWORD) {
                    None => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(other) => {
                        return Err(AppError::SchemaError(format!(
                            "property '{name}' has a non-boolean editable flag: {other}"
                        )))
                    }
                };
                properties.insert(name.clone(), editable);
            }
        }

        let validator = jsonschema::validator_for(raw)
            .map_err(|e| AppError::SchemaError(e.to_string()))?;

        Ok(Self {
            validator,
            properties,
        })
    }

    /// Collects every violation of the schema, in validator order.
    pub fn violations(&self, fields: &Map<String, Value>) -> Vec<FieldViolation> {
        let instance = Value::Object(fields.clone());
        self.validator
            .iter_errors(&instance)
            .map(|e| FieldViolation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns `AppError::SchemaValidationFailed` with the full violation list
    /// when `fields` does not conform.
    pub fn validate(&self, fields: &Map<String, Value>) -> Result<(), AppError> {
        let violations = self.violations(fields);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::SchemaValidationFailed(violations))
        }
    }

    pub fn is_editable(&self, key: &str) -> bool {
        self.properties.get(key).copied().unwrap_or(false)
    }

    /// Validates the projected custom fields of a ticket and reports the
    /// violations that fall under any of `keys`.
    ///
    /// The whole document is checked with the root validator, so `$ref`
    /// and other references into the schema resolve. Violations elsewhere in
    /// the object are left alone: they predate this update.
    ///
    /// # Errors
    ///
    /// `AppError::InvalidFieldValue` naming the first offending key.
    pub fn check_fields<'a>(
        &self,
        fields: &Map<String, Value>,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), AppError> {
        let violations = self.violations(fields);
        if violations.is_empty() {
            return Ok(());
        }

        for key in keys {
            let pointer = format!("/{}", key.replace('~', "~0").replace('/', "~1"));
            let messages: Vec<&str> = violations
                .iter()
                .filter(|v| {
                    v.path == pointer
                        || v.path
                            .strip_prefix(&pointer)
                            .is_some_and(|rest| rest.starts_with('/'))
                })
                .map(|v| v.message.as_str())
                .collect();
            if !messages.is_empty() {
                return Err(AppError::invalid_field(key, messages.join("; ")));
            }
        }
        Ok(())
    }
}

/// Validates `fields` against `schema` in one step.
///
/// # Errors
///
/// `AppError::SchemaError` for a malformed schema,
/// `AppError::SchemaValidationFailed` for non-conforming fields.
pub fn validate(schema: &Value, fields: &Map<String, Value>) -> Result<(), AppError> {
    CustomFieldsSchema::compile(schema)?.validate(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn shirt_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "shirtSize": { "type": "string", "enum": ["S", "M", "L"], "editable": true },
                "dietary": { "type": "string" },
                "guests": { "type": "integer", "minimum": 0, "editable": false }
            },
            "required": ["shirtSize"]
        })
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_fields_produce_no_violations() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        let data = fields(json!({ "shirtSize": "M", "guests": 2 }));
        assert!(schema.violations(&data).is_empty());
        assert!(schema.validate(&data).is_ok());
    }

    #[test]
    fn test_enum_violation_references_field() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        let violations = schema.violations(&fields(json!({ "shirtSize": "XL" })));

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/shirtSize");
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        let err = schema.validate(&Map::new()).unwrap_err();

        match err {
            AppError::SchemaValidationFailed(violations) => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].message.contains("shirtSize"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        let data = fields(json!({ "shirtSize": "XL", "guests": -1 }));
        let before = data.clone();
        assert_eq!(schema.violations(&data).len(), 2);
        assert_eq!(data, before);
    }

    #[test]
    fn test_malformed_type_is_schema_error() {
        let raw = json!({ "type": "object", "properties": { "a": { "type": "strng" } } });
        assert!(matches!(
            CustomFieldsSchema::compile(&raw),
            Err(AppError::SchemaError(_))
        ));
    }

    #[test]
    fn test_non_object_schema_is_rejected() {
        assert!(matches!(
            CustomFieldsSchema::compile(&json!(["nope"])),
            Err(AppError::SchemaError(_))
        ));
        assert!(matches!(
            CustomFieldsSchema::compile(&json!({ "type": "string" })),
            Err(AppError::SchemaError(_))
        ));
        assert!(matches!(
            CustomFieldsSchema::compile(&json!({ "properties": { "a": 5 } })),
            Err(AppError::SchemaError(_))
        ));
    }

    #[test]
    fn test_editable_flag_must_be_boolean() {
        let raw = json!({ "properties": { "a": { "type": "string", "editable": "yes" } } });
        assert!(matches!(
            CustomFieldsSchema::compile(&raw),
            Err(AppError::SchemaError(_))
        ));
    }

    #[test]
    fn test_editable_flags() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        assert!(schema.is_editable("shirtSize"));
        assert!(!schema.is_editable("dietary"));
        assert!(!schema.is_editable("guests"));
        assert!(!schema.is_editable("unknown"));
    }

    #[test]
    fn test_check_fields_scopes_violations_to_keys() {
        let schema = CustomFieldsSchema::compile(&shirt_schema()).unwrap();
        assert!(schema
            .check_fields(&fields(json!({ "shirtSize": "L" })), ["shirtSize"])
            .is_ok());

        let err = schema
            .check_fields(&fields(json!({ "shirtSize": "XXL" })), ["shirtSize"])
            .unwrap_err();
        match err {
            AppError::InvalidFieldValue { field, .. } => assert_eq!(field, "shirtSize"),
            other => panic!("unexpected error: {other:?}"),
        }

        // an unrelated stale violation does not block the edited key
        assert!(schema
            .check_fields(&fields(json!({ "guests": -1, "shirtSize": "S" })), ["shirtSize"])
            .is_ok());
    }

    #[test]
    fn test_check_fields_resolves_refs() {
        let raw = json!({
            "$defs": { "size": { "enum": ["S", "M", "L"], "type": "string" } },
            "properties": { "shirtSize": { "$ref": "#/$defs/size", "editable": true } },
            "type": "object"
        });
        let schema = CustomFieldsSchema::compile(&raw).unwrap();
        assert!(schema.is_editable("shirtSize"));
        assert!(schema
            .check_fields(&fields(json!({ "shirtSize": "L" })), ["shirtSize"])
            .is_ok());
        assert!(matches!(
            schema.check_fields(&fields(json!({ "shirtSize": "XL" })), ["shirtSize"]),
            Err(AppError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let raw = json!({ "type": "object", "properties": {} });
        assert!(validate(&raw, &fields(json!({ "anything": [1, 2, 3] }))).is_ok());
    }
}

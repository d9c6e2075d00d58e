//! Custom field definitions and the data they govern.
//!
//! Definitions are loaded once per request for the resource's content type
//! and travel in [`SerializerContext`](super::SerializerContext). Rendering
//! emits every defined field; cleaning validates writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ContentType;
use crate::api::{ApiError, ApiResult, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    Text,
    Integer,
    Boolean,
    Select,
}

impl CustomFieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Select => "select",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub weight: i32,
}

impl CustomFieldDefinition {
    /// Check a single value against this definition. `null` is accepted
    /// here; required-ness is checked by the caller.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        let ok = match self.field_type {
            CustomFieldType::Text => value.is_string(),
            CustomFieldType::Integer => value.as_i64().is_some(),
            CustomFieldType::Boolean => value.is_boolean(),
            CustomFieldType::Select => {
                return match value.as_str() {
                    Some(s) if self.choices.iter().any(|c| c == s) => Ok(()),
                    Some(s) => Err(format!("Invalid choice ({s}).")),
                    None => Err("Value must be a string.".to_string()),
                };
            }
        };
        if ok {
            Ok(())
        } else {
            Err(format!("Value must be of type {}.", self.field_type.as_str()))
        }
    }
}

/// Source of custom field definitions.
#[async_trait]
pub trait CustomFieldStore: Send + Sync {
    /// Definitions bound to `content_type`, ordered by weight then name.
    async fn definitions(&self, content_type: &ContentType)
        -> ApiResult<Vec<CustomFieldDefinition>>;
}

/// Store with no definitions, for resources and tests that need none.
pub struct NoCustomFields;

#[async_trait]
impl CustomFieldStore for NoCustomFields {
    async fn definitions(&self, _: &ContentType) -> ApiResult<Vec<CustomFieldDefinition>> {
        Ok(Vec::new())
    }
}

/// Every defined field, `null` when not stored. Stored keys without a
/// definition are dropped.
pub fn render_custom_fields(defs: &[CustomFieldDefinition], stored: &Value) -> Value {
    let mut out = Map::with_capacity(defs.len());
    for def in defs {
        let v = stored.get(&def.name).cloned().unwrap_or(Value::Null);
        out.insert(def.name.clone(), v);
    }
    Value::Object(out)
}

/// Merge `incoming` over `existing` and validate the result.
///
/// On create, defaults fill absent fields and required fields must be
/// non-null. Errors point at `/custom_fields/<name>`.
pub fn clean_custom_fields(
    defs: &[CustomFieldDefinition],
    incoming: Option<&Map<String, Value>>,
    existing: Option<&Value>,
    creating: bool,
) -> ApiResult<Value> {
    let mut errors = Vec::new();
    let pointer = |name: &str| format!("/custom_fields/{name}");

    let mut merged = Map::new();
    if let Some(Value::Object(old)) = existing {
        for def in defs {
            if let Some(v) = old.get(&def.name) {
                merged.insert(def.name.clone(), v.clone());
            }
        }
    }

    if let Some(incoming) = incoming {
        for (key, value) in incoming {
            match defs.iter().find(|d| &d.name == key) {
                None => errors.push(ValidationError::new(
                    pointer(key),
                    format!("Unknown field name '{key}' in custom field data."),
                )),
                Some(def) => match def.check(value) {
                    Ok(()) => {
                        merged.insert(key.clone(), value.clone());
                    }
                    Err(detail) => errors.push(ValidationError::new(pointer(key), detail)),
                },
            }
        }
    }

    for def in defs {
        if creating && !merged.contains_key(&def.name) {
            if let Some(default) = &def.default {
                merged.insert(def.name.clone(), default.clone());
            }
        }
        let missing = merged.get(&def.name).map_or(true, Value::is_null);
        if def.required && missing && (creating || merged.contains_key(&def.name)) {
            errors.push(ValidationError::new(
                pointer(&def.name),
                "Required field cannot be empty.",
            ));
        }
    }

    if errors.is_empty() {
        Ok(Value::Object(merged))
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defs() -> Vec<CustomFieldDefinition> {
        vec![
            CustomFieldDefinition {
                name: "contract".into(),
                field_type: CustomFieldType::Text,
                required: false,
                default: Some(json!("none")),
                choices: vec![],
                weight: 100,
            },
            CustomFieldDefinition {
                name: "tier".into(),
                field_type: CustomFieldType::Select,
                required: true,
                default: None,
                choices: vec!["gold".into(), "silver".into()],
                weight: 200,
            },
        ]
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn render_fills_missing_and_drops_unknown() {
        let out = render_custom_fields(&defs(), &json!({"tier": "gold", "stale": 1}));
        assert_eq!(out, json!({"contract": null, "tier": "gold"}));
    }

    #[test]
    fn create_applies_defaults() {
        let cleaned =
            clean_custom_fields(&defs(), Some(&obj(json!({"tier": "gold"}))), None, true).unwrap();
        assert_eq!(cleaned, json!({"contract": "none", "tier": "gold"}));
    }

    #[test]
    fn create_requires_required_fields() {
        let err = clean_custom_fields(&defs(), None, None, true).unwrap_err();
        match err {
            ApiError::Validation(errs) => {
                assert_eq!(errs.len(), 1);
                assert_eq!(errs[0].pointer, "/custom_fields/tier");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn update_keeps_existing_and_checks_types() {
        let existing = json!({"tier": "silver", "contract": "c-1"});
        let cleaned = clean_custom_fields(
            &defs(),
            Some(&obj(json!({"contract": "c-2"}))),
            Some(&existing),
            false,
        )
        .unwrap();
        assert_eq!(cleaned, json!({"contract": "c-2", "tier": "silver"}));

        let err = clean_custom_fields(
            &defs(),
            Some(&obj(json!({"tier": "bronze", "nope": 1}))),
            Some(&existing),
            false,
        )
        .unwrap_err();
        match err {
            ApiError::Validation(errs) => assert_eq!(errs.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Input schemas for tool calls: declaration, JSON rendering for
//! `tools/list`, and validation before dispatch.

use agent_coord_common::error::{CoordError, Result};
use serde_json::{json, Map, Value};

/// Upper bound on any string argument.
pub const MAX_STRING_LEN: usize = 512;
/// Upper bound on any array argument.
pub const MAX_ARRAY_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    StringArray,
}

impl FieldType {
    fn json_name(&self) -> Value {
        match self {
            FieldType::String => json!("string"),
            FieldType::Number => json!("number"),
            FieldType::Boolean => json!("boolean"),
            FieldType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    pub required: bool,
    pub enum_values: &'static [&'static str],
    pub range: Option<(f64, f64)>,
}

impl Field {
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::String,
            description,
            required: false,
            enum_values: &[],
            range: None,
        }
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self {
            field_type: FieldType::Number,
            ..Self::string(name, description)
        }
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self {
            field_type: FieldType::Boolean,
            ..Self::string(name, description)
        }
    }

    pub fn string_array(name: &'static str, description: &'static str) -> Self {
        Self {
            field_type: FieldType::StringArray,
            ..Self::string(name, description)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.enum_values = values;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// Flat-object input schema for one tool.
#[derive(Debug, Clone)]
pub struct InputSchema {
    pub fields: Vec<Field>,
}

impl InputSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Render the MCP `inputSchema` object.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut prop = match field.field_type {
                FieldType::StringArray => {
                    // array type already carries its item shape
                    match field.field_type.json_name() {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    }
                }
                _ => {
                    let mut map = Map::new();
                    map.insert("type".to_string(), field.field_type.json_name());
                    map
                }
            };
            prop.insert("description".to_string(), json!(field.description));
            if !field.enum_values.is_empty() {
                prop.insert("enum".to_string(), json!(field.enum_values));
            }
            if let Some((min, max)) = field.range {
                prop.insert("minimum".to_string(), json!(min));
                prop.insert("maximum".to_string(), json!(max));
            }
            properties.insert(field.name.to_string(), Value::Object(prop));
            if field.required {
                required.push(field.name);
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        Value::Object(schema)
    }

    /// Validate inbound arguments. Rejection happens before any state
    /// mutation; the error message names the offending field.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let object = match args {
            Value::Null => return self.check_required_absent(),
            Value::Object(map) => map,
            _ => return Err(CoordError::validation("arguments must be an object")),
        };

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(CoordError::validation(format!(
                            "missing required field: {}",
                            field.name
                        )));
                    }
                }
                Some(value) => validate_value(field, value)?,
            }
        }
        Ok(())
    }

    fn check_required_absent(&self) -> Result<()> {
        if let Some(field) = self.fields.iter().find(|f| f.required) {
            return Err(CoordError::validation(format!(
                "missing required field: {}",
                field.name
            )));
        }
        Ok(())
    }
}

fn validate_value(field: &Field, value: &Value) -> Result<()> {
    match field.field_type {
        FieldType::String => {
            let Some(s) = value.as_str() else {
                return Err(type_error(field, "a string"));
            };
            check_string(field.name, s)?;
            if !field.enum_values.is_empty() && !field.enum_values.contains(&s) {
                return Err(CoordError::validation(format!(
                    "{} must be one of: {}",
                    field.name,
                    field.enum_values.join(", ")
                )));
            }
        }
        FieldType::Number => {
            let Some(n) = value.as_f64() else {
                return Err(type_error(field, "a number"));
            };
            if let Some((min, max)) = field.range {
                if n < min || n > max {
                    return Err(CoordError::validation(format!(
                        "{} must be between {} and {}",
                        field.name, min, max
                    )));
                }
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                return Err(type_error(field, "a boolean"));
            }
        }
        FieldType::StringArray => {
            let Some(items) = value.as_array() else {
                return Err(type_error(field, "an array of strings"));
            };
            if items.len() > MAX_ARRAY_LEN {
                return Err(CoordError::validation(format!(
                    "{} exceeds {} entries",
                    field.name, MAX_ARRAY_LEN
                )));
            }
            for item in items {
                let Some(s) = item.as_str() else {
                    return Err(type_error(field, "an array of strings"));
                };
                check_string(field.name, s)?;
            }
        }
    }
    Ok(())
}

fn check_string(name: &str, s: &str) -> Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(CoordError::validation(format!(
            "{} exceeds {} characters",
            name, MAX_STRING_LEN
        )));
    }
    Ok(())
}

fn type_error(field: &Field, expected: &str) -> CoordError {
    CoordError::validation(format!("{} must be {}", field.name, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InputSchema {
        InputSchema::new(vec![
            Field::string("agentId", "Agent identifier").required(),
            Field::string("status", "Agent status")
                .one_of(&["idle", "working", "blocked", "completed"]),
            Field::number("progress", "Progress percentage").range(0.0, 100.0),
            Field::string_array("files", "Files to touch"),
            Field::boolean("includeInactive", "Include inactive agents"),
        ])
    }

    #[test]
    fn accepts_valid_args() {
        let schema = sample();
        let args = json!({
            "agentId": "a1",
            "status": "working",
            "progress": 40,
            "files": ["src/a.rs"],
            "includeInactive": true,
        });
        assert!(schema.validate(&args).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = sample().validate(&json!({"status": "idle"})).unwrap_err();
        assert!(err.to_string().contains("agentId"));
    }

    #[test]
    fn rejects_bad_enum_value() {
        let args = json!({"agentId": "a1", "status": "napping"});
        assert!(sample().validate(&args).is_err());
    }

    #[test]
    fn rejects_out_of_range_progress() {
        let args = json!({"agentId": "a1", "progress": 150});
        assert!(sample().validate(&args).is_err());
    }

    #[test]
    fn rejects_oversized_string() {
        let args = json!({"agentId": "x".repeat(MAX_STRING_LEN + 1)});
        assert!(sample().validate(&args).is_err());
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(sample().validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn null_arguments_ok_without_required_fields() {
        let schema = InputSchema::new(vec![Field::boolean("flag", "Optional flag")]);
        assert!(schema.validate(&Value::Null).is_ok());
    }

    #[test]
    fn renders_mcp_schema_shape() {
        let rendered = sample().to_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["files"]["type"], "array");
        assert_eq!(rendered["required"], json!(["agentId"]));
        assert_eq!(rendered["properties"]["progress"]["maximum"], json!(100.0));
    }
}

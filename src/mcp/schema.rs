//! Tool input schemas.
//!
//! Builder methods for [`MCPToolInputSchema`] and the argument preparation
//! step run before every handler: lenient type coercion followed by
//! required-field checks.

use serde_json::{json, Map, Number, Value};

use super::error::{McpError, McpResult};
use super::protocol::MCPToolInputSchema;

impl Default for MCPToolInputSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl MCPToolInputSchema {
    /// Empty object schema.
    pub fn object() -> Self {
        Self { schema_type: "object".to_string(), properties: Map::new(), required: Vec::new() }
    }

    /// Add a property with an explicit JSON Schema.
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required && !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string property.
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "string", "description": description}), required)
    }

    /// Add an integer property.
    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "integer", "description": description}), required)
    }

    /// Add a boolean property.
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, json!({"type": "boolean", "description": description}), required)
    }

    /// Add a string-array property.
    pub fn string_array(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "array", "items": {"type": "string"}, "description": description}),
            required,
        )
    }

    /// Add a string property restricted to fixed values.
    pub fn enumeration(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "enum": values, "description": description}),
            required,
        )
    }

    /// Coerce and validate raw tool arguments.
    ///
    /// Missing or `null` arguments become an empty object. Declared
    /// properties are coerced towards their schema type where that is
    /// lossless; undeclared properties pass through untouched.
    pub fn prepare(&self, params: Option<Value>) -> McpResult<Value> {
        let mut args = match params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(McpError::validation("parameters must be a JSON object")),
        };

        for (name, schema) in &self.properties {
            if let Some(value) = args.get_mut(name) {
                coerce(value, schema);
            }
        }

        for name in &self.required {
            match args.get(name) {
                None | Some(Value::Null) => return Err(McpError::missing_field(name)),
                Some(_) => {}
            }
        }

        for (name, schema) in &self.properties {
            if let Some(value) = args.get(name) {
                check_type(name, value, schema)?;
            }
        }

        Ok(Value::Object(args))
    }
}

fn coerce(value: &mut Value, schema: &Value) {
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return;
    };

    let coerced = match (expected, &*value) {
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("number", Value::String(s)) => {
            s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("array", Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
            Some(Value::Array(vec![value.clone()]))
        }
        _ => None,
    };
    if let Some(coerced) = coerced {
        *value = coerced;
    }

    if let (Value::Array(items), Some(item_schema)) = (&mut *value, schema.get("items")) {
        for item in items {
            coerce(item, item_schema);
        }
    }
}

fn check_type(name: &str, value: &Value, schema: &Value) -> McpResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let ok = match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    };
    if !ok {
        return Err(McpError::validation(format!("field '{name}' must be of type {expected}")));
    }

    if let (Some(allowed), Some(s)) = (schema.get("enum").and_then(Value::as_array), value.as_str()) {
        if !allowed.iter().any(|a| a.as_str() == Some(s)) {
            return Err(McpError::validation(format!("field '{name}' has unsupported value '{s}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> MCPToolInputSchema {
        MCPToolInputSchema::object()
            .string("name", "Tag name", true)
            .integer("limit", "Page size", false)
            .boolean("erase", "Erase disks", false)
            .string_array("tags", "Tags", false)
            .enumeration("stop_mode", "Stop mode", &["soft", "hard"], false)
    }

    #[test]
    fn test_missing_required_field() {
        let err = schema().prepare(Some(json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "missing required field 'name'");

        let err = schema().prepare(None).unwrap_err();
        assert!(err.to_string().contains("'name'"));

        let err = schema().prepare(Some(json!({"name": null}))).unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_coercion() {
        let args = schema()
            .prepare(Some(json!({"name": 42, "limit": "10", "erase": "TRUE", "tags": "gpu"})))
            .unwrap();
        assert_eq!(args, json!({"name": "42", "limit": 10, "erase": true, "tags": ["gpu"]}));
    }

    #[test]
    fn test_uncoercible_value_is_rejected() {
        let err = schema().prepare(Some(json!({"name": "a", "limit": "ten"}))).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_enum_is_enforced() {
        assert!(schema().prepare(Some(json!({"name": "a", "stop_mode": "soft"}))).is_ok());
        assert!(schema().prepare(Some(json!({"name": "a", "stop_mode": "gentle"}))).is_err());
    }

    #[test]
    fn test_non_object_params() {
        assert!(schema().prepare(Some(json!([1, 2]))).is_err());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let args = schema().prepare(Some(json!({"name": "a", "extra": 1}))).unwrap();
        assert_eq!(args["extra"], 1);
    }

    #[test]
    fn test_schema_serialization() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["required"], json!(["name"]));
        assert_eq!(value["properties"]["tags"]["items"]["type"], "string");
    }
}

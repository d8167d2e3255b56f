//! # Tool definitions
//!
//! A [`Tool`] pairs a static [`ToolDescriptor`] (name, description, parameter
//! schema) with a handler. Handlers are always stored as functions returning a
//! pinned, boxed future; synchronous handlers are wrapped in an already-ready
//! future so both shapes produce the same result type.
//!
//! ## Arguments
//!
//! Arguments arrive from the model as generic JSON. Before a handler runs,
//! [`coerce_arguments`] converts each value to the type its schema declares
//! (`"21"` becomes `21` for a number parameter, `"true"` becomes `true` for a
//! boolean) and enforces `enum` and `required`. Handlers then read them through
//! [`ToolArgs`], whose getters fail with a typed [`Error::ToolArgument`] instead
//! of silently defaulting.
//!
//! ```rust,no_run
//! use ollama_chat::tool;
//!
//! let weather = tool("get_current_weather", "Get the current weather for a location")
//!     .param_desc("location", "string", "The location, e.g. San Francisco, CA")
//!     .enum_param("format", &["celsius", "fahrenheit"], "Temperature unit")
//!     .build_sync(|args| {
//!         let location = args.str("location")?;
//!         let unit = args.str("format")?;
//!         Ok(format!("21 °{} in {}", if unit == "celsius" { "C" } else { "F" }, location).into())
//!     });
//! ```

use crate::types::ToolCall;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Static declaration of a tool, serialized into the request's `tools` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Object schema describing a tool's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Schema of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl Property {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: normalize_type(kind).to_string(),
            description: None,
            allowed: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ParameterSchema {
    /// Build a schema from JSON.
    ///
    /// Accepts a full object schema (`{"type": "object", "properties": ...}`),
    /// simple notation (`{"location": "string"}`), or per-property objects that
    /// may carry `"optional": true` / `"required": false`. Simple-notation
    /// parameters are required; object properties are required unless marked
    /// optional or given a `default`. Non-object input yields an empty schema.
    pub fn from_json(schema: Value) -> Result<Self> {
        let Value::Object(obj) = schema else {
            return Ok(Self::default());
        };

        if obj.contains_key("type") && obj.contains_key("properties") {
            return Ok(serde_json::from_value(Value::Object(obj))?);
        }

        let mut result = Self::default();
        for (name, entry) in obj {
            match entry {
                Value::String(type_str) => {
                    result.properties.insert(name.clone(), Property::new(&type_str));
                    result.required.push(name);
                }
                Value::Object(mut prop) => {
                    let is_optional = prop
                        .remove("optional")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    let is_required = prop.remove("required").and_then(|v| v.as_bool());
                    let has_default = prop.contains_key("default");

                    let mut property: Property = serde_json::from_value(Value::Object(prop))?;
                    property.kind = normalize_type(&property.kind).to_string();
                    result.properties.insert(name.clone(), property);

                    if let Some(true) = is_required {
                        result.required.push(name);
                    } else if is_optional || is_required == Some(false) {
                        // optional
                    } else if !has_default {
                        result.required.push(name);
                    }
                }
                _ => {
                    return Err(Error::invalid_input(format!(
                        "schema entry '{}' must be a type name or an object",
                        name
                    )));
                }
            }
        }
        Ok(result)
    }
}

/// Map loose type names onto JSON Schema types. Unknown names fall back to "string".
fn normalize_type(type_str: &str) -> &'static str {
    match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    }
}

// ============================================================================
// ARGUMENTS
// ============================================================================

/// Typed view over a tool call's (already coerced) arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(tool: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::tool_argument(&self.tool, name, "missing required argument"))
    }

    fn mismatch(&self, name: &str, expected: &str, got: &Value) -> Error {
        Error::tool_argument(&self.tool, name, format!("expected {}, got {}", expected, got))
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| self.mismatch(name, "string", value))
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| self.mismatch(name, "number", value))
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        let value = self.require(name)?;
        value.as_i64().ok_or_else(|| self.mismatch(name, "integer", value))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| self.mismatch(name, "boolean", value))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str(name).map(Some),
        }
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.f64(name).map(Some),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.bool(name).map(Some),
        }
    }
}

/// Convert raw arguments to the types declared by `descriptor`.
///
/// Arguments not declared in the schema pass through untouched. A `null`
/// optional argument is dropped.
pub fn coerce_arguments(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let tool = &descriptor.function.name;
    let schema = &descriptor.function.parameters;
    let mut coerced = Map::new();

    for (name, value) in arguments {
        let Some(property) = schema.properties.get(name) else {
            coerced.insert(name.clone(), value.clone());
            continue;
        };
        if value.is_null() {
            continue;
        }

        let converted = coerce_value(&property.kind, value)
            .ok_or_else(|| {
                Error::tool_argument(
                    tool,
                    name,
                    format!("cannot convert {} to {}", value, property.kind),
                )
            })?;

        if let Some(allowed) = &property.allowed {
            let as_text = match &converted {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !allowed.iter().any(|a| a == &as_text) {
                return Err(Error::tool_argument(
                    tool,
                    name,
                    format!("'{}' is not one of [{}]", as_text, allowed.join(", ")),
                ));
            }
        }

        coerced.insert(name.clone(), converted);
    }

    for name in &schema.required {
        if !coerced.contains_key(name) {
            return Err(Error::tool_argument(tool, name, "missing required argument"));
        }
    }

    Ok(coerced)
}

fn coerce_value(kind: &str, value: &Value) -> Option<Value> {
    match (kind, value) {
        ("string", Value::String(_)) => Some(value.clone()),
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),

        ("number", Value::Number(_)) => Some(value.clone()),
        ("number", Value::String(s)) => {
            let parsed: f64 = s.trim().parse().ok()?;
            Number::from_f64(parsed).map(Value::Number)
        }

        ("integer", Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(value.clone())
            } else {
                let f = n.as_f64()?;
                let in_range = f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64;
                (in_range && f.fract() == 0.0).then(|| Value::from(f as i64))
            }
        }
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

        ("boolean", Value::Bool(_)) => Some(value.clone()),
        ("boolean", Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        ("array", Value::Array(_)) | ("object", Value::Object(_)) => Some(value.clone()),
        ("array", Value::String(s)) => match serde_json::from_str(s).ok()? {
            parsed @ Value::Array(_) => Some(parsed),
            _ => None,
        },
        ("object", Value::String(s)) => match serde_json::from_str(s).ok()? {
            parsed @ Value::Object(_) => Some(parsed),
            _ => None,
        },

        ("string" | "number" | "integer" | "boolean" | "array" | "object", _) => None,
        _ => Some(value.clone()),
    }
}

// ============================================================================
// TOOLS
// ============================================================================

pub type ToolHandler =
    Arc<dyn Fn(ToolArgs) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// An invocable capability: descriptor plus handler.
#[derive(Clone)]
pub struct Tool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool with an async handler.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            descriptor: ToolDescriptor {
                kind: "function".to_string(),
                function: FunctionDescriptor {
                    name: name.into(),
                    description: description.into(),
                    parameters,
                },
            },
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Create a tool with a synchronous handler.
    pub fn new_sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, description, parameters, move |args| {
            futures::future::ready(handler(args))
        })
    }

    /// Run the handler on already-coerced arguments.
    pub async fn execute(&self, args: ToolArgs) -> Result<Value> {
        (self.handler)(args).await
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.function.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.function.description
    }

    pub fn parameters(&self) -> &ParameterSchema {
        &self.descriptor.function.parameters
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool: ToolDescriptor,
    pub tool_call: ToolCall,
    pub result: Value,
}

/// Fluent construction of a [`Tool`], usually started with [`tool`].
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: ParameterSchema,
}

impl ToolBuilder {
    /// Start a tool with an empty parameter schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: ParameterSchema::default(),
        }
    }

    /// Replace the schema entirely.
    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Add a required parameter by type name.
    pub fn param(self, name: &str, type_str: &str) -> Self {
        self.property(name, Property::new(type_str), true)
    }

    /// Add a required parameter with a description.
    pub fn param_desc(self, name: &str, type_str: &str, description: &str) -> Self {
        self.property(name, Property::new(type_str).with_description(description), true)
    }

    /// Add an optional parameter.
    pub fn optional_param(self, name: &str, type_str: &str, description: &str) -> Self {
        self.property(name, Property::new(type_str).with_description(description), false)
    }

    /// Add a required string parameter restricted to `values`.
    pub fn enum_param(self, name: &str, values: &[&str], description: &str) -> Self {
        let property = Property::new("string")
            .with_description(description)
            .with_enum(values);
        self.property(name, property, true)
    }

    /// Add a fully specified property.
    ///
    /// Re-adding a name replaces the earlier property, and its required flag
    /// follows the latest call.
    pub fn property(mut self, name: &str, property: Property, required: bool) -> Self {
        self.schema.properties.insert(name.to_string(), property);
        self.schema.required.retain(|r| r != name);
        if required {
            self.schema.required.push(name.to_string());
        }
        self
    }

    /// Finish with an async handler.
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }

    /// Finish with a blocking handler. It runs inline on the invoking task,
    /// so keep it short.
    pub fn build_sync<F>(self, handler: F) -> Tool
    where
        F: Fn(ToolArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Tool::new_sync(self.name, self.description, self.schema, handler)
    }
}

/// Begin building a tool.
///
/// ```
/// use ollama_chat::tool;
/// use serde_json::json;
///
/// let add = tool("add", "Add two numbers")
///     .param("a", "number")
///     .param("b", "number")
///     .build_sync(|args| Ok(json!(args.f64("a")? + args.f64("b")?)));
/// assert_eq!(add.name(), "add");
/// ```
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_tool() -> Tool {
        tool("get_current_weather", "Get the weather")
            .param_desc("location", "string", "City and state")
            .enum_param("format", &["celsius", "fahrenheit"], "Unit")
            .optional_param("days", "integer", "Forecast days")
            .build_sync(|args| Ok(json!(args.str("location")?)))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("str"), "string");
        assert_eq!(normalize_type("i64"), "integer");
        assert_eq!(normalize_type("f32"), "number");
        assert_eq!(normalize_type("bool"), "boolean");
        assert_eq!(normalize_type("whatever"), "string");
    }

    #[test]
    fn test_descriptor_serialization() {
        let json = serde_json::to_value(weather_tool().descriptor()).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_current_weather");
        assert_eq!(json["function"]["parameters"]["type"], "object");
        assert_eq!(
            json["function"]["parameters"]["properties"]["format"]["enum"],
            json!(["celsius", "fahrenheit"])
        );
        assert_eq!(
            json["function"]["parameters"]["required"],
            json!(["location", "format"])
        );
    }

    #[test]
    fn test_schema_from_simple_notation() {
        let schema = ParameterSchema::from_json(json!({"a": "number", "b": "float"})).unwrap();
        assert_eq!(schema.properties["a"].kind, "number");
        assert_eq!(schema.properties["b"].kind, "number");
        assert_eq!(schema.required, vec!["a", "b"]);
    }

    #[test]
    fn test_schema_from_extended_notation() {
        let schema = ParameterSchema::from_json(json!({
            "query": {"type": "string", "description": "Search query"},
            "limit": {"type": "int", "optional": true},
            "page": {"type": "integer", "default": 1}
        }))
        .unwrap();
        assert_eq!(schema.properties["limit"].kind, "integer");
        assert_eq!(schema.required, vec!["query"]);
    }

    #[test]
    fn test_schema_from_full_json_schema() {
        let full = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        let schema = ParameterSchema::from_json(full).unwrap();
        assert_eq!(schema.required, vec!["name"]);
    }

    #[test]
    fn test_coerce_string_to_number_and_integer() {
        let descriptor = tool("t", "")
            .param("x", "number")
            .param("n", "integer")
            .build_sync(|_| Ok(Value::Null))
            .descriptor()
            .clone();
        let coerced = coerce_arguments(&descriptor, &args(json!({"x": "2.5", "n": "7"}))).unwrap();
        assert_eq!(coerced["x"], json!(2.5));
        assert_eq!(coerced["n"], json!(7));
    }

    #[test]
    fn test_coerce_bool_and_string() {
        let descriptor = tool("t", "")
            .param("flag", "boolean")
            .param("label", "string")
            .build_sync(|_| Ok(Value::Null))
            .descriptor()
            .clone();
        let coerced =
            coerce_arguments(&descriptor, &args(json!({"flag": "TRUE", "label": 12}))).unwrap();
        assert_eq!(coerced["flag"], json!(true));
        assert_eq!(coerced["label"], json!("12"));
    }

    #[test]
    fn test_coerce_failure_is_typed() {
        let descriptor = tool("add", "")
            .param("a", "number")
            .build_sync(|_| Ok(Value::Null))
            .descriptor()
            .clone();
        let err = coerce_arguments(&descriptor, &args(json!({"a": "lots"}))).unwrap_err();
        match err {
            Error::ToolArgument { tool, parameter, .. } => {
                assert_eq!(tool, "add");
                assert_eq!(parameter, "a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_coerce_enforces_enum_and_required() {
        let descriptor = weather_tool().descriptor().clone();

        let err = coerce_arguments(
            &descriptor,
            &args(json!({"location": "Paris", "format": "kelvin"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("kelvin"));

        let err = coerce_arguments(&descriptor, &args(json!({"format": "celsius"}))).unwrap_err();
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn test_coerce_drops_null_optional_and_keeps_unknown() {
        let descriptor = weather_tool().descriptor().clone();
        let coerced = coerce_arguments(
            &descriptor,
            &args(json!({"location": "Paris", "format": "celsius", "days": null, "extra": [1]})),
        )
        .unwrap();
        assert!(!coerced.contains_key("days"));
        assert_eq!(coerced["extra"], json!([1]));
    }

    #[test]
    fn test_coerce_integer_rejects_out_of_range() {
        let counter = tool("count", "")
            .param("n", "integer")
            .build_sync(|_| Ok(json!(null)));

        let err = coerce_arguments(counter.descriptor(), &args(json!({"n": 1e30}))).unwrap_err();
        assert!(matches!(err, Error::ToolArgument { ref parameter, .. } if parameter == "n"));
        assert!(coerce_arguments(counter.descriptor(), &args(json!({"n": -1e30}))).is_err());
        assert!(coerce_arguments(counter.descriptor(), &args(json!({"n": 2.5}))).is_err());

        let coerced = coerce_arguments(counter.descriptor(), &args(json!({"n": 4.0}))).unwrap();
        assert_eq!(coerced["n"], json!(4));
    }

    #[test]
    fn test_tool_args_getters() {
        let args = ToolArgs::new("t", args(json!({"s": "x", "n": 3, "f": 1.5, "b": false})));
        assert_eq!(args.str("s").unwrap(), "x");
        assert_eq!(args.i64("n").unwrap(), 3);
        assert_eq!(args.f64("f").unwrap(), 1.5);
        assert!(!args.bool("b").unwrap());
        assert_eq!(args.opt_str("missing").unwrap(), None);
        assert!(matches!(args.str("n"), Err(Error::ToolArgument { .. })));
        assert!(matches!(args.f64("missing"), Err(Error::ToolArgument { .. })));
    }

    #[tokio::test]
    async fn test_sync_and_async_tools_share_result_shape() {
        let sync_tool = tool("double", "")
            .param("x", "number")
            .build_sync(|args| Ok(json!(args.f64("x")? * 2.0)));
        let async_tool = tool("double", "")
            .param("x", "number")
            .build(|args| async move { Ok(json!(args.f64("x")? * 2.0)) });

        let input = ToolArgs::new("double", args(json!({"x": 4.0})));
        assert_eq!(sync_tool.execute(input.clone()).await.unwrap(), json!(8.0));
        assert_eq!(async_tool.execute(input).await.unwrap(), json!(8.0));
    }
}

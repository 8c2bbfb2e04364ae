//! Tool contract for domain agents.
//!
//! A tool is a name, a description shown to the model, a typed
//! [`ParameterSchema`] and an async body that turns bound [`ToolArgs`]
//! into a string. The reasoning loop hands the model's raw action input to
//! [`ParameterSchema::bind`] as an [`ActionInput`]; binding is where typed
//! argument checking happens, so tool bodies read already-validated values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ToolError;

/// A tool definition rendered for the model's tool catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique within an agent).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// JSON-Schema primitive type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Any JSON number.
    Number,
    /// Whole number.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParamType {
    /// JSON-Schema type keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Checks `value` against this type, coercing numeric and boolean
    /// strings (models often quote scalars).
    #[allow(clippy::cast_possible_truncation)]
    fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (Self::String, v @ Value::String(_))
            | (Self::Boolean, v @ Value::Bool(_))
            | (Self::Array, v @ Value::Array(_))
            | (Self::Object, v @ Value::Object(_))
            | (Self::Number, v @ Value::Number(_)) => Some(v),
            (Self::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(Value::Number(n))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| json!(f as i64))
                }
            }
            (Self::Number, Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| json!(f)),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Array, Value::String(s)) => Some(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub param_type: ParamType,
    /// Description shown to the model.
    pub description: String,
    /// Allowed values (strings only); empty means unrestricted.
    pub enum_values: Vec<String>,
    /// Value filled in when the argument is absent.
    pub default: Option<Value>,
}

impl ParamSpec {
    /// Creates a parameter of the given type.
    #[must_use]
    pub fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            enum_values: Vec::new(),
            default: None,
        }
    }

    /// String parameter.
    #[must_use]
    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    /// Number parameter.
    #[must_use]
    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    /// Integer parameter.
    #[must_use]
    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    /// Boolean parameter.
    #[must_use]
    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    /// Array-of-strings parameter.
    #[must_use]
    pub fn array(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Array, description)
    }

    /// Object parameter.
    #[must_use]
    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Object, description)
    }

    /// Restricts the parameter to the given values.
    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| (*v).to_string()).collect();
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn to_json(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(self.param_type.as_str()));
        prop.insert("description".to_string(), json!(self.description));
        if self.param_type == ParamType::Array {
            prop.insert("items".to_string(), json!({ "type": "string" }));
        }
        if !self.enum_values.is_empty() {
            prop.insert("enum".to_string(), json!(self.enum_values));
        }
        if let Some(ref default) = self.default {
            prop.insert("default".to_string(), default.clone());
        }
        Value::Object(prop)
    }
}

/// Ordered parameter list plus the names that must be supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    properties: Vec<ParamSpec>,
    required: Vec<String>,
}

impl ParameterSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required parameter.
    #[must_use]
    pub fn required(mut self, spec: ParamSpec) -> Self {
        self.required.push(spec.name.clone());
        self.properties.push(spec);
        self
    }

    /// Adds an optional parameter.
    #[must_use]
    pub fn optional(mut self, spec: ParamSpec) -> Self {
        self.properties.push(spec);
        self
    }

    /// Declared parameters in order.
    #[must_use]
    pub fn properties(&self) -> &[ParamSpec] {
        &self.properties
    }

    /// Names of required parameters.
    #[must_use]
    pub fn required_names(&self) -> &[String] {
        &self.required
    }

    /// Name that raw (unstructured) input binds to: the first required
    /// string parameter, else `"query"`.
    #[must_use]
    pub fn implicit_argument(&self) -> &str {
        self.properties
            .iter()
            .find(|p| p.param_type == ParamType::String && self.required.contains(&p.name))
            .map_or("query", |p| p.name.as_str())
    }

    /// Renders the schema as a JSON Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.to_json()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    /// Binds model-supplied input to typed arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] when a required argument is
    /// missing, a value has the wrong type, or a value is outside its enum.
    pub fn bind(&self, tool: &str, input: &ActionInput) -> Result<ToolArgs, ToolError> {
        let invalid = |message: String| ToolError::InvalidArguments {
            name: tool.to_string(),
            message,
        };

        let mut supplied = match input {
            ActionInput::Arguments(map) => map.clone(),
            ActionInput::Raw(text) => {
                let mut map = Map::new();
                map.insert(
                    self.implicit_argument().to_string(),
                    Value::String(text.clone()),
                );
                map
            }
            ActionInput::Empty => Map::new(),
        };
        supplied.retain(|_, v| !v.is_null());

        for name in &self.required {
            if !supplied.contains_key(name) {
                return Err(invalid(format!("missing required argument '{name}'")));
            }
        }

        let mut bound = Map::new();
        for spec in &self.properties {
            let value = match supplied.remove(&spec.name) {
                Some(v) => spec.param_type.coerce(v).ok_or_else(|| {
                    invalid(format!(
                        "argument '{}' must be of type {}",
                        spec.name,
                        spec.param_type.as_str()
                    ))
                })?,
                None => match spec.default {
                    Some(ref default) => default.clone(),
                    None => continue,
                },
            };
            if !spec.enum_values.is_empty() {
                let ok = value
                    .as_str()
                    .is_some_and(|s| spec.enum_values.iter().any(|e| e == s));
                if !ok {
                    return Err(invalid(format!(
                        "argument '{}' must be one of: {}",
                        spec.name,
                        spec.enum_values.join(", ")
                    )));
                }
            }
            bound.insert(spec.name.clone(), value);
        }
        // Undeclared extras pass through untouched.
        bound.extend(supplied);

        Ok(ToolArgs(bound))
    }
}

/// The action input a model supplied for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionInput {
    /// A parsed JSON object of named arguments.
    Arguments(Map<String, Value>),
    /// Unstructured text.
    Raw(String),
    /// Nothing supplied.
    Empty,
}

impl ActionInput {
    /// Parses the raw action-input field.
    ///
    /// A JSON object becomes [`ActionInput::Arguments`]; a JSON string
    /// literal is unwrapped; anything else is kept as raw text.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::Empty;
        };
        let candidate = strip_code_fence(text);
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Self::Arguments(map),
            Ok(Value::String(s)) => Self::Raw(s),
            _ => Self::Raw(text.to_string()),
        }
    }

    /// Text form used when the input doubles as a final answer.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Arguments(map) => Some(Value::Object(map.clone()).to_string()),
            Self::Raw(text) => Some(text.clone()),
            Self::Empty => None,
        }
    }

    /// Returns `true` when nothing was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Strips a surrounding markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

/// Arguments after binding against a [`ParameterSchema`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Wraps an already-bound map.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String argument.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// String argument or a fallback.
    #[must_use]
    pub fn str_or<'a>(&'a self, name: &str, fallback: &'a str) -> &'a str {
        self.str(name).unwrap_or(fallback)
    }

    /// Floating-point argument or a fallback.
    #[must_use]
    pub fn f64_or(&self, name: &str, fallback: f64) -> f64 {
        self.0.get(name).and_then(Value::as_f64).unwrap_or(fallback)
    }

    /// Integer argument or a fallback.
    #[must_use]
    pub fn i64_or(&self, name: &str, fallback: i64) -> i64 {
        self.0.get(name).and_then(Value::as_i64).unwrap_or(fallback)
    }

    /// Boolean argument or a fallback.
    #[must_use]
    pub fn bool_or(&self, name: &str, fallback: bool) -> bool {
        self.0.get(name).and_then(Value::as_bool).unwrap_or(fallback)
    }

    /// Array argument rendered as strings.
    #[must_use]
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Object argument.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// Parameter contract.
    fn schema(&self) -> &ParameterSchema;

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] when the tool body fails.
    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError>;

    /// Catalog entry for this tool.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}

/// Signature of a synchronous tool body.
pub type ToolHandler = fn(&ToolArgs) -> Result<String, String>;

/// A tool backed by a plain function.
#[derive(Debug, Clone)]
pub struct FnTool {
    name: String,
    description: String,
    schema: ParameterSchema,
    handler: ToolHandler,
}

impl FnTool {
    /// Creates a function-backed tool.
    #[must_use]
    pub fn new(name: &str, description: &str, schema: ParameterSchema, handler: ToolHandler) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler,
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        (self.handler)(&args).map_err(|message| ToolError::Execution {
            name: self.name.clone(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nda_schema() -> ParameterSchema {
        ParameterSchema::new()
            .required(ParamSpec::string("nda_text", "NDA text"))
            .optional(
                ParamSpec::string("party_perspective", "Which side")
                    .one_of(&["disclosing", "receiving", "mutual"])
                    .with_default(json!("mutual")),
            )
            .optional(ParamSpec::integer("top_k", "Count").with_default(json!(5)))
    }

    #[test]
    fn test_parse_action_input_variants() {
        assert_eq!(ActionInput::parse(None), ActionInput::Empty);
        assert_eq!(ActionInput::parse(Some("   ")), ActionInput::Empty);
        assert!(matches!(
            ActionInput::parse(Some(r#"{"ticker": "AAPL"}"#)),
            ActionInput::Arguments(_)
        ));
        assert_eq!(
            ActionInput::parse(Some("\"quoted\"")),
            ActionInput::Raw("quoted".to_string())
        );
        assert_eq!(
            ActionInput::parse(Some("just text")),
            ActionInput::Raw("just text".to_string())
        );
        assert!(matches!(
            ActionInput::parse(Some("```json\n{\"a\": 1}\n```")),
            ActionInput::Arguments(_)
        ));
    }

    #[test]
    fn test_bind_fills_defaults() {
        let input = ActionInput::parse(Some(r#"{"nda_text": "terms"}"#));
        let args = nda_schema()
            .bind("analyze_nda", &input)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(args.str("nda_text"), Some("terms"));
        assert_eq!(args.str("party_perspective"), Some("mutual"));
        assert_eq!(args.i64_or("top_k", 0), 5);
    }

    #[test]
    fn test_bind_raw_uses_implicit_argument() {
        let schema = nda_schema();
        assert_eq!(schema.implicit_argument(), "nda_text");
        let args = schema
            .bind("analyze_nda", &ActionInput::Raw("raw nda".to_string()))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(args.str("nda_text"), Some("raw nda"));

        let no_strings = ParameterSchema::new().optional(ParamSpec::integer("n", "n"));
        assert_eq!(no_strings.implicit_argument(), "query");
    }

    #[test]
    fn test_bind_rejects_missing_required() {
        let err = nda_schema().bind("analyze_nda", &ActionInput::Empty);
        assert_eq!(
            err,
            Err(ToolError::InvalidArguments {
                name: "analyze_nda".to_string(),
                message: "missing required argument 'nda_text'".to_string(),
            })
        );
    }

    #[test]
    fn test_bind_rejects_enum_and_type() {
        let input = ActionInput::parse(Some(r#"{"nda_text": "x", "party_perspective": "third"}"#));
        assert!(nda_schema().bind("analyze_nda", &input).is_err());

        let input = ActionInput::parse(Some(r#"{"nda_text": 42}"#));
        assert!(nda_schema().bind("analyze_nda", &input).is_err());
    }

    #[test]
    fn test_bind_coerces_quoted_scalars() {
        let input = ActionInput::parse(Some(r#"{"nda_text": "x", "top_k": "3"}"#));
        let args = nda_schema()
            .bind("analyze_nda", &input)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(args.i64_or("top_k", 0), 3);
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = nda_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["nda_text"]));
        assert_eq!(
            schema["properties"]["party_perspective"]["enum"],
            json!(["disclosing", "receiving", "mutual"])
        );
    }

    #[tokio::test]
    async fn test_fn_tool_maps_errors() {
        fn failing(_: &ToolArgs) -> Result<String, String> {
            Err("bad input".to_string())
        }
        let tool = FnTool::new("fail", "always fails", ParameterSchema::new(), failing);
        let err = tool.invoke(ToolArgs::default()).await;
        assert_eq!(
            err,
            Err(ToolError::Execution {
                name: "fail".to_string(),
                message: "bad input".to_string(),
            })
        );
        assert_eq!(tool.definition().name, "fail");
    }
}

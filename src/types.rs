//! Core types for the chat engine: roles, messages, tool calls, the wire
//! request/response shapes and the per-chat configuration.

use crate::hooks::Hooks;
use crate::retry::RetryConfig;
use crate::tools::{Tool, ToolDescriptor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// ROLE
// ============================================================================

/// Role of a message in the conversation.
///
/// The four well-known roles have their own variants; any other string the
/// server or caller uses is kept verbatim in [`Role::Custom`]. Roles compare
/// case-insensitively by their string value, so `Role::Custom("USER")` equals
/// `Role::User`.
#[derive(Debug, Clone, Default)]
pub enum Role {
    System,
    User,
    /// Default for model output when the server omits the role.
    #[default]
    Assistant,
    Tool,
    Custom(String),
}

impl Role {
    /// Parse a role, mapping well-known names case-insensitively.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        match value.to_ascii_lowercase().as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::Custom(value),
        }
    }

    /// The wire value of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Custom(value) => value,
        }
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for Role {}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::new(value)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Role::new(value))
    }
}

// ============================================================================
// MESSAGES AND TOOL CALLS
// ============================================================================

/// A single request from the model to run a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolCallFunction,
}

/// Name and arguments of a requested tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            function: ToolCallFunction {
                name: name.into(),
                arguments,
            },
        }
    }

    /// Build a call from a JSON object; non-object values yield no arguments.
    pub fn from_json(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, arguments)
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.function.arguments
    }
}

/// One turn of the conversation.
///
/// Messages in a chat's history are never mutated; the engine builds new
/// values for every turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Base64-encoded images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(Role::Tool, text)
    }

    /// Attach base64-encoded images to this message.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = if images.is_empty() { None } else { Some(images) };
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if calls.is_empty() { None } else { Some(calls) };
        self
    }

    /// Content text, or `""` when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Tool calls carried by this message (empty slice when none).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

// ============================================================================
// FORMAT
// ============================================================================

/// Output constraint forwarded to the server unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    /// Free-form JSON mode (`"format": "json"`).
    Json,
    /// Constrain output to a JSON schema.
    Schema(Value),
}

impl Format {
    /// Validate a raw format value.
    ///
    /// Accepts the string `"json"` or a JSON object schema. Anything else is
    /// rejected immediately rather than sent to the server.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("json") => Ok(Format::Json),
            Value::Object(_) => Ok(Format::Schema(value)),
            other => Err(crate::Error::invalid_input(format!(
                "format must be \"json\" or a JSON schema object, got {}",
                other
            ))),
        }
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Format::Json => serializer.serialize_str("json"),
            Format::Schema(schema) => schema.serialize(serializer),
        }
    }
}

// ============================================================================
// WIRE SHAPES
// ============================================================================

/// Chat request sent through the transport.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// One streamed chunk of a chat response.
///
/// For a single request exactly one delta has `done == true`, and it is the
/// last one; it also carries the [`DoneStats`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponseDelta {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub done: bool,
    #[serde(flatten)]
    pub stats: DoneStats,
}

impl ChatResponseDelta {
    /// A non-terminal delta carrying `message`.
    pub fn partial(message: Message) -> Self {
        Self {
            message: Some(message),
            ..Default::default()
        }
    }

    /// A terminal delta with the given finish reason.
    pub fn finished(message: Option<Message>, done_reason: impl Into<String>) -> Self {
        Self {
            message,
            done: true,
            stats: DoneStats {
                done_reason: Some(done_reason.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Completion metadata reported on the terminal delta. Durations are in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DoneStats {
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Configuration for a [`Chat`](crate::Chat).
#[derive(Clone)]
pub struct ChatOptions {
    /// Model name (e.g., "llama3.1")
    pub model: String,

    /// Server root URL, without the `/api/chat` path
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Tools offered to the model on every turn
    pub tools: Vec<Arc<Tool>>,

    /// Ask thinking-capable models to emit their reasoning separately
    pub think: Option<bool>,

    /// JSON mode or schema constraint
    pub format: Option<Format>,

    /// Sampling options passed through unchanged (temperature, seed, ...)
    pub options: Option<Map<String, Value>>,

    /// How long the server keeps the model loaded (e.g. "5m")
    pub keep_alive: Option<String>,

    /// Optional cap on automatic tool rounds within one send
    pub max_tool_rounds: Option<u32>,

    /// Observability hooks
    pub hooks: Hooks,

    /// Retry policy for opening a request
    pub retry: RetryConfig,
}

impl fmt::Debug for ChatOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatOptions")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("think", &self.think)
            .field("format", &self.format)
            .field("options", &self.options)
            .field("keep_alive", &self.keep_alive)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl ChatOptions {
    /// Create a new builder for ChatOptions
    pub fn builder() -> ChatOptionsBuilder {
        ChatOptionsBuilder::default()
    }

    /// Descriptors of the configured tools.
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }
}

/// Builder for ChatOptions
#[derive(Default)]
pub struct ChatOptionsBuilder {
    model: Option<String>,
    base_url: Option<String>,
    timeout: Option<u64>,
    tools: Vec<Arc<Tool>>,
    think: Option<bool>,
    format: Option<Format>,
    options: Option<Map<String, Value>>,
    keep_alive: Option<String>,
    max_tool_rounds: Option<u32>,
    hooks: Hooks,
    retry: Option<RetryConfig>,
}

impl fmt::Debug for ChatOptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatOptionsBuilder")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("tools", &format!("{} tools", self.tools.len()))
            .finish()
    }
}

impl ChatOptionsBuilder {
    /// Model name, e.g. `llama3.1`. Required.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Server root. Defaults to `OLLAMA_HOST` or `http://localhost:11434`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request timeout in seconds (default 120).
    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a tool the model may call.
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools.into_iter().map(Arc::new));
        self
    }

    /// Ask a reasoning model to stream its thinking separately.
    pub fn think(mut self, think: bool) -> Self {
        self.think = Some(think);
        self
    }

    /// Constrain output to JSON or to a JSON schema.
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the format from a raw JSON value, validating it immediately.
    pub fn format_value(self, value: Value) -> crate::Result<Self> {
        Ok(self.format(Format::from_value(value)?))
    }

    /// Replace all sampling options.
    pub fn options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Set a single sampling option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `temperature` option.
    pub fn temperature(self, temp: f32) -> Self {
        self.option("temperature", temp)
    }

    /// How long the server keeps the model loaded, e.g. `"5m"`.
    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    /// Cap on tool rounds per send. Unlimited when unset.
    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Retry policy for opening a request.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validate and produce the options.
    ///
    /// Fails with [`crate::Error::Config`] when the model is missing or blank.
    pub fn build(self) -> crate::Result<ChatOptions> {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| crate::config::get_base_url(None));
        if base_url.trim().is_empty() {
            return Err(crate::Error::config("base_url must not be empty"));
        }

        Ok(ChatOptions {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout.unwrap_or(120),
            tools: self.tools,
            think: self.think,
            format: self.format,
            options: self.options,
            keep_alive: self.keep_alive,
            max_tool_rounds: self.max_tool_rounds,
            hooks: self.hooks,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_options_builder() {
        let options = ChatOptions::builder()
            .model("llama3.1")
            .base_url("http://localhost:11434/")
            .timeout(30)
            .think(true)
            .temperature(0.5)
            .option("seed", 42)
            .keep_alive("5m")
            .max_tool_rounds(4)
            .build()
            .unwrap();

        assert_eq!(options.model, "llama3.1");
        assert_eq!(options.base_url, "http://localhost:11434");
        assert_eq!(options.timeout, 30);
        assert_eq!(options.think, Some(true));
        assert_eq!(options.keep_alive.as_deref(), Some("5m"));
        assert_eq!(options.max_tool_rounds, Some(4));
        let sampling = options.options.unwrap();
        assert_eq!(sampling["temperature"], json!(0.5));
        assert_eq!(sampling["seed"], json!(42));
    }

    #[test]
    fn test_chat_options_builder_defaults() {
        let options = ChatOptions::builder()
            .model("llama3.1")
            .base_url("http://localhost:11434")
            .build()
            .unwrap();

        assert_eq!(options.timeout, 120);
        assert!(options.tools.is_empty());
        assert!(options.think.is_none());
        assert!(options.format.is_none());
        assert!(options.options.is_none());
        assert!(options.max_tool_rounds.is_none());
    }

    #[test]
    fn test_chat_options_builder_missing_model() {
        let result = ChatOptions::builder()
            .base_url("http://localhost:11434")
            .build();
        assert!(result.is_err());

        let result = ChatOptions::builder().model("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_role_case_insensitive_equality() {
        assert_eq!(Role::new("USER"), Role::User);
        assert_eq!(Role::Custom("Assistant".to_string()), Role::Assistant);
        assert_eq!(Role::new("critic"), Role::Custom("CRITIC".to_string()));
        assert_ne!(Role::User, Role::Tool);
    }

    #[test]
    fn test_role_parsing_matches_equality() {
        for raw in ["Tool", "SYSTEM", "ＵＳＥＲ", "ａssistant", "critic"] {
            let parsed = Role::new(raw);
            assert_eq!(parsed, Role::Custom(raw.to_string()));
            assert_eq!(parsed.as_str().is_ascii(), raw.is_ascii());
        }
        assert!(matches!(Role::new("ＵＳＥＲ"), Role::Custom(_)));
        assert_ne!(Role::new("ＵＳＥＲ"), Role::User);
        assert!(matches!(Role::new("Tool"), Role::Tool));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
        assert_eq!(
            serde_json::to_string(&Role::Custom("critic".into())).unwrap(),
            "\"critic\""
        );
        let role: Role = serde_json::from_str("\"Assistant\"").unwrap();
        assert!(matches!(role, Role::Assistant));
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let msg = Message::user("Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn test_message_with_tool_calls_serialization() {
        let call = ToolCall::from_json("get_current_weather", json!({"location": "Paris"}));
        let msg = Message::default().with_tool_calls(vec![call]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json["tool_calls"][0]["function"]["arguments"]["location"],
            "Paris"
        );
    }

    #[test]
    fn test_delta_deserialization_with_stats() {
        let line = r#"{
            "model": "llama3.1",
            "created_at": "2024-07-22T20:33:28.123Z",
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "done_reason": "stop",
            "total_duration": 4883583458,
            "load_duration": 1334875,
            "prompt_eval_count": 26,
            "prompt_eval_duration": 342546000,
            "eval_count": 282,
            "eval_duration": 4535599000
        }"#;

        let delta: ChatResponseDelta = serde_json::from_str(line).unwrap();
        assert!(delta.done);
        assert_eq!(delta.stats.done_reason.as_deref(), Some("stop"));
        assert_eq!(delta.stats.eval_count, Some(282));
        assert_eq!(delta.stats.prompt_eval_count, Some(26));
    }

    #[test]
    fn test_delta_deserialization_tool_call() {
        let line = r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"get_current_weather","arguments":{"location":"Los Angeles, CA","format":"celsius"}}}]},"done":false}"#;
        let delta: ChatResponseDelta = serde_json::from_str(line).unwrap();
        let message = delta.message.unwrap();
        assert_eq!(message.tool_calls().len(), 1);
        assert_eq!(message.tool_calls()[0].name(), "get_current_weather");
        assert!(delta.stats.done_reason.is_none());
    }

    #[test]
    fn test_format_from_value() {
        assert_eq!(Format::from_value(json!("json")).unwrap(), Format::Json);
        assert!(matches!(
            Format::from_value(json!({"type": "object"})).unwrap(),
            Format::Schema(_)
        ));
        assert!(Format::from_value(json!(42)).is_err());
        assert!(Format::from_value(json!("yaml")).is_err());
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "llama3.1".to_string(),
            messages: vec![Message::user("Hello")],
            tools: None,
            stream: true,
            options: None,
            format: Some(Format::Json),
            think: None,
            keep_alive: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["format"], "json");
        assert!(json.get("tools").is_none());
        assert!(json.get("think").is_none());
    }
}

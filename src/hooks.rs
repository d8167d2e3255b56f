//! Observability hooks for a running chat.
//!
//! Three notification points exist:
//!
//! 1. **Thinking**: a thinking (reasoning) fragment was streamed. Thinking text
//!    never appears in the visible token stream; this hook is the only place it
//!    surfaces while streaming.
//! 2. **ToolCall**: a tool call is about to be invoked.
//! 3. **ToolResult**: a tool invocation finished (successfully or not) and its
//!    result text is about to enter the conversation.
//!
//! Handlers run synchronously, in registration order, on the chat's own control
//! flow. They are notifications only: they cannot alter or block execution, and
//! they should return quickly. Forward to a channel if you need to do real work.
//!
//! ```rust,no_run
//! use ollama_chat::Hooks;
//!
//! let hooks = Hooks::new()
//!     .add_thinking(|event| eprint!("{}", event.text))
//!     .add_tool_call(|event| eprintln!("calling {}", event.tool_call.name()))
//!     .add_tool_result(|event| eprintln!("{}", event.text));
//! ```

use crate::types::ToolCall;
use serde_json::Value;
use std::sync::Arc;

/// A thinking fragment arrived from the model.
#[derive(Debug, Clone)]
pub struct ThinkingEvent {
    pub text: String,
}

/// A tool call is about to be invoked.
#[derive(Debug, Clone)]
pub struct ToolCallEvent {
    pub tool_call: ToolCall,
}

/// A tool call finished.
#[derive(Debug, Clone)]
pub struct ToolResultEvent {
    pub tool_call: ToolCall,
    /// The tool's raw return value; `None` when the call failed.
    pub result: Option<Value>,
    /// The text added to the conversation for this call.
    pub text: String,
}

pub type ThinkingHandler = Arc<dyn Fn(&ThinkingEvent) + Send + Sync>;
pub type ToolCallHandler = Arc<dyn Fn(&ToolCallEvent) + Send + Sync>;
pub type ToolResultHandler = Arc<dyn Fn(&ToolResultEvent) + Send + Sync>;

/// Ordered subscriber lists for each notification point.
#[derive(Clone, Default)]
pub struct Hooks {
    pub thinking: Vec<ThinkingHandler>,

    pub tool_call: Vec<ToolCallHandler>,

    pub tool_result: Vec<ToolResultHandler>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thinking<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ThinkingEvent) + Send + Sync + 'static,
    {
        self.thinking.push(Arc::new(handler));
        self
    }

    pub fn add_tool_call<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ToolCallEvent) + Send + Sync + 'static,
    {
        self.tool_call.push(Arc::new(handler));
        self
    }

    pub fn add_tool_result<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ToolResultEvent) + Send + Sync + 'static,
    {
        self.tool_result.push(Arc::new(handler));
        self
    }

    pub fn emit_thinking(&self, event: &ThinkingEvent) {
        for handler in &self.thinking {
            handler(event);
        }
    }

    pub fn emit_tool_call(&self, event: &ToolCallEvent) {
        for handler in &self.tool_call {
            handler(event);
        }
    }

    pub fn emit_tool_result(&self, event: &ToolResultEvent) {
        for handler in &self.tool_result {
            handler(event);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("thinking", &format!("{} handlers", self.thinking.len()))
            .field("tool_call", &format!("{} handlers", self.tool_call.len()))
            .field("tool_result", &format!("{} handlers", self.tool_result.len()))
            .finish()
    }
}

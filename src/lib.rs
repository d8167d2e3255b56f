//! # Ollama Chat SDK
//!
//! A streaming, multi-turn chat client for Ollama-compatible servers with
//! automatic tool calling.
//!
//! ## Key Features
//!
//! - **Streaming Responses**: visible text is yielded token by token as deltas arrive
//! - **Incremental Aggregation**: deltas are folded into one complete history message
//! - **Tool Calling**: model-requested tools run in order and their results are fed back
//! - **Cancellation**: one token aborts streaming and tool execution, history stays consistent
//! - **Hooks**: thinking, tool-call and tool-result notifications
//! - **Context Management**: manual token estimation and history truncation
//!
//! ## Multi-turn Chat
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use ollama_chat::{Chat, ChatOptions, tool};
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let weather = tool("get_current_weather", "Get the current weather for a location")
//!         .param("location", "string")
//!         .enum_param("format", &["celsius", "fahrenheit"], "Temperature unit")
//!         .build_sync(|args| {
//!             Ok(json!(format!("21 °C in {}", args.str("location")?)))
//!         });
//!
//!     let options = ChatOptions::builder()
//!         .model("llama3.1")
//!         .tool(weather)
//!         .build()?;
//!
//!     let mut chat = Chat::new(options)?;
//!
//!     // Tool calls and the continuation are handled inside one send
//!     let mut tokens = chat.send("How is the weather in LA?", CancellationToken::new());
//!     while let Some(token) = tokens.next().await {
//!         print!("{}", token?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **chat**: the conversation engine and `query()`
//! - **aggregator**: folds streamed deltas into a message
//! - **invoker**: resolves and executes tool calls
//! - **transport**: NDJSON-over-HTTP request streaming
//! - **types**: messages, roles, wire shapes and options
//! - **tools**: tool definitions, schemas and argument coercion
//! - **hooks**: observability callbacks
//! - **config**: server URL and model defaults
//! - **error**: the `Error` enum and `Result<T>` alias
//! - **context**: token estimation and history truncation
//! - **retry**: exponential backoff with jitter

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Streaming delta aggregation into complete messages.
mod aggregator;

/// The conversation engine: `Chat` and the one-shot `query()`.
mod chat;

/// Server URL and model resolution with environment variable support.
mod config;

/// Token estimation and history truncation helpers.
mod context;

/// Error types and the crate-wide `Result<T>` alias.
mod error;

/// Thinking, tool-call and tool-result notifications.
mod hooks;

/// Tool lookup and execution.
mod invoker;

/// Tool definitions, parameter schemas and argument coercion.
mod tools;

/// Transport abstraction and the NDJSON HTTP implementation.
mod transport;

/// Messages, roles, wire shapes and chat options.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

// --- Conversation Engine ---

pub use chat::{Chat, TokenStream, query, render_tool_result};

// --- Streaming ---

pub use aggregator::MessageBuilder;
pub use transport::{ChatTransport, DeltaStream, HttpTransport, decode_line, decode_ndjson};

// --- Configuration ---

pub use config::{BASE_URL_ENV, DEFAULT_BASE_URL, MODEL_ENV, get_base_url, get_model};

// --- Context Management ---

pub use context::{estimate_tokens, is_approaching_limit, truncate_messages};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Hooks ---

pub use hooks::{
    Hooks, ThinkingEvent, ThinkingHandler, ToolCallEvent, ToolCallHandler, ToolResultEvent,
    ToolResultHandler,
};

// --- Tool System ---

pub use invoker::{DefaultToolInvoker, ToolInvoker, find_tool};
pub use tools::{
    FunctionDescriptor, ParameterSchema, Property, Tool, ToolArgs, ToolBuilder, ToolDescriptor,
    ToolHandler, ToolResult, coerce_arguments, tool,
};

// --- Core Types ---

pub use types::{
    ChatOptions, ChatOptionsBuilder, ChatRequest, ChatResponseDelta, DoneStats, Format, Message,
    Role, ToolCall, ToolCallFunction,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The types most programs need: `use ollama_chat::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Chat, ChatOptions, ChatOptionsBuilder, Error, Format, Hooks, Message, Result, Role,
        Tool, ToolArgs, query, tool,
    };
    pub use tokio_util::sync::CancellationToken;
}

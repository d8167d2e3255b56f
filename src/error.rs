//! Error types for the chat engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error reported by the model server
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error (broken body, malformed line)
    #[error("Streaming error: {0}")]
    Stream(String),

    /// The model rejected a capability it was asked to use, such as tools
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// No registered tool matches the requested name
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// A tool argument could not be converted to the type the tool expects
    #[error("Invalid argument '{parameter}' for tool '{tool}': {message}")]
    ToolArgument {
        tool: String,
        parameter: String,
        message: String,
    },

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedCapability(msg.into())
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Error::ToolNotFound(name.into())
    }

    pub fn tool_argument(
        tool: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::ToolArgument {
            tool: tool.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    pub fn timeout() -> Self {
        Error::Timeout
    }

    pub fn cancelled() -> Self {
        Error::Cancelled
    }

    /// Classify a server-side error message.
    ///
    /// Servers report a model that cannot use tools with a plain message such as
    /// `"llama2 does not support tools"`; that case gets its own variant so callers
    /// can retry without tools.
    pub fn from_server_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.to_lowercase().contains("does not support tools") {
            Error::UnsupportedCapability(msg)
        } else {
            Error::Api(msg)
        }
    }

    /// Whether this error belongs in the conversation rather than to the caller.
    ///
    /// Tool lookup, argument and execution failures are reported back to the
    /// model as a tool message so it can correct itself.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_) | Error::ToolArgument { .. } | Error::Tool(_)
        )
    }
}

//! Resolution and execution of tool calls.
//!
//! The chat engine hands every [`ToolCall`] the model emits to a
//! [`ToolInvoker`]. The default implementation matches the call's name against
//! the tools offered on the current turn (case-insensitively), coerces the
//! arguments to the declared types and runs the handler, aborting when the
//! cancellation token fires.
//!
//! Failures that belong to the conversation (unknown tool, bad argument,
//! handler error) come back as [`Error::ToolNotFound`], [`Error::ToolArgument`]
//! and [`Error::Tool`]; the engine turns them into a tool message for the model.
//! [`Error::Cancelled`] is the only error it propagates to the caller.

use crate::tools::{Tool, ToolArgs, ToolResult, coerce_arguments};
use crate::types::ToolCall;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Executes tool calls on behalf of a chat.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        call: &ToolCall,
        tools: &[Arc<Tool>],
        cancel: &CancellationToken,
    ) -> Result<ToolResult>;
}

/// Find a tool by case-insensitive name.
pub fn find_tool<'a>(tools: &'a [Arc<Tool>], name: &str) -> Option<&'a Arc<Tool>> {
    tools.iter().find(|t| t.name().eq_ignore_ascii_case(name))
}

/// Invoker backed by the [`Tool`] handlers themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultToolInvoker;

#[async_trait]
impl ToolInvoker for DefaultToolInvoker {
    async fn invoke(
        &self,
        call: &ToolCall,
        tools: &[Arc<Tool>],
        cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let tool =
            find_tool(tools, call.name()).ok_or_else(|| Error::tool_not_found(call.name()))?;

        let arguments = coerce_arguments(tool.descriptor(), call.arguments())?;
        log::debug!("Invoking tool '{}' with {} argument(s)", tool.name(), arguments.len());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            outcome = tool.execute(ToolArgs::new(tool.name(), arguments)) => outcome,
        };

        let result = outcome.map_err(|e| match e {
            Error::Cancelled => e,
            e if e.is_conversational() => e,
            e => Error::tool(e.to_string()),
        })?;

        Ok(ToolResult {
            tool: tool.descriptor().clone(),
            tool_call: call.clone(),
            result,
        })
    }
}

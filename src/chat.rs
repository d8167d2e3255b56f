//! The conversation engine.
//!
//! A [`Chat`] owns one conversation history and drives every turn through the
//! same loop:
//!
//! 1. append the outgoing message and send the *entire* history,
//! 2. stream the reply, yielding visible text as it arrives and routing
//!    thinking text to the hooks,
//! 3. append the aggregated reply,
//! 4. if the reply requests tools (and the turn was not a caller-sent tool
//!    turn), run them in order, append their results and continue with the
//!    last result as a new `tool` turn.
//!
//! Tokens from continuations are forwarded on the caller's stream, so a single
//! `send` covers the whole tool chain.

use crate::aggregator::MessageBuilder;
use crate::hooks::{ThinkingEvent, ToolCallEvent, ToolResultEvent};
use crate::invoker::{DefaultToolInvoker, ToolInvoker};
use crate::tools::Tool;
use crate::transport::{ChatTransport, HttpTransport};
use crate::types::{ChatOptions, ChatRequest, DoneStats, Message, Role, ToolCall};
use crate::{Error, Result};
use async_stream::try_stream;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Visible-text tokens of one `send`, continuations included.
pub type TokenStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// A stateful conversation.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use ollama_chat::{Chat, ChatOptions};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> ollama_chat::Result<()> {
/// let options = ChatOptions::builder().model("llama3.1").build()?;
/// let mut chat = Chat::new(options)?;
///
/// let mut tokens = chat.send("Why is the sky blue?", CancellationToken::new());
/// while let Some(token) = tokens.next().await {
///     print!("{}", token?);
/// }
/// drop(tokens);
///
/// assert_eq!(chat.history().len(), 2);
/// # Ok(())
/// # }
/// ```
///
/// A chat runs one send at a time: the returned stream mutably borrows it.
/// Use separate `Chat` values for concurrent conversations.
pub struct Chat {
    options: ChatOptions,
    history: Vec<Message>,
    transport: Arc<dyn ChatTransport>,
    invoker: Arc<dyn ToolInvoker>,
    last_stats: Option<DoneStats>,
}

impl Chat {
    /// Create a chat talking to `options.base_url` over HTTP.
    pub fn new(options: ChatOptions) -> Result<Self> {
        let transport = HttpTransport::from_options(&options)?;
        Ok(Self::with_transport(options, Arc::new(transport)))
    }

    /// Create a chat on top of any transport.
    pub fn with_transport(options: ChatOptions, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            options,
            history: Vec::new(),
            transport,
            invoker: Arc::new(DefaultToolInvoker),
            last_stats: None,
        }
    }

    /// Replace the tool invoker.
    pub fn with_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Replace the whole history, e.g. with a truncated copy.
    pub fn set_history(&mut self, history: Vec<Message>) {
        self.history = history;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Statistics from the terminal delta of the most recent stream.
    pub fn last_stats(&self) -> Option<&DoneStats> {
        self.last_stats.as_ref()
    }

    /// Send user text.
    pub fn send(&mut self, text: impl Into<String>, cancel: CancellationToken) -> TokenStream<'_> {
        self.send_message(Message::user(text), cancel)
    }

    /// Send text under an arbitrary role.
    pub fn send_as(
        &mut self,
        role: Role,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> TokenStream<'_> {
        self.send_message(Message::new(role, text), cancel)
    }

    /// Send a prepared message (images included) with the configured tools.
    pub fn send_message(&mut self, message: Message, cancel: CancellationToken) -> TokenStream<'_> {
        let tools = self.options.tools.clone();
        self.send_with_tools(message, tools, cancel)
    }

    /// Send a message, offering `tools` for this turn and its continuations.
    pub fn send_with_tools(
        &mut self,
        message: Message,
        tools: Vec<Arc<Tool>>,
        cancel: CancellationToken,
    ) -> TokenStream<'_> {
        Box::pin(self.run(message, tools, cancel))
    }

    fn build_request(&self, tools: &[Arc<Tool>]) -> ChatRequest {
        ChatRequest {
            model: self.options.model.clone(),
            messages: self.history.clone(),
            tools: (!tools.is_empty())
                .then(|| tools.iter().map(|t| t.descriptor().clone()).collect()),
            stream: true,
            options: self.options.options.clone(),
            format: self.options.format.clone(),
            think: self.options.think,
            keep_alive: self.options.keep_alive.clone(),
        }
    }

    fn run(
        &mut self,
        message: Message,
        tools: Vec<Arc<Tool>>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<String>> + Send + '_ {
        try_stream! {
            let mut next = message;
            let mut continuation = false;
            let mut rounds: u32 = 0;

            loop {
                let mark = self.history.len();
                let turn_role = next.role.clone();
                self.history.push(next);

                let request = self.build_request(&tools);
                log::debug!(
                    "Sending {} turn (model: {}, {} message(s), {} tool(s))",
                    turn_role,
                    request.model,
                    request.messages.len(),
                    request.tools.as_ref().map_or(0, Vec::len)
                );

                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::cancelled()),
                    opened = self.transport.chat(request, cancel.clone()) => opened,
                };
                let mut deltas = opened.map_err(|e| rollback(&mut self.history, mark, e))?;

                let mut builder = MessageBuilder::new();
                let mut finished = false;

                loop {
                    let received = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Some(Err(Error::cancelled())),
                        received = deltas.next() => received,
                    };
                    let Some(delta) = received else { break };
                    let delta = delta.map_err(|e| rollback(&mut self.history, mark, e))?;

                    if finished {
                        log::warn!("Ignoring delta received after the terminal delta");
                        continue;
                    }

                    builder.append(&delta);

                    if let Some(fragment) = &delta.message {
                        if let Some(thinking) = fragment.thinking.as_deref().filter(|t| !t.is_empty()) {
                            self.options.hooks.emit_thinking(&ThinkingEvent {
                                text: thinking.to_string(),
                            });
                        }
                        if !fragment.text().is_empty() {
                            yield fragment.text().to_string();
                        }
                    }

                    if delta.done {
                        log::debug!(
                            "Stream finished (reason: {:?}, prompt tokens: {:?}, completion tokens: {:?})",
                            delta.stats.done_reason,
                            delta.stats.prompt_eval_count,
                            delta.stats.eval_count
                        );
                        self.last_stats = Some(delta.stats.clone());
                        finished = true;
                    }
                }

                if !finished {
                    log::warn!("Response stream ended without a terminal delta");
                }

                let Some(reply) = builder.complete() else { break };
                let calls = reply.tool_calls().to_vec();
                self.history.push(reply);

                if calls.is_empty() {
                    break;
                }
                if turn_role == Role::Tool && !continuation {
                    log::debug!("Not invoking tools requested in reply to a tool turn");
                    break;
                }
                if let Some(max) = self.options.max_tool_rounds {
                    if rounds >= max {
                        log::warn!("Tool round limit ({}) reached, not invoking {} tool call(s)", max, calls.len());
                        break;
                    }
                }
                rounds += 1;

                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    self.options.hooks.emit_tool_call(&ToolCallEvent {
                        tool_call: call.clone(),
                    });

                    let outcome = match self.invoker.invoke(call, &tools, &cancel).await {
                        Err(e) if !e.is_conversational() => Err(e),
                        other => Ok(other),
                    };
                    let outcome = outcome.map_err(|e| rollback(&mut self.history, mark, e))?;

                    let (value, text) = match outcome {
                        Ok(result) => {
                            let text = render_tool_result(call, Ok(&result.result));
                            (Some(result.result), text)
                        }
                        Err(e) => {
                            log::debug!("Tool call '{}' failed: {}", call.name(), e);
                            (None, render_tool_result(call, Err(&e)))
                        }
                    };

                    self.options.hooks.emit_tool_result(&ToolResultEvent {
                        tool_call: call.clone(),
                        result: value,
                        text: text.clone(),
                    });
                    results.push(text);
                }

                let Some(last) = results.pop() else { break };
                for text in results {
                    self.history.push(Message::tool(text));
                }

                log::debug!("Continuing after {} tool result(s)", calls.len());
                next = Message::tool(last);
                continuation = true;
            }
        }
    }
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("options", &self.options)
            .field("history", &self.history.len())
            .field("last_stats", &self.last_stats)
            .finish()
    }
}

/// Undo the current turn when it was cancelled.
fn rollback(history: &mut Vec<Message>, mark: usize, error: Error) -> Error {
    if matches!(error, Error::Cancelled) {
        log::debug!("Turn cancelled, dropping {} message(s)", history.len() - mark);
        history.truncate(mark);
    }
    error
}

/// Text of the synthesized tool message: `Tool: name(args):\nResult: ...`.
pub fn render_tool_result(call: &ToolCall, outcome: std::result::Result<&Value, &Error>) -> String {
    let args = call
        .arguments()
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ");

    let result = match outcome {
        Ok(Value::String(text)) => text.clone(),
        Ok(value) => value.to_string(),
        Err(e) => format!("Error: {}", e),
    };

    format!("Tool: {}({}):\nResult: {}", call.name(), args, result)
}

/// One-shot conversation: send `prompt` on a fresh [`Chat`] and stream the reply.
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use ollama_chat::{query, ChatOptions};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> ollama_chat::Result<()> {
/// let options = ChatOptions::builder().model("llama3.1").build()?;
/// let mut tokens = query("Name three primes.", options, CancellationToken::new())?;
/// while let Some(token) = tokens.next().await {
///     print!("{}", token?);
/// }
/// # Ok(())
/// # }
/// ```
pub fn query(
    prompt: impl Into<String>,
    options: ChatOptions,
    cancel: CancellationToken,
) -> Result<TokenStream<'static>> {
    let chat = Chat::new(options)?;
    Ok(Box::pin(owned_tokens(chat, prompt.into(), cancel)))
}

fn owned_tokens(
    mut chat: Chat,
    prompt: String,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String>> + Send + 'static {
    try_stream! {
        let mut tokens = chat.send(prompt, cancel);
        while let Some(token) = tokens.next().await {
            yield token?;
        }
    }
}

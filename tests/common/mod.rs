#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use ollama_chat::{
    ChatOptions, ChatRequest, ChatResponseDelta, ChatTransport, DeltaStream, Error, Message,
    Result, TokenStream, ToolCall,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// What the transport does for one request.
pub enum Script {
    /// Yield these deltas, then end.
    Deltas(Vec<ChatResponseDelta>),
    /// Yield these deltas, then never produce another one.
    HangAfter(Vec<ChatResponseDelta>),
    /// Fail to open the stream.
    Fail(String),
    /// Yield these deltas, then an error.
    FailAfter(Vec<ChatResponseDelta>, String),
}

/// In-memory transport replaying one script per request and recording requests.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn chat(&self, request: ChatRequest, _cancel: CancellationToken) -> Result<DeltaStream> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Deltas(vec![done()]));

        match script {
            Script::Deltas(deltas) => Ok(Box::pin(stream::iter(deltas.into_iter().map(Ok)))),
            Script::HangAfter(deltas) => Ok(Box::pin(
                stream::iter(deltas.into_iter().map(Ok)).chain(stream::pending()),
            )),
            Script::Fail(message) => Err(Error::api(message)),
            Script::FailAfter(deltas, message) => Ok(Box::pin(
                stream::iter(deltas.into_iter().map(Ok))
                    .chain(stream::once(async move { Err(Error::api(message)) })),
            )),
        }
    }
}

pub fn options() -> ollama_chat::ChatOptionsBuilder {
    ChatOptions::builder()
        .model("test-model")
        .base_url("http://localhost:11434")
}

pub fn text(content: &str) -> ChatResponseDelta {
    ChatResponseDelta::partial(Message::assistant(content))
}

pub fn thinking(content: &str) -> ChatResponseDelta {
    ChatResponseDelta::partial(Message {
        thinking: Some(content.to_string()),
        ..Message::assistant("")
    })
}

pub fn done() -> ChatResponseDelta {
    ChatResponseDelta::finished(Some(Message::assistant("")), "stop")
}

pub fn calls(calls: Vec<(&str, Value)>) -> ChatResponseDelta {
    let calls = calls
        .into_iter()
        .map(|(name, args)| ToolCall::from_json(name, args))
        .collect();
    ChatResponseDelta::finished(Some(Message::assistant("").with_tool_calls(calls)), "stop")
}

pub fn reply(parts: &[&str]) -> Script {
    let mut deltas: Vec<_> = parts.iter().map(|p| text(p)).collect();
    deltas.push(done());
    Script::Deltas(deltas)
}

/// Drain a token stream, returning the tokens seen and the error that ended it, if any.
pub async fn drain(mut tokens: TokenStream<'_>) -> (Vec<String>, Option<Error>) {
    let mut seen = Vec::new();
    while let Some(token) = tokens.next().await {
        match token {
            Ok(token) => seen.push(token),
            Err(e) => return (seen, Some(e)),
        }
    }
    (seen, None)
}

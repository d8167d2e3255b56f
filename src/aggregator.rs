//! Aggregation of streamed deltas into one complete message.
//!
//! The server streams a turn as a sequence of partial messages:
//!
//! ```text
//! {"message":{"role":"assistant","content":"Hi hu"},"done":false}
//! {"message":{"role":"assistant","content":"man, how"},"done":false}
//! {"message":{"role":"assistant","content":" are you?"},"done":false}
//! {"message":{"role":"assistant","content":""},"done":true,"done_reason":"stop",...}
//! ```
//!
//! [`MessageBuilder`] concatenates content fragments in arrival order, keeps
//! thinking text in a separate buffer, collects images and tool calls, and
//! remembers the last role it saw. [`MessageBuilder::complete`] then yields
//! `Message { role: assistant, content: "Hi human, how are you?" }`.

use crate::types::{ChatResponseDelta, Message, Role, ToolCall};

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: String,

    thinking: String,

    images: Vec<String>,

    tool_calls: Vec<ToolCall>,

    role: Option<Role>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one delta. A delta without a message is a no-op.
    pub fn append(&mut self, delta: &ChatResponseDelta) {
        if let Some(message) = &delta.message {
            self.append_message(message);
        }
    }

    /// Append one message fragment.
    pub fn append_message(&mut self, fragment: &Message) {
        if let Some(content) = &fragment.content {
            self.content.push_str(content);
        }
        if let Some(thinking) = &fragment.thinking {
            self.thinking.push_str(thinking);
        }
        if let Some(images) = &fragment.images {
            self.images.extend(images.iter().cloned());
        }
        if let Some(calls) = &fragment.tool_calls {
            self.tool_calls.extend(calls.iter().cloned());
        }
        self.role = Some(fragment.role.clone());
    }

    /// Whether anything worth keeping has been appended.
    pub fn has_value(&self) -> bool {
        !self.content.is_empty()
            || !self.thinking.is_empty()
            || !self.images.is_empty()
            || !self.tool_calls.is_empty()
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Thinking text accumulated so far.
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Build the complete message, or `None` when nothing was produced.
    pub fn complete(&self) -> Option<Message> {
        if !self.has_value() {
            return None;
        }

        Some(Message {
            role: self.role.clone().unwrap_or(Role::Assistant),
            content: Some(self.content.clone()),
            thinking: (!self.thinking.is_empty()).then(|| self.thinking.clone()),
            images: (!self.images.is_empty()).then(|| self.images.clone()),
            tool_calls: (!self.tool_calls.is_empty()).then(|| self.tool_calls.clone()),
        })
    }
}

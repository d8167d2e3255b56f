//! Helpers for keeping a chat's history inside the model's context window.
//!
//! Nothing here runs automatically. Estimate, decide, then hand the result to
//! [`Chat::set_history`](crate::Chat::set_history):
//!
//! ```rust
//! use ollama_chat::{estimate_tokens, truncate_messages, Message};
//!
//! let history = vec![
//!     Message::system("You are terse."),
//!     Message::user("Hello"),
//!     Message::assistant("Hi."),
//! ];
//! if estimate_tokens(&history) > 28_000 {
//!     let trimmed = truncate_messages(&history, 10, true);
//!     // chat.set_history(trimmed);
//! }
//! ```

use crate::types::{Message, Role};

/// Characters charged per attached image.
const IMAGE_CHARS: usize = 1024;

/// Rough token estimate for a message list (about 4 characters per token).
pub fn estimate_tokens(messages: &[Message]) -> usize {
    if messages.is_empty() {
        return 0;
    }

    let mut total_chars = 16;

    for message in messages {
        total_chars += 8;
        total_chars += message.content.as_ref().map_or(0, String::len);
        total_chars += message.thinking.as_ref().map_or(0, String::len);
        total_chars += message.images.as_ref().map_or(0, |i| i.len() * IMAGE_CHARS);
        for call in message.tool_calls() {
            total_chars += call.name().len();
            total_chars += serde_json::Value::Object(call.arguments().clone())
                .to_string()
                .len();
        }
    }

    total_chars.div_ceil(4)
}

/// Keep the last `keep` messages, plus a leading system message when
/// `preserve_system` is set.
pub fn truncate_messages(messages: &[Message], keep: usize, preserve_system: bool) -> Vec<Message> {
    if messages.len() <= keep {
        return messages.to_vec();
    }

    let start = messages.len() - keep;
    let has_system = preserve_system && messages[0].role == Role::System;

    let mut result = Vec::with_capacity(keep + 1);
    if has_system {
        result.push(messages[0].clone());
    }
    result.extend_from_slice(&messages[start.max(usize::from(has_system))..]);
    result
}

/// `true` when the estimate exceeds `limit * margin`.
pub fn is_approaching_limit(messages: &[Message], limit: usize, margin: f32) -> bool {
    let threshold = (limit as f32 * margin) as usize;
    estimate_tokens(messages) > threshold
}

//! Conversation history and token budget trimming.

use std::fmt::{self, Debug};
use std::sync::{Arc, LazyLock};

use agentia_model::{Message, Role};
use tiktoken_rs::CoreBPE;

/// Counts the tokens of a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Returns the number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

impl<F: Fn(&str) -> usize + Send + Sync> TokenCounter for F {
    #[inline]
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

static O200K_BASE: LazyLock<Option<CoreBPE>> =
    LazyLock::new(|| match tiktoken_rs::o200k_base() {
        Ok(bpe) => Some(bpe),
        Err(err) => {
            warn!("failed to load tokenizer, falling back to estimation: {err}");
            None
        }
    });

/// The default counter, using the `o200k_base` encoding of the GPT-4o
/// family.
///
/// If the encoding cannot be loaded, it estimates four bytes per token.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tiktoken;

impl TokenCounter for Tiktoken {
    fn count(&self, text: &str) -> usize {
        match O200K_BASE.as_ref() {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.len().div_ceil(4),
        }
    }
}

/// Ordered messages of a conversation, optionally led by a persistent
/// instruction message.
///
/// Messages are only ever appended. [`reset`](Self::reset) drops
/// everything but the instructions.
#[derive(Clone)]
pub struct History {
    instructions: Option<Message>,
    messages: Vec<Message>,
    token_limit: usize,
    counter: Arc<dyn TokenCounter>,
}

impl History {
    /// Creates an empty history.
    pub fn new(
        instructions: Option<String>,
        token_limit: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            instructions: instructions.map(Message::system),
            messages: vec![],
            token_limit,
            counter,
        }
    }

    /// Appends a message.
    #[inline]
    pub fn add(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Drops all the messages except the instructions.
    #[inline]
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Returns the instruction text.
    #[inline]
    pub fn instructions(&self) -> Option<&str> {
        match &self.instructions {
            Some(Message::System { content }) => Some(content),
            _ => None,
        }
    }

    /// Returns the messages after the instructions, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replaces the messages, keeping the instructions.
    #[inline]
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Returns the number of messages, not counting the instructions.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message has been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the token budget.
    #[inline]
    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    fn tokens_of(&self, msg: &Message) -> usize {
        let calls: usize = msg
            .tool_calls()
            .iter()
            .map(|call| {
                self.counter.count(&call.function.name)
                    + self.counter.count(&call.function.arguments.to_string())
            })
            .sum();
        self.counter.count(&msg.text()) + calls
    }

    /// Returns the messages to send for the next request.
    ///
    /// The instructions and the last `keep_last` messages are always
    /// included. Older messages are admitted newest first while the total
    /// stays within the token budget. Tool results whose originating call
    /// got trimmed are dropped as well.
    ///
    /// A message counts the tokens of its text, plus the name and the
    /// serialized arguments of each of its tool calls, which are sent too.
    pub fn for_inference(&self, keep_last: usize) -> Vec<Message> {
        let keep_last = keep_last.min(self.messages.len());
        let (older, pinned) =
            self.messages.split_at(self.messages.len() - keep_last);

        let pinned_tokens: usize = self
            .instructions
            .iter()
            .chain(pinned)
            .map(|msg| self.tokens_of(msg))
            .sum();
        let mut budget = self.token_limit.saturating_sub(pinned_tokens);

        let mut start = older.len();
        for (idx, msg) in older.iter().enumerate().rev() {
            let tokens = self.tokens_of(msg);
            if tokens > budget {
                break;
            }
            budget -= tokens;
            start = idx;
        }
        while older.get(start).is_some_and(|msg| msg.role() == Role::Tool) {
            start += 1;
        }
        if start > 0 {
            debug!("trimmed {start} messages from history");
        }

        self.instructions
            .iter()
            .chain(&older[start..])
            .chain(pinned)
            .cloned()
            .collect()
    }
}

impl Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("instructions", &self.instructions)
            .field("messages", &self.messages)
            .field("token_limit", &self.token_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use agentia_model::ToolCall;
    use serde_json::json;

    use super::*;

    // One token per byte makes budgets easy to reason about.
    fn history(limit: usize) -> History {
        History::new(
            Some("sys".to_owned()),
            limit,
            Arc::new(|text: &str| text.len()),
        )
    }

    #[test]
    fn test_within_budget() {
        let mut history = history(100);
        history.add(Message::user("hello"));
        history.add(Message::assistant("hi"));
        let messages = history.for_inference(1);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("sys"));
    }

    #[test]
    fn test_trim_drops_oldest() {
        let mut history = history(3 + 10 + 5);
        history.add(Message::user("aaaaaaaaaa"));
        history.add(Message::assistant("bbbbbbbbbb"));
        history.add(Message::user("ccccc"));
        history.add(Message::user("ddddd"));

        let messages = history.for_inference(1);
        assert_eq!(
            messages,
            vec![
                Message::system("sys"),
                Message::user("ccccc"),
                Message::user("ddddd"),
            ]
        );
    }

    #[test]
    fn test_pinned_messages_survive() {
        let mut history = history(5);
        history.add(Message::user("old"));
        history.add(Message::user("x".repeat(50)));
        history.add(Message::assistant("y".repeat(50)));

        // Pinned messages are kept even when they alone exceed the budget.
        let messages = history.for_inference(2);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("sys"));
        assert_eq!(messages[1].text().len(), 50);
        assert_eq!(messages[2].text().len(), 50);
    }

    #[test]
    fn test_orphan_tool_results_dropped() {
        let mut history = history(3 + 4 + 2 + 2);
        history.add(Message::assistant_tool_calls([ToolCall::function(
            "1",
            "get_time_and_more",
            json!({}),
        )]));
        history.add(Message::tool("1", "noon"));
        history.add(Message::assistant("ok"));
        history.add(Message::user("hi"));

        let messages = history.for_inference(1);
        assert_eq!(
            messages,
            vec![
                Message::system("sys"),
                Message::assistant("ok"),
                Message::user("hi"),
            ]
        );
    }

    #[test]
    fn test_reset_keeps_instructions() {
        let mut history = history(100);
        history.add(Message::user("hello"));
        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.instructions(), Some("sys"));
        assert_eq!(history.for_inference(0), vec![Message::system("sys")]);
    }

    #[test]
    fn test_tiktoken_counts() {
        let tokens = Tiktoken.count("Hello, world!");
        assert!(tokens > 0 && tokens < 13);
        assert_eq!(Tiktoken.count(""), 0);
    }
}

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that steer the model.
    System,
    /// The human side of the conversation.
    User,
    /// The model.
    Assistant,
    /// A tool call result.
    Tool,
}

impl Role {
    /// Returns the lowercase name used on the wire.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversational turn.
///
/// The serialized form is the one used for persisting and exchanging
/// histories (`{"role": "user", "content": "..."}`), providers convert it
/// to their own wire format at the boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// The system instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user input.
    User {
        /// Text or multi-part content.
        content: Content,
    },
    /// A response from the model.
    Assistant {
        /// The response content, absent when the message only carries
        /// tool calls.
        #[serde(default)]
        content: Option<Content>,
        /// Tools the model wants to call. Empty means the turn converged.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        /// Reasoning tokens emitted before the content, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    /// A tool call result.
    Tool {
        /// The id of the [`ToolCall`] this message answers.
        tool_call_id: String,
        /// The (string-encoded) result.
        content: String,
    },
}

impl Message {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Creates a plain text user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: Content::Text(content.into()),
        }
    }

    /// Creates a multi-part user message.
    #[inline]
    pub fn user_parts(parts: impl Into<Vec<ContentPart>>) -> Self {
        Message::User {
            content: Content::Parts(parts.into()),
        }
    }

    /// Creates a plain text assistant message without tool calls.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::Assistant {
            content: Some(Content::Text(content.into())),
            tool_calls: vec![],
            reasoning: None,
        }
    }

    /// Creates an assistant message that requests the given tool calls.
    #[inline]
    pub fn assistant_tool_calls(tool_calls: impl Into<Vec<ToolCall>>) -> Self {
        Message::Assistant {
            content: None,
            tool_calls: tool_calls.into(),
            reasoning: None,
        }
    }

    /// Creates a tool result message.
    #[inline]
    pub fn tool<S1: Into<String>, S2: Into<String>>(
        tool_call_id: S1,
        content: S2,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Returns the role of this message.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    /// Returns the text view of the message content.
    ///
    /// Text parts are concatenated, image parts are skipped. Messages
    /// without content return an empty string.
    pub fn text(&self) -> String {
        match self {
            Message::System { content } | Message::Tool { content, .. } => {
                content.clone()
            }
            Message::User { content } => content.text(),
            Message::Assistant { content, .. } => {
                content.as_ref().map(Content::text).unwrap_or_default()
            }
        }
    }

    /// Returns the content of the message, if it has any.
    #[inline]
    pub fn content(&self) -> Option<&Content> {
        match self {
            Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_ref(),
            _ => None,
        }
    }

    /// Returns the tool calls requested by an assistant message.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// The content of a user or assistant message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// Ordered content parts.
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Returns the text of the content, joining all the text parts.
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect(),
        }
    }
}

impl From<String> for Content {
    #[inline]
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    #[inline]
    fn from(value: &str) -> Self {
        Content::Text(value.to_owned())
    }
}

/// A part of a multi-part message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment.
    Text {
        /// The text.
        text: String,
    },
    /// A reference to an image, either a URL or a data URI.
    Image {
        /// The image location.
        url: String,
    },
}

impl ContentPart {
    /// Creates a text part.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Creates an image part.
    #[inline]
    pub fn image<S: Into<String>>(url: S) -> Self {
        ContentPart::Image { url: url.into() }
    }
}

/// The type of a tool call. Only functions exist for now.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// A function call.
    #[default]
    Function,
}

/// A tool call request from the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The backend-assigned id, unique within one assistant message.
    pub id: String,
    /// The type of the call.
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a function tool call.
    #[inline]
    pub fn function<S1: Into<String>, S2: Into<String>>(
        id: S1,
        name: S2,
        arguments: Value,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ToolKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// The function part of a [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

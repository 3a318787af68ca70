use agentia_model::{ErrorKind, ModelChunk, ToolCall};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetEvent {
    /// A content fragment.
    Content(String),
    /// A reasoning fragment.
    Reasoning(String),
    /// A complete tool call. Streaming responses split it into fragments.
    ToolCall(ToolCall),
    /// An error embedded in the stream.
    Error(String),
    /// A raw chunk, delivered as-is by streaming responses. Non-streaming
    /// responses only take its content.
    Chunk(ModelChunk),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request fails with this kind of error instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a response that only says `text`.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::Content(text.into())])
    }

    /// Creates a response that requests the given tool calls.
    #[inline]
    pub fn tool_calls(tool_calls: impl IntoIterator<Item = ToolCall>) -> Self {
        Self::with_events(
            tool_calls
                .into_iter()
                .map(PresetEvent::ToolCall)
                .collect::<Vec<_>>(),
        )
    }

    /// Creates a response whose request fails with `kind`.
    #[inline]
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            events: vec![],
            failure: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::Content("I have left a message for you.".to_string()),
            PresetEvent::ToolCall(ToolCall::function(
                "1",
                "Memory__remember",
                json!({ "content": "Hello, world!" }),
            )),
        ]);

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["events"][0]["type"], "content");
        assert_eq!(serialized["events"][1]["type"], "tool_call");
        let deserialized: PresetResponse =
            serde_json::from_value(serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}

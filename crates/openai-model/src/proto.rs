use std::fmt::{self, Display};

use agentia_model::{
    Content, ContentPart as ModelContentPart, ErrorKind, Message as ModelMessage,
    ModelChunk, ModelRequest, ModelTool, Role, SamplingOptions,
    ToolCall as ModelToolCall, ToolCallDelta,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, OpenAIConfig};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self.code.as_ref().and_then(Value::as_u64) {
            Some(429) => ErrorKind::RateLimitExceeded,
            Some(403) => ErrorKind::Moderated,
            _ => ErrorKind::Other,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code: {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FunctionChunk {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ToolCallChunk {
    pub index: Option<usize>,
    pub id: Option<String>,
    pub function: Option<FunctionChunk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    pub error: Option<ApiError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    pub role: Option<Role>,
    pub content: Option<String>,
    // OpenRouter uses `reasoning`, DeepSeek uses `reasoning_content`.
    pub reasoning: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Option<Vec<Choice>>,
    pub error: Option<ApiError>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub reasoning_content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: Function,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: UserContent,
    },
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(flatten)]
    options: SamplingOptions,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
    stream: bool,
) -> ChatCompletionRequest {
    let tools: Vec<_> = req.tools.iter().map(create_tool).collect();
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        tools,
        options: req.options,
        stream,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System { content } => Message::System {
            content: content.clone(),
        },
        ModelMessage::User { content } => Message::User {
            content: match content {
                Content::Text(text) => UserContent::Text(text.clone()),
                Content::Parts(parts) => {
                    UserContent::Parts(parts.iter().map(create_part).collect())
                }
            },
        },
        // Reasoning is never sent back, some providers reject it.
        ModelMessage::Assistant {
            content,
            tool_calls,
            ..
        } => Message::Assistant {
            content: content.as_ref().map(Content::text).unwrap_or_default(),
            tool_calls: tool_calls.iter().map(create_tool_call).collect(),
        },
        ModelMessage::Tool {
            tool_call_id,
            content,
        } => Message::Tool {
            tool_call_id: tool_call_id.clone(),
            content: content.clone(),
        },
    }
}

#[inline]
fn create_part(part: &ModelContentPart) -> ContentPart {
    match part {
        ModelContentPart::Text { text } => ContentPart::Text { text: text.clone() },
        ModelContentPart::Image { url } => ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        },
    }
}

#[inline]
fn create_tool_call(tool_call: &ModelToolCall) -> ToolCall {
    ToolCall {
        id: tool_call.id.clone(),
        r#type: "function".to_owned(),
        function: Function {
            name: tool_call.function.name.clone(),
            arguments: tool_call.function.arguments.to_string(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

impl From<Delta> for ModelChunk {
    fn from(delta: Delta) -> Self {
        let tool_calls = delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tool_call| {
                let function = tool_call.function.unwrap_or_default();
                ToolCallDelta {
                    index: tool_call.index,
                    id: tool_call.id,
                    name: function.name,
                    arguments: function.arguments,
                }
            })
            .collect();
        ModelChunk {
            role: delta.role,
            content: delta.content,
            reasoning: delta.reasoning.or(delta.reasoning_content),
            tool_calls,
            error: None,
        }
    }
}

/// Converts a non-streaming completion into an assistant message.
pub fn into_message(completion: ChatCompletion) -> Result<ModelMessage, Error> {
    if let Some(error) = completion.error {
        return Err(Error::new(error.to_string(), error.kind()));
    }
    let Some(choice) = completion.choices.and_then(|c| c.into_iter().next())
    else {
        return Err(Error::new("response has no choices", ErrorKind::Protocol));
    };

    let message = choice.message;
    let mut tool_calls = Vec::new();
    for tool_call in message.tool_calls.unwrap_or_default() {
        let arguments = parse_arguments(&tool_call.function.arguments)
            .map_err(|err| {
                Error::new(
                    format!(
                        "malformed arguments for `{}`: {err}",
                        tool_call.function.name
                    ),
                    ErrorKind::Protocol,
                )
            })?;
        tool_calls.push(ModelToolCall::function(
            tool_call.id,
            tool_call.function.name,
            arguments,
        ));
    }

    Ok(ModelMessage::Assistant {
        content: message.content.map(Content::Text),
        tool_calls,
        reasoning: message.reasoning.or(message.reasoning_content),
    })
}

#[inline]
fn parse_arguments(arguments: &str) -> serde_json::Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::system("You are a helpful assistant."),
                ModelMessage::user("Hello"),
            ],
            tools: vec![ModelTool {
                name: "get_current_weather".to_owned(),
                description: "Gets the weather.".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": { "location": { "type": "string" } },
                    "required": ["location"]
                }),
            }],
            options: SamplingOptions {
                temperature: Some(0.5),
                ..Default::default()
            },
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let expected = json!({
            "model": "custom",
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "Hello" }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "get_current_weather",
                    "description": "Gets the weather.",
                    "parameters": {
                        "type": "object",
                        "properties": { "location": { "type": "string" } },
                        "required": ["location"]
                    }
                }
            }],
            "tool_choice": "auto",
            "temperature": 0.5,
            "stream": true
        });
        let actual =
            serde_json::to_value(create_request(&request, &config, true))
                .unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_create_history_messages() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::user_parts([
                    ModelContentPart::text("What is this?"),
                    ModelContentPart::image("https://example.com/a.png"),
                ]),
                ModelMessage::Assistant {
                    content: None,
                    tool_calls: vec![ModelToolCall::function(
                        "call_1",
                        "describe",
                        json!({ "url": "https://example.com/a.png" }),
                    )],
                    reasoning: Some("I should look.".to_owned()),
                },
                ModelMessage::tool("call_1", "a cat"),
            ],
            ..Default::default()
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let actual =
            serde_json::to_value(create_request(&request, &config, false))
                .unwrap();
        assert_eq!(
            actual["messages"],
            json!([
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "What is this?" },
                        {
                            "type": "image_url",
                            "image_url": { "url": "https://example.com/a.png" }
                        }
                    ]
                },
                {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "describe",
                            "arguments": "{\"url\":\"https://example.com/a.png\"}"
                        }
                    }]
                },
                { "role": "tool", "tool_call_id": "call_1", "content": "a cat" }
            ])
        );
        assert!(actual.get("tools").is_none());
        assert!(actual.get("tool_choice").is_none());
    }

    #[test]
    fn test_into_message() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "gen-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_current_weather",
                            "arguments": "{\"location\": \"Boston, MA\"}"
                        }
                    }, {
                        "id": "call_2",
                        "type": "function",
                        "function": { "name": "get_current_time", "arguments": "" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        let message = into_message(completion).unwrap();
        assert_eq!(
            message.tool_calls(),
            &[
                ModelToolCall::function(
                    "call_1",
                    "get_current_weather",
                    json!({ "location": "Boston, MA" })
                ),
                ModelToolCall::function("call_2", "get_current_time", json!({})),
            ]
        );
    }

    #[test]
    fn test_missing_choices() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({ "id": "gen-1" })).unwrap();
        let err = into_message(completion).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);

        let completion: ChatCompletion = serde_json::from_value(json!({
            "error": { "code": 429, "message": "slow down" }
        }))
        .unwrap();
        let err = into_message(completion).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimitExceeded);
        assert_eq!(err.message(), "slow down (code: 429)");
    }
}

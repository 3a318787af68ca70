//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use agentia_model::{
    Content, ErrorKind, Message, ModelChunk, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, Role, ToolCallDelta,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    chunks: VecDeque<ModelChunk>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelChunk>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.chunks.pop_front()));
        }
        if this.chunks.is_empty() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_chunk(cx)
    }
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script,
/// which is how the model should respond to a request. The response is
/// selected by the number of assistant messages in the request, so the
/// first request of a conversation gets the first response, the request
/// carrying one answer gets the second, and so on. If there are no enough
/// responses in the script, an error will be returned.
///
/// Every request is recorded and can be inspected with
/// [`requests`](Self::requests).
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    reasoning: bool,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Sets the delay before each streamed chunk, 1ms by default.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Sets whether the provider reports reasoning support.
    #[inline]
    pub fn set_reasoning(&mut self, reasoning: bool) {
        self.reasoning = reasoning;
    }

    /// Returns all the requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn select(&self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| msg.role() == Role::Assistant)
            .count();
        let Some(preset) = self.script.get(step_idx) else {
            return Err(Error::new("no enough steps", ErrorKind::Other));
        };
        if let Some(kind) = preset.failure {
            return Err(Error::new("preset failure", kind));
        }
        Ok(preset.clone())
    }
}

fn assemble_message(preset: PresetResponse) -> Result<Message, Error> {
    let mut content: Option<String> = None;
    let mut reasoning: Option<String> = None;
    let mut tool_calls = vec![];
    for event in preset.events {
        match event {
            PresetEvent::Content(text) => {
                content.get_or_insert_default().push_str(&text)
            }
            PresetEvent::Chunk(ModelChunk {
                content: Some(text),
                ..
            }) => content.get_or_insert_default().push_str(&text),
            PresetEvent::Chunk(_) => {}
            PresetEvent::Reasoning(text) => {
                reasoning.get_or_insert_default().push_str(&text)
            }
            PresetEvent::ToolCall(tool_call) => tool_calls.push(tool_call),
            PresetEvent::Error(message) => {
                return Err(Error::new(message, ErrorKind::Other));
            }
        }
    }
    Ok(Message::Assistant {
        content: content.map(Content::Text),
        tool_calls,
        reasoning,
    })
}

fn split_chunks(preset: PresetResponse) -> VecDeque<ModelChunk> {
    let mut chunks = VecDeque::new();
    chunks.push_back(ModelChunk {
        role: Some(Role::Assistant),
        content: Some(String::new()),
        ..Default::default()
    });
    let mut tool_call_idx = 0;
    for event in preset.events {
        match event {
            PresetEvent::Content(text) => {
                chunks.push_back(ModelChunk::from_content(text))
            }
            PresetEvent::Reasoning(text) => {
                chunks.push_back(ModelChunk::from_reasoning(text))
            }
            PresetEvent::ToolCall(tool_call) => {
                // Header first, then the arguments.
                chunks.push_back(ModelChunk::from_tool_call(
                    ToolCallDelta::new(tool_call_idx)
                        .with_id(tool_call.id)
                        .with_name(tool_call.function.name)
                        .with_arguments(""),
                ));
                chunks.push_back(ModelChunk::from_tool_call(
                    ToolCallDelta::new(tool_call_idx)
                        .with_arguments(tool_call.function.arguments.to_string()),
                ));
                tool_call_idx += 1;
            }
            PresetEvent::Error(message) => {
                chunks.push_back(ModelChunk::from_error(message))
            }
            PresetEvent::Chunk(chunk) => chunks.push_back(chunk),
        }
    }
    chunks
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn model(&self) -> &str {
        "test"
    }

    fn supports_reasoning(&self) -> bool {
        self.reasoning
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static
    {
        ready(self.select(req).and_then(assemble_message))
    }

    fn stream_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        ready(self.select(req).map(|preset| TestModelResponse {
            chunks: split_chunks(preset),
            delay,
            sleep: None,
        }))
    }
}

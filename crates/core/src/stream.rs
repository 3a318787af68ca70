//! Assembling one message out of streamed chunks.

use std::collections::VecDeque;
use std::sync::Arc;

use agentia_model::{Content, Message, ModelChunk, ModelResponse, ToolCall};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::Error;

type ChunkStream = BoxStream<'static, Result<ModelChunk, Error>>;

/// A streamed assistant message.
///
/// Content deltas are observable as soon as they arrive, through
/// [`next_delta`](Self::next_delta) or [`deltas`](Self::deltas), while the
/// complete message is assembled in the background of those calls. The
/// handle is cheap to clone, all clones share the same state.
#[derive(Clone)]
pub struct MessageStream {
    inner: Arc<Mutex<Assembler>>,
    supports_reasoning: bool,
}

impl MessageStream {
    /// Creates a stream reading from a provider response.
    pub fn from_response<R: ModelResponse>(
        resp: R,
        supports_reasoning: bool,
    ) -> Self {
        let mut resp = Box::pin(resp);
        let chunks = stream::poll_fn(move |cx| {
            resp.as_mut()
                .poll_next_chunk(cx)
                .map(|res| res.map_err(Error::from_provider).transpose())
        });
        Self::new(chunks.boxed(), supports_reasoning)
    }

    pub(crate) fn new(chunks: ChunkStream, supports_reasoning: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Assembler::new(
                chunks,
                supports_reasoning,
            ))),
            supports_reasoning,
        }
    }

    /// Returns the next non-empty content fragment, or `None` once the
    /// message is complete.
    ///
    /// Reasoning that was not consumed through [`reasoning`](Self::reasoning)
    /// is skipped.
    pub async fn next_delta(&self) -> Result<Option<String>, Error> {
        let mut inner = self.inner.lock().await;
        loop {
            inner.check()?;
            inner.pending_reasoning.clear();
            if let Some(delta) = inner.pending_content.pop_front() {
                return Ok(Some(delta));
            }
            if !inner.pull().await? {
                return Ok(None);
            }
        }
    }

    /// Returns the content fragments as a stream.
    pub fn deltas(
        &self,
    ) -> impl Stream<Item = Result<String, Error>> + Send + 'static {
        stream::unfold(Some(self.clone()), |state| async move {
            let this = state?;
            match this.next_delta().await {
                Ok(Some(delta)) => Some((Ok(delta), Some(this))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Returns the reasoning phase of the message, if the provider
    /// supports one.
    pub fn reasoning(&self) -> Option<ReasoningStream> {
        self.supports_reasoning.then(|| ReasoningStream {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Reads the rest of the stream and returns the complete message.
    ///
    /// The message is cached, later calls return it again without reading
    /// anything.
    pub async fn wait_for_completion(&self) -> Result<Message, Error> {
        let mut inner = self.inner.lock().await;
        if let Some(msg) = &inner.completed {
            return Ok(msg.clone());
        }
        inner.check()?;
        while inner.pull().await? {}
        inner.pending_reasoning.clear();
        inner.pending_content.clear();
        let msg = match inner.finish() {
            Ok(msg) => msg,
            Err(err) => {
                inner.fail(&err);
                return Err(err);
            }
        };
        inner.completed = Some(msg.clone());
        Ok(msg)
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("supports_reasoning", &self.supports_reasoning)
            .finish_non_exhaustive()
    }
}

/// The reasoning phase of a [`MessageStream`].
pub struct ReasoningStream {
    inner: Arc<Mutex<Assembler>>,
}

impl ReasoningStream {
    /// Returns the next reasoning fragment, or `None` once the phase has
    /// ended.
    pub async fn next_delta(&self) -> Result<Option<String>, Error> {
        let mut inner = self.inner.lock().await;
        loop {
            inner.check()?;
            if let Some(delta) = inner.pending_reasoning.pop_front() {
                return Ok(Some(delta));
            }
            if !inner.reasoning_phase || !inner.pull().await? {
                return Ok(None);
            }
        }
    }

    /// Reads until the phase ends and returns the whole reasoning text.
    pub async fn wait_for_completion(&self) -> Result<Option<String>, Error> {
        let mut inner = self.inner.lock().await;
        inner.check()?;
        while inner.reasoning_phase && inner.pull().await? {}
        inner.pending_reasoning.clear();
        Ok(Some(inner.reasoning.clone()).filter(|text| !text.is_empty()))
    }
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

struct Assembler {
    chunks: Option<ChunkStream>,
    reasoning_phase: bool,
    reasoning: String,
    pending_reasoning: VecDeque<String>,
    content: String,
    pending_content: VecDeque<String>,
    tool_calls: Vec<PartialCall>,
    failure: Option<String>,
    completed: Option<Message>,
}

impl Assembler {
    fn new(chunks: ChunkStream, reasoning_phase: bool) -> Self {
        Self {
            chunks: Some(chunks),
            reasoning_phase,
            reasoning: String::new(),
            pending_reasoning: VecDeque::new(),
            content: String::new(),
            pending_content: VecDeque::new(),
            tool_calls: vec![],
            failure: None,
            completed: None,
        }
    }

    #[inline]
    fn check(&self) -> Result<(), Error> {
        match &self.failure {
            Some(reason) => Err(Error::Stream(reason.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: &Error) {
        warn!("message stream failed: {err}");
        self.failure = Some(match err {
            Error::Stream(reason) => reason.clone(),
            err => err.to_string(),
        });
        self.chunks = None;
        self.reasoning_phase = false;
    }

    /// Reads and merges one chunk, returns `false` at the end of input.
    async fn pull(&mut self) -> Result<bool, Error> {
        let Some(chunks) = self.chunks.as_mut() else {
            return Ok(false);
        };
        let Some(chunk) = chunks.next().await else {
            trace!("message stream ended");
            self.chunks = None;
            self.reasoning_phase = false;
            return Ok(false);
        };
        if let Err(err) = chunk.and_then(|chunk| self.merge(chunk)) {
            self.fail(&err);
            return Err(err);
        }
        Ok(true)
    }

    fn merge(&mut self, chunk: ModelChunk) -> Result<(), Error> {
        trace!("got a chunk: {chunk:?}");
        if let Some(error) = chunk.error {
            return Err(Error::Stream(error));
        }

        let reasoning = chunk.reasoning.filter(|text| !text.is_empty());
        let has_reasoning = reasoning.is_some();
        if let Some(reasoning) = reasoning {
            self.reasoning.push_str(&reasoning);
            if self.reasoning_phase {
                self.pending_reasoning.push_back(reasoning);
            }
        }

        if let Some(content) = chunk.content.filter(|text| !text.is_empty()) {
            if !has_reasoning {
                self.reasoning_phase = false;
            }
            self.content.push_str(&content);
            self.pending_content.push_back(content);
        }

        if !chunk.tool_calls.is_empty() {
            self.reasoning_phase = false;
        }
        for delta in chunk.tool_calls {
            let len = self.tool_calls.len();
            let index = delta.index.unwrap_or(len);
            let call = match index.cmp(&len) {
                std::cmp::Ordering::Less => &mut self.tool_calls[index],
                std::cmp::Ordering::Equal => {
                    self.tool_calls.push(PartialCall::default());
                    &mut self.tool_calls[len]
                }
                std::cmp::Ordering::Greater => {
                    return Err(Error::FragmentGap { index, len });
                }
            };
            if let Some(id) = delta.id {
                call.id.push_str(&id);
            }
            if let Some(name) = delta.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = delta.arguments {
                call.arguments.push_str(&arguments);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Message, Error> {
        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for call in self.tool_calls.drain(..) {
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments).map_err(|source| {
                    Error::MalformedToolArguments {
                        name: call.name.clone(),
                        source,
                    }
                })?
            };
            tool_calls.push(ToolCall::function(call.id, call.name, arguments));
        }

        let content = if self.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(Content::Text(std::mem::take(&mut self.content)))
        };
        let reasoning = Some(std::mem::take(&mut self.reasoning))
            .filter(|text| !text.is_empty());
        Ok(Message::Assistant {
            content,
            tool_calls,
            reasoning,
        })
    }
}

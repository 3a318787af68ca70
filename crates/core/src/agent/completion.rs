use std::collections::VecDeque;
use std::mem;

use agentia_model::{Message, ToolCall};
use futures_util::stream::{self, Stream};

use super::Agent;
use crate::Error;
use crate::event::ToolEvent;
use crate::stream::MessageStream;

/// What a turn produces, in order.
#[derive(Clone, Debug)]
pub enum ChatEvent {
    /// A complete assistant message with content.
    Message(Message),
    /// A streamed assistant message. The turn goes on once the stream is
    /// complete, which the completion waits for when asked for the next
    /// event.
    Stream(MessageStream),
    /// A tool is about to run.
    ToolStart(ToolEvent),
    /// A tool finished, the event carries the result.
    ToolEnd(ToolEvent),
}

enum Stage {
    Submit(Vec<Message>),
    Request,
    Streaming(MessageStream),
    ToolCalls(VecDeque<ToolCall>),
    ToolRunning {
        pending: VecDeque<ToolCall>,
        call: ToolCall,
        event: ToolEvent,
    },
    Done,
}

/// One turn of a conversation.
///
/// The model is called repeatedly, running the tools it asks for in
/// between, until it answers without tool calls. Each step only happens
/// when the next event is requested, dropping the completion cancels the
/// rest of the turn.
///
/// After an error, the completion yields nothing further.
pub struct ChatCompletion<'a> {
    agent: &'a mut Agent,
    stream: bool,
    stage: Stage,
    turn_start: usize,
}

impl<'a> ChatCompletion<'a> {
    pub(super) fn new(
        agent: &'a mut Agent,
        messages: Vec<Message>,
        stream: bool,
    ) -> Self {
        Self {
            agent,
            stream,
            stage: Stage::Submit(messages),
            turn_start: 0,
        }
    }

    /// Returns the next event of the turn, or `None` once the model
    /// stopped calling tools.
    pub async fn next_event(&mut self) -> Result<Option<ChatEvent>, Error> {
        let result = self.step().await;
        if let Err(err) = &result {
            error!("{}: turn failed: {err}", self.agent.name);
            self.stage = Stage::Done;
        }
        result
    }

    /// Returns the next assistant message, waiting for streamed ones to
    /// complete and skipping tool events.
    pub async fn next_message(&mut self) -> Result<Option<Message>, Error> {
        loop {
            match self.next_event().await? {
                Some(ChatEvent::Message(msg)) => return Ok(Some(msg)),
                Some(ChatEvent::Stream(stream)) => {
                    return stream.wait_for_completion().await.map(Some);
                }
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Runs the turn to the end, returning the assistant messages.
    pub async fn collect_messages(mut self) -> Result<Vec<Message>, Error> {
        let mut messages = vec![];
        while let Some(msg) = self.next_message().await? {
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Turns the completion into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChatEvent, Error>> + 'a {
        stream::unfold(Some(self), |state| async move {
            let mut this = state?;
            match this.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(this))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    async fn step(&mut self) -> Result<Option<ChatEvent>, Error> {
        loop {
            match mem::replace(&mut self.stage, Stage::Done) {
                Stage::Submit(messages) => {
                    if messages.is_empty() {
                        return Err(Error::EmptyTurn);
                    }
                    self.agent.ensure_initialized().await?;
                    self.turn_start = self.agent.history.len();
                    for msg in messages {
                        self.agent.push_message(msg).await;
                    }
                    self.stage = Stage::Request;
                }
                Stage::Request => {
                    let keep_last = self.agent.history.len() - self.turn_start;
                    let req = self.agent.build_request(keep_last);
                    debug!(
                        "{}: sending {} messages to {}",
                        self.agent.name,
                        req.messages.len(),
                        self.agent.model()
                    );
                    if self.stream {
                        let stream = self.agent.model_client.stream(req).await?;
                        self.stage = Stage::Streaming(stream.clone());
                        return Ok(Some(ChatEvent::Stream(stream)));
                    }
                    let msg = self.agent.model_client.complete(req).await?;
                    let has_content = msg.content().is_some();
                    self.accept(msg.clone()).await?;
                    if has_content {
                        return Ok(Some(ChatEvent::Message(msg)));
                    }
                }
                Stage::Streaming(stream) => {
                    let msg = stream.wait_for_completion().await?;
                    self.accept(msg).await?;
                }
                Stage::ToolCalls(mut pending) => {
                    let Some(call) = pending.pop_front() else {
                        self.stage = Stage::Request;
                        continue;
                    };
                    let display_name = match self.agent.registry.get(&call.function.name) {
                        Some(info) => info.display_name.clone(),
                        None => call.function.name.clone(),
                    };
                    let event = ToolEvent {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        display_name,
                        arguments: call.function.arguments.clone(),
                        result: None,
                    };
                    self.agent.listeners.tool_start(&event).await;
                    self.stage = Stage::ToolRunning {
                        pending,
                        call,
                        event: event.clone(),
                    };
                    return Ok(Some(ChatEvent::ToolStart(event)));
                }
                Stage::ToolRunning {
                    pending,
                    call,
                    mut event,
                } => {
                    let agent = &mut *self.agent;
                    let (result, msg) =
                        agent.registry.call_tool(&call, &agent.listeners).await?;
                    event.result = Some(result);
                    agent.listeners.tool_end(&event).await;
                    agent.push_message(msg).await;
                    self.stage = Stage::ToolCalls(pending);
                    return Ok(Some(ChatEvent::ToolEnd(event)));
                }
                Stage::Done => return Ok(None),
            }
        }
    }

    /// Appends an assistant message, scheduling its tool calls.
    ///
    /// A message with a tool call lacking an id never reaches the history.
    async fn accept(&mut self, msg: Message) -> Result<(), Error> {
        if let Some(call) = msg.tool_calls().iter().find(|call| call.id.is_empty()) {
            return Err(Error::MissingCorrelation(call.function.name.clone()));
        }
        let pending: VecDeque<_> = msg.tool_calls().iter().cloned().collect();
        debug!(
            "{}: got a message with {} tool calls",
            self.agent.name,
            pending.len()
        );
        self.agent.push_message(msg).await;
        self.stage = if pending.is_empty() {
            Stage::Done
        } else {
            Stage::ToolCalls(pending)
        };
        Ok(())
    }
}

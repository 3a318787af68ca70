//! Observer callbacks for the conversation loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A tool call starting or ending.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolEvent {
    /// The tool call id.
    pub id: String,
    /// Name of the tool.
    pub name: String,
    /// Name of the tool shown to users.
    pub display_name: String,
    /// Arguments passed to the tool.
    pub arguments: Value,
    /// The result, only present when the call ended.
    pub result: Option<Value>,
}

/// An agent handing a job to a colleague, or getting the answer back.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommunicationEvent {
    /// Generated id shared by the start and end events.
    pub id: String,
    /// Name of the agent dispatching the job.
    pub parent: String,
    /// Name of the colleague doing the job.
    pub child: String,
    /// The job description.
    pub message: String,
    /// The colleague's messages, only present when the job ended.
    pub response: Option<Value>,
}

/// A tool asking the user for consent before running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentRequest {
    /// Name of the tool.
    pub tool: String,
    /// Name of the tool shown to users.
    pub display_name: String,
    /// What the user is asked.
    pub prompt: String,
}

/// Receives events from the conversation loop.
///
/// Every callback is awaited before the loop proceeds.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Called before a tool runs.
    async fn on_tool_start(&self, _event: &ToolEvent) {}

    /// Called after a tool ran.
    async fn on_tool_end(&self, _event: &ToolEvent) {}

    /// Asks the user whether a tool may run, consenting by default.
    async fn on_user_consent(&self, _request: &ConsentRequest) -> bool {
        true
    }

    /// Called when a job is dispatched to a colleague.
    async fn on_communication_start(&self, _event: &CommunicationEvent) {}

    /// Called when a colleague finished a job.
    async fn on_communication_end(&self, _event: &CommunicationEvent) {}
}

#[derive(Clone, Default)]
pub(crate) struct Listeners(Vec<Arc<dyn Listener>>);

impl Listeners {
    #[inline]
    pub fn push(&mut self, listener: Arc<dyn Listener>) {
        self.0.push(listener);
    }

    pub async fn tool_start(&self, event: &ToolEvent) {
        for listener in &self.0 {
            listener.on_tool_start(event).await;
        }
    }

    pub async fn tool_end(&self, event: &ToolEvent) {
        for listener in &self.0 {
            listener.on_tool_end(event).await;
        }
    }

    /// Returns `false` as soon as one listener refuses.
    pub async fn consent(&self, request: &ConsentRequest) -> bool {
        for listener in &self.0 {
            if !listener.on_user_consent(request).await {
                return false;
            }
        }
        true
    }

    pub async fn communication_start(&self, event: &CommunicationEvent) {
        for listener in &self.0 {
            listener.on_communication_start(event).await;
        }
    }

    pub async fn communication_end(&self, event: &CommunicationEvent) {
        for listener in &self.0 {
            listener.on_communication_end(event).await;
        }
    }
}

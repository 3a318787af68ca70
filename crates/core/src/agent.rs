mod builder;
mod completion;
mod dispatch;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use agentia_model::{Message, ModelRequest};

use crate::Error;
use crate::config::AgentConfig;
use crate::event::Listeners;
use crate::history::History;
use crate::model_client::ModelClient;
use crate::plugin::{Plugin, PluginContext};
use crate::tool::{Registry, ToolInfo};
pub use builder::AgentBuilder;
pub use completion::{ChatCompletion, ChatEvent};

/// An agent, which maintains a conversation history, a model client, and
/// the tools the model may call.
///
/// The agent serves one turn at a time: a turn borrows the agent mutably
/// until its [`ChatCompletion`] is dropped.
pub struct Agent {
    name: String,
    description: Option<String>,
    config: AgentConfig,
    model_client: ModelClient,
    registry: Registry,
    listeners: Listeners,
    history: History,
    initialized: bool,
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns what the agent is good at, shown to other agents.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the model the agent talks to.
    #[inline]
    pub fn model(&self) -> &str {
        self.model_client.model()
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the conversation history.
    #[inline]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Returns the registered tools, ordered by name.
    #[inline]
    pub fn tools(&self) -> impl Iterator<Item = &ToolInfo> {
        self.registry.tools()
    }

    /// Returns the plugin with the given name.
    #[inline]
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.plugin(name)
    }

    /// Forgets the conversation, keeping the instructions.
    #[inline]
    pub fn reset(&mut self) {
        debug!("resetting history of {}", self.name);
        self.history.reset();
    }

    /// Exports the conversation as JSON.
    pub fn raw_history(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self.history.messages())?)
    }

    /// Replaces the conversation with one exported by
    /// [`raw_history`](Self::raw_history).
    pub fn set_raw_history(&mut self, raw: &str) -> Result<(), Error> {
        let messages: Vec<Message> = serde_json::from_str(raw)?;
        self.history.set_messages(messages);
        Ok(())
    }

    /// Starts a turn with the given messages, usually a single user
    /// message.
    ///
    /// Nothing happens until the returned completion is polled.
    #[inline]
    pub fn chat_completion(
        &mut self,
        messages: Vec<Message>,
        stream: bool,
    ) -> ChatCompletion<'_> {
        ChatCompletion::new(self, messages, stream)
    }

    async fn ensure_initialized(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }
        let ctx = PluginContext {
            agent_name: self.name.clone(),
            data_dir: self.config.data_dir().to_owned(),
        };
        self.registry.init_plugins(&ctx).await?;
        self.initialized = true;
        Ok(())
    }

    async fn push_message(&mut self, msg: Message) {
        trace!("{}: new message: {msg:?}", self.name);
        self.registry.notify_plugins(&msg).await;
        self.history.add(msg);
    }

    fn build_request(&self, keep_last: usize) -> ModelRequest {
        ModelRequest {
            messages: self.history.for_inference(keep_last),
            tools: self.registry.definitions(),
            options: *self.config.options(),
        }
    }
}

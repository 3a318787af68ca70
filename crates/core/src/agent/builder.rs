use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agentia_model::ModelProvider;
use tokio::sync::Mutex;

use super::Agent;
use super::dispatch::{Colleague, DispatchTool};
use crate::Error;
use crate::config::AgentConfig;
use crate::event::{Listener, Listeners};
use crate::history::{History, Tiktoken, TokenCounter};
use crate::model_client::ModelClient;
use crate::plugin::Plugin;
use crate::tool::{Registry, Tool};

static NEXT_AGENT_ID: AtomicU64 = AtomicU64::new(1);

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    name: Option<String>,
    description: Option<String>,
    instructions: Option<String>,
    config: AgentConfig,
    registry: Registry,
    listeners: Listeners,
    colleagues: BTreeMap<String, Colleague>,
    token_counter: Arc<dyn TokenCounter>,
    error: Option<Error>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            name: None,
            description: None,
            instructions: None,
            config: AgentConfig::default(),
            registry: Registry::default(),
            listeners: Listeners::default(),
            colleagues: BTreeMap::new(),
            token_counter: Arc::new(Tiktoken),
            error: None,
        }
    }

    /// Sets the name of the agent, `Agent#<n>` by default.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets what the agent is good at, shown to other agents.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the instructions, kept at the start of the history.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets the configuration.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a tool.
    ///
    /// An invalid parameter schema is reported by [`build`](Self::build).
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        if let Err(err) = self.registry.add_tool(tool) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Registers a plugin and its tools.
    #[inline]
    pub fn with_plugin<P: Plugin>(mut self, plugin: P) -> Self {
        if let Err(err) = self.registry.add_plugin(Arc::new(plugin)) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Adds a listener.
    #[inline]
    pub fn with_listener<L: Listener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Adds a colleague the agent may dispatch jobs to.
    ///
    /// The colleague is addressed by its name.
    #[inline]
    pub fn with_colleague(mut self, agent: Agent) -> Self {
        let name = agent.name.clone();
        let colleague = Colleague {
            description: agent.description.clone(),
            agent: Arc::new(Mutex::new(agent)),
        };
        self.colleagues.insert(name, colleague);
        self
    }

    /// Replaces the tokenizer used to trim the history.
    #[inline]
    pub fn with_token_counter<C: TokenCounter + 'static>(
        mut self,
        counter: C,
    ) -> Self {
        self.token_counter = Arc::new(counter);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<Agent, Error> {
        let Self {
            model_client,
            name,
            description,
            instructions,
            config,
            mut registry,
            listeners,
            colleagues,
            token_counter,
            error,
        } = self;
        if let Some(err) = error {
            return Err(err);
        }

        let name = name.unwrap_or_else(|| {
            format!("Agent#{}", NEXT_AGENT_ID.fetch_add(1, Ordering::Relaxed))
        });
        if !colleagues.is_empty() {
            registry.add_tool(DispatchTool::new(
                &name,
                colleagues,
                listeners.clone(),
            ))?;
        }
        let history =
            History::new(instructions, config.token_limit(), token_counter);
        debug!("built agent {name} with model {}", model_client.model());

        Ok(Agent {
            name,
            description,
            config,
            model_client,
            registry,
            listeners,
            history,
            initialized: false,
        })
    }
}


//! Plugins, bundles of tools sharing some state.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentia_model::Message;
use async_trait::async_trait;

use crate::tool::{AnyTool, Tool, ToolObject};

/// A plugin, registering a set of tools under its name.
///
/// Tools of a plugin are exposed to the model as `<ShortName>__<tool>`,
/// where the short name is the plugin's name without a trailing `Plugin`.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Returns the name of the plugin.
    fn name(&self) -> &str;

    /// Adds the tools of the plugin.
    fn register(&self, tools: &mut PluginTools);

    /// Called once before the first turn of the agent.
    async fn init(
        &self,
        _ctx: &PluginContext,
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        Ok(())
    }

    /// Called for every message added to the history.
    async fn on_new_chat_message(&self, _msg: &Message) {}
}

/// The registration table filled by [`Plugin::register`].
#[derive(Default)]
pub struct PluginTools {
    pub(crate) tools: Vec<Arc<dyn ToolObject>>,
}

impl PluginTools {
    /// Adds a tool.
    #[inline]
    pub fn add<T: Tool>(&mut self, tool: T) {
        self.tools.push(Arc::new(AnyTool(tool)));
    }
}

/// What a plugin knows about the agent it is attached to.
#[derive(Clone, Debug)]
pub struct PluginContext {
    pub(crate) agent_name: String,
    pub(crate) data_dir: PathBuf,
}

impl PluginContext {
    /// Creates a context, for initializing plugins outside of an agent.
    #[inline]
    pub fn new<S: Into<String>, P: Into<PathBuf>>(
        agent_name: S,
        data_dir: P,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Returns the name of the agent.
    #[inline]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Returns the directory the agent keeps its data in.
    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Returns the plugin name used to prefix its tools.
#[inline]
pub(crate) fn short_name(name: &str) -> &str {
    match name.strip_suffix("Plugin") {
        Some(short) if !short.is_empty() => short,
        _ => name,
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use agentia_model::{FunctionCall, Message, ModelTool, ToolCall};
use serde_json::{Value, json};
use tracing::Instrument;

use super::{AnyTool, Error as ToolError, Tool, ToolInfo, ToolObject, schema};
use crate::Error;
use crate::event::{ConsentRequest, Listeners};
use crate::plugin::{Plugin, PluginContext, PluginTools, short_name};

const MAX_LOGGED_CHARS: usize = 200;

struct Entry {
    info: ToolInfo,
    tool: Arc<dyn ToolObject>,
}

/// Tools and plugins of an agent, keyed by the tool names the model sees.
#[derive(Default)]
pub(crate) struct Registry {
    tools: BTreeMap<String, Entry>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Registry {
    /// Registers a tool, replacing a previous one with the same name.
    pub fn add_tool<T: Tool>(&mut self, tool: T) -> Result<(), Error> {
        self.insert(None, Arc::new(AnyTool(tool)))
    }

    /// Registers a plugin and all of its tools.
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), Error> {
        let mut tools = PluginTools::default();
        plugin.register(&mut tools);
        let prefix = short_name(plugin.name());
        for tool in tools.tools {
            self.insert(Some(prefix), tool)?;
        }
        self.plugins.push(plugin);
        Ok(())
    }

    fn insert(
        &mut self,
        prefix: Option<&str>,
        tool: Arc<dyn ToolObject>,
    ) -> Result<(), Error> {
        let name = match prefix {
            Some(prefix) => format!("{prefix}__{}", tool.name()),
            None => tool.name().to_owned(),
        };
        let info = ToolInfo {
            name: name.clone(),
            display_name: tool.display_name().to_owned(),
            description: tool.description().to_owned(),
            parameters: schema::normalize(&name, tool.parameter_schema())?,
        };
        debug!("registered tool `{name}`");
        if self.tools.insert(name.clone(), Entry { info, tool }).is_some() {
            warn!("tool `{name}` registered twice, the last one wins");
        }
        Ok(())
    }

    #[inline]
    pub fn tools(&self) -> impl Iterator<Item = &ToolInfo> {
        self.tools.values().map(|entry| &entry.info)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&ToolInfo> {
        self.tools.get(name).map(|entry| &entry.info)
    }

    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools()
            .map(|info| ModelTool {
                name: info.name.clone(),
                description: info.description.clone(),
                parameters: info.parameters.clone(),
            })
            .collect()
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
    }

    pub async fn init_plugins(&self, ctx: &PluginContext) -> Result<(), Error> {
        for plugin in &self.plugins {
            debug!("initializing plugin `{}`", plugin.name());
            plugin.init(ctx).await.map_err(|err| Error::Plugin {
                name: plugin.name().to_owned(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }

    pub async fn notify_plugins(&self, msg: &Message) {
        for plugin in &self.plugins {
            plugin.on_new_chat_message(msg).await;
        }
    }

    /// Runs a tool, failing if it is unknown or does not succeed.
    ///
    /// The tool runs on its own task, so it is not interrupted if the
    /// caller goes away.
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        listeners: &Listeners,
    ) -> Result<Value, Error> {
        let Some(entry) = self.tools.get(name) else {
            return Err(Error::ToolNotFound(name.to_owned()));
        };
        let failed = |err: ToolError| Error::ToolExecution {
            name: name.to_owned(),
            reason: err.reason().into_owned(),
        };

        let prepared = entry.tool.prepare(arguments).map_err(failed)?;
        if let Some(prompt) = prepared.consent {
            let req = ConsentRequest {
                tool: name.to_owned(),
                display_name: entry.info.display_name.clone(),
                prompt,
            };
            if !listeners.consent(&req).await {
                return Err(failed(ToolError::permission_denied()));
            }
        }

        let task = tokio::spawn(
            prepared.run.instrument(debug_span!("tool execute", tool = name)),
        );
        match task.await {
            Ok(result) => result.map_err(failed),
            Err(err) => Err(failed(
                ToolError::execution_error().with_reason(err.to_string()),
            )),
        }
    }

    /// Runs a tool, turning every failure into an `{"error": ...}` result.
    pub async fn call_function_raw(
        &self,
        name: &str,
        arguments: Value,
        call_id: &str,
        listeners: &Listeners,
    ) -> Value {
        info!(
            "GPT-Tool[{call_id}] {name} {}",
            truncate(&arguments.to_string())
        );
        let result = match self.call(name, arguments, listeners).await {
            Ok(result) => result,
            Err(err) => {
                warn!("GPT-Tool[{call_id}] {err}");
                json!({ "error": err.to_string() })
            }
        };
        debug!(
            "GPT-Tool[{call_id}] {name} -> {}",
            truncate(&result.to_string())
        );
        result
    }

    #[inline]
    pub async fn call_function(
        &self,
        call: &FunctionCall,
        call_id: &str,
        listeners: &Listeners,
    ) -> Value {
        self.call_function_raw(
            &call.name,
            call.arguments.clone(),
            call_id,
            listeners,
        )
        .await
    }

    /// Runs a tool call, returning its result and the message answering
    /// it.
    pub async fn call_tool(
        &self,
        call: &ToolCall,
        listeners: &Listeners,
    ) -> Result<(Value, Message), Error> {
        if call.id.is_empty() {
            return Err(Error::MissingCorrelation(call.function.name.clone()));
        }
        let result = self.call_function(&call.function, &call.id, listeners).await;
        let content = match &result {
            Value::String(text) => text.clone(),
            result => result.to_string(),
        };
        Ok((result, Message::tool(&call.id, content)))
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_LOGGED_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

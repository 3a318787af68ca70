use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use agentia_core::tool::{self, Tool, ToolResult, parameters_of};
use agentia_core::{Plugin, PluginContext, PluginTools};
use async_trait::async_trait;
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

const MEMORY_FILE: &str = "memory";
const LOCK_FILE: &str = "memory.lock";

/// Long-term memory, kept as an append-only file in the agent's data
/// directory.
///
/// Appends are serialized across processes with an advisory lock on a
/// sibling `memory.lock` file.
#[derive(Default)]
pub struct MemoryPlugin {
    dir: Arc<OnceLock<PathBuf>>,
}

impl MemoryPlugin {
    /// Creates a memory plugin. Its directory is known once initialized.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for MemoryPlugin {
    fn name(&self) -> &str {
        "MemoryPlugin"
    }

    fn register(&self, tools: &mut PluginTools) {
        tools.add(RememberTool {
            dir: Arc::clone(&self.dir),
            parameter_schema: parameters_of::<RememberParameters>(),
        });
        tools.add(RecallTool {
            dir: Arc::clone(&self.dir),
            parameter_schema: parameters_of::<RecallParameters>(),
        });
    }

    async fn init(
        &self,
        ctx: &PluginContext,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = ctx.data_dir().join(ctx.agent_name());
        tokio::fs::create_dir_all(&dir).await?;
        debug!("memory of {} kept in {}", ctx.agent_name(), dir.display());
        // Re-initialization keeps the first directory.
        let _ = self.dir.set(dir);
        Ok(())
    }
}

fn memory_dir(dir: &OnceLock<PathBuf>) -> Result<PathBuf, tool::Error> {
    dir.get().cloned().ok_or_else(|| {
        tool::Error::execution_error().with_reason("Memory is not initialized")
    })
}

#[derive(Deserialize, JsonSchema)]
pub struct RememberParameters {
    #[schemars(description = "The content to remember. Keep it short and brief.")]
    content: String,
}

struct RememberTool {
    dir: Arc<OnceLock<PathBuf>>,
    parameter_schema: Value,
}

impl Tool for RememberTool {
    type Input = RememberParameters;

    fn name(&self) -> &str {
        "remember"
    }

    fn display_name(&self) -> &str {
        "Remember"
    }

    fn description(&self) -> &str {
        "Permanently remember something in your memory, as long as you think \
        it's important or will be useful in the future. Use this to remember \
        any important information whilst you are chatting with the user or \
        fulfilling tasks."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: RememberParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let dir = memory_dir(&self.dir);
        async move {
            let dir = dir?;
            let content = input.content;
            tokio::task::spawn_blocking(move || append(&dir, &content))
                .await
                .map_err(|err| {
                    tool::Error::execution_error().with_reason(err.to_string())
                })?
                .map_err(|err| {
                    tool::Error::execution_error()
                        .with_reason(format!("Failed to remember: {err}"))
                })?;
            Ok(json!("Remembered"))
        }
    }
}

fn append(dir: &Path, content: &str) -> io::Result<()> {
    let lock = File::create(dir.join(LOCK_FILE))?;
    lock.lock()?;
    let time = Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(MEMORY_FILE))?;
    writeln!(file, "[{time}] {content}")?;
    info!("REMEMBER: {content}");
    // Released on drop as well.
    lock.unlock()
}

#[derive(Deserialize, JsonSchema)]
pub struct RecallParameters {}

struct RecallTool {
    dir: Arc<OnceLock<PathBuf>>,
    parameter_schema: Value,
}

impl Tool for RecallTool {
    type Input = RecallParameters;

    fn name(&self) -> &str {
        "recall"
    }

    fn display_name(&self) -> &str {
        "Recall"
    }

    fn description(&self) -> &str {
        "Recall all the things you remembered."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: RecallParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let dir = memory_dir(&self.dir);
        async move {
            let path = dir?.join(MEMORY_FILE);
            let memory = tokio::task::spawn_blocking(move || fs::read_to_string(path))
                .await
                .map_err(|err| {
                    tool::Error::execution_error().with_reason(err.to_string())
                })?;
            match memory {
                Ok(memory) => Ok(json!(memory)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    Ok(json!("I don't remember anything"))
                }
                Err(err) => Err(tool::Error::execution_error()
                    .with_reason(format!("Failed to recall: {err}"))),
            }
        }
    }
}

use std::future::ready;

use agentia_core::tool::{Tool, ToolResult, parameters_of};
use agentia_core::{Plugin, PluginTools};
use chrono::{Local, SecondsFormat};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

/// Tells the model what time it is.
#[derive(Default)]
pub struct ClockPlugin;

impl Plugin for ClockPlugin {
    fn name(&self) -> &str {
        "ClockPlugin"
    }

    fn register(&self, tools: &mut PluginTools) {
        tools.add(GetCurrentTimeTool {
            parameter_schema: parameters_of::<GetCurrentTimeParameters>(),
        });
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct GetCurrentTimeParameters {}

struct GetCurrentTimeTool {
    parameter_schema: Value,
}

impl Tool for GetCurrentTimeTool {
    type Input = GetCurrentTimeParameters;

    fn name(&self) -> &str {
        "get_current_time"
    }

    fn display_name(&self) -> &str {
        "Check the clock"
    }

    fn description(&self) -> &str {
        "Get the current local time in ISO 8601 format, with the UTC offset."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        _input: GetCurrentTimeParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        ready(Ok(json!(now)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[tokio::test]
    async fn test_get_current_time() {
        let tool = GetCurrentTimeTool {
            parameter_schema: parameters_of::<GetCurrentTimeParameters>(),
        };
        let result = tool.execute(GetCurrentTimeParameters {}).await.unwrap();
        let now = result.as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(now).is_ok());
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agentia_model::Message;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::Agent;
use crate::event::{CommunicationEvent, Listeners};
use crate::tool::{self, Tool, ToolResult};

pub(crate) struct Colleague {
    pub description: Option<String>,
    pub agent: Arc<Mutex<Agent>>,
}

#[derive(Deserialize)]
pub(crate) struct DispatchJob {
    agent: String,
    job: String,
}

/// Hands jobs over to colleague agents.
pub(crate) struct DispatchTool {
    parent: String,
    description: String,
    parameter_schema: Value,
    colleagues: Arc<BTreeMap<String, Colleague>>,
    listeners: Listeners,
    next_id: AtomicU64,
}

impl DispatchTool {
    pub fn new(
        parent: &str,
        colleagues: BTreeMap<String, Colleague>,
        listeners: Listeners,
    ) -> Self {
        let mut description = "Dispatch a job to one of your colleagues, \
            who will do it and report back with their messages.\n\
            Available colleagues:"
            .to_owned();
        for (name, colleague) in &colleagues {
            description.push_str(&format!(
                "\n- {name}: {}",
                colleague.description.as_deref().unwrap_or("(no description)")
            ));
        }
        let names: Vec<&String> = colleagues.keys().collect();
        let parameter_schema = json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "enum": names,
                    "description": "Name of the colleague to do the job."
                },
                "job": {
                    "type": "string",
                    "description": "What to do, with all the context needed."
                }
            },
            "required": ["agent", "job"]
        });

        Self {
            parent: parent.to_owned(),
            description,
            parameter_schema,
            colleagues: Arc::new(colleagues),
            listeners,
            next_id: AtomicU64::new(1),
        }
    }
}

impl Tool for DispatchTool {
    type Input = DispatchJob;

    fn name(&self) -> &str {
        "dispatch_job"
    }

    fn display_name(&self) -> &str {
        "Dispatch a job"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: DispatchJob,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let colleague = self
            .colleagues
            .get(&input.agent)
            .map(|colleague| Arc::clone(&colleague.agent));
        let mut event = CommunicationEvent {
            id: format!(
                "{}-{}",
                self.parent,
                self.next_id.fetch_add(1, Ordering::Relaxed)
            ),
            parent: self.parent.clone(),
            child: input.agent,
            message: input.job,
            response: None,
        };
        let listeners = self.listeners.clone();

        async move {
            let Some(colleague) = colleague else {
                return Err(tool::Error::invalid_input()
                    .with_reason(format!("Unknown agent `{}`", event.child)));
            };
            // A colleague already on a job is busy, not waited for.
            let Ok(mut agent) = colleague.try_lock() else {
                return Err(tool::Error::execution_error()
                    .with_reason(format!("Agent `{}` is busy", event.child)));
            };
            info!("{} -> {}: {}", event.parent, event.child, event.message);
            listeners.communication_start(&event).await;

            let result = agent
                .chat_completion(vec![Message::user(event.message.clone())], false)
                .collect_messages()
                .await;
            let response = match &result {
                Ok(messages) => tool::to_result(messages)?,
                Err(err) => json!({ "error": err.to_string() }),
            };

            event.response = Some(response.clone());
            listeners.communication_end(&event).await;
            match result {
                Ok(_) => Ok(response),
                Err(err) => Err(tool::Error::execution_error()
                    .with_reason(err.to_string())),
            }
        }
    }
}

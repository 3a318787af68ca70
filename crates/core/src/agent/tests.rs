use std::sync::{Arc, Mutex};

use agentia_model::{ErrorKind, Message, Role, ToolCall};
use agentia_test_model::{PresetResponse, TestModelProvider};
use async_trait::async_trait;
use futures_util::StreamExt;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::tool::{Tool, tool_fn};
use crate::{
    Agent, AgentBuilder, AgentConfig, ChatEvent, CommunicationEvent, Error,
    Listener, Plugin, PluginContext, PluginTools, ToolEvent,
};

#[derive(Deserialize, JsonSchema)]
struct WeatherInput {
    #[schemars(description = "The city and state, e.g. San Francisco, CA")]
    location: String,
}

fn weather_tool() -> impl Tool {
    tool_fn(
        "get_current_weather",
        "Get the current weather in a given location",
        |input: WeatherInput| async move {
            Ok(json!({
                "location": input.location,
                "temperature": "72",
                "unit": "fahrenheit",
            }))
        },
    )
}

fn weather_call(id: &str) -> ToolCall {
    ToolCall::function(
        id,
        "get_current_weather",
        json!({ "location": "Boston, MA" }),
    )
}

fn weather_provider() -> TestModelProvider {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([weather_call("call_1")]));
    provider.add_response(PresetResponse::text(
        "It is 72 degrees and sunny in Boston.",
    ));
    provider
}

/// Runs a turn, describing every event as a line.
async fn run_turn(agent: &mut Agent, input: &str, stream: bool) -> Vec<String> {
    let mut completion = agent.chat_completion(vec![Message::user(input)], stream);
    let mut lines = vec![];
    while let Some(event) = completion.next_event().await.unwrap() {
        lines.push(match event {
            ChatEvent::Message(msg) => format!("message: {}", msg.text()),
            ChatEvent::Stream(stream) => {
                let mut text = String::new();
                while let Some(delta) = stream.next_delta().await.unwrap() {
                    text.push_str(&delta);
                }
                format!("stream: {text}")
            }
            ChatEvent::ToolStart(event) => format!("start {}", event.id),
            ChatEvent::ToolEnd(event) => format!(
                "end {} {}",
                event.id,
                event.result.unwrap_or_default()
            ),
        });
    }
    lines
}

#[tokio::test]
async fn test_weather_turn() {
    let provider = weather_provider();
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(weather_tool())
        .build()
        .unwrap();

    let lines =
        run_turn(&mut agent, "What's the weather like in Boston?", false).await;
    assert_eq!(
        lines,
        [
            "start call_1",
            r#"end call_1 {"location":"Boston, MA","temperature":"72","unit":"fahrenheit"}"#,
            "message: It is 72 degrees and sunny in Boston.",
        ]
    );

    let roles: Vec<_> =
        agent.history().messages().iter().map(Message::role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "get_current_weather");
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[2].role(), Role::Tool);
}

#[tokio::test]
async fn test_weather_turn_streaming() {
    let mut agent = AgentBuilder::with_model_provider(weather_provider())
        .with_tool(weather_tool())
        .build()
        .unwrap();

    let lines =
        run_turn(&mut agent, "What's the weather like in Boston?", true).await;
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "stream: ");
    assert_eq!(lines[1], "start call_1");
    assert!(lines[2].starts_with("end call_1 "));
    assert!(lines[3].starts_with("stream: ") && lines[3].contains("72"));

    let last = agent.history().messages().last().unwrap();
    assert_eq!(last, &Message::assistant("It is 72 degrees and sunny in Boston."));
}

#[tokio::test]
async fn test_collect_messages() {
    let mut agent = AgentBuilder::with_model_provider(weather_provider())
        .with_tool(weather_tool())
        .build()
        .unwrap();
    let messages = agent
        .chat_completion(vec![Message::user("Weather in Boston?")], true)
        .collect_messages()
        .await
        .unwrap();
    // The streamed tool call message comes first, without content.
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].tool_calls(), &[weather_call("call_1")]);
    assert!(messages[1].text().contains("72"));
}

#[tokio::test]
async fn test_into_stream() {
    let mut agent = AgentBuilder::with_model_provider(weather_provider())
        .with_tool(weather_tool())
        .build()
        .unwrap();
    let events: Vec<_> = agent
        .chat_completion(vec![Message::user("Weather in Boston?")], false)
        .into_stream()
        .collect()
        .await;
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Ok(ChatEvent::ToolStart(_))));
    assert!(matches!(events[2], Ok(ChatEvent::Message(_))));
}

#[tokio::test]
async fn test_tool_not_found() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([ToolCall::function(
        "call_1",
        "get_time",
        json!({}),
    )]));
    provider.add_response(PresetResponse::text("I can't tell the time."));
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .build()
        .unwrap();

    let lines = run_turn(&mut agent, "What time is it?", false).await;
    assert_eq!(
        lines,
        [
            "start call_1",
            r#"end call_1 {"error":"Tool `get_time` not found"}"#,
            "message: I can't tell the time.",
        ]
    );
    // Without tools, the request carries no tool schema.
    assert!(provider.requests()[0].tools.is_empty());
}

#[tokio::test]
async fn test_sequential_tool_calls() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([
        weather_call("call_1"),
        ToolCall::function(
            "call_2",
            "get_current_weather",
            json!({ "location": "Tokyo" }),
        ),
    ]));
    provider.add_response(PresetResponse::text("Both are warm."));
    let mut agent = AgentBuilder::with_model_provider(provider)
        .with_tool(weather_tool())
        .build()
        .unwrap();

    let lines = run_turn(&mut agent, "Boston and Tokyo?", false).await;
    assert_eq!(lines[0], "start call_1");
    assert!(lines[1].starts_with("end call_1"));
    assert_eq!(lines[2], "start call_2");
    assert!(lines[3].contains("Tokyo"));
    assert_eq!(lines[4], "message: Both are warm.");

    let tool_ids: Vec<_> = agent
        .history()
        .messages()
        .iter()
        .filter_map(|msg| match msg {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tool_ids, ["call_1", "call_2"]);
}

#[tokio::test]
async fn test_empty_turn() {
    let mut agent =
        AgentBuilder::with_model_provider(TestModelProvider::default())
            .build()
            .unwrap();
    let mut completion = agent.chat_completion(vec![], false);
    assert!(matches!(completion.next_event().await, Err(Error::EmptyTurn)));
    assert!(completion.next_event().await.unwrap().is_none());
}

#[tokio::test]
async fn test_provider_errors() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::failing(ErrorKind::Protocol));
    let mut agent = AgentBuilder::with_model_provider(provider)
        .build()
        .unwrap();
    let mut completion = agent.chat_completion(vec![Message::user("Hi")], false);
    assert!(matches!(
        completion.next_event().await,
        Err(Error::BackendProtocol(_))
    ));
    assert!(completion.next_event().await.unwrap().is_none());

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::failing(ErrorKind::RateLimitExceeded));
    let mut agent = AgentBuilder::with_model_provider(provider)
        .build()
        .unwrap();
    let err = agent
        .chat_completion(vec![Message::user("Hi")], true)
        .collect_messages()
        .await
        .unwrap_err();
    match err {
        Error::Provider(err) => {
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded)
        }
        err => panic!("expected a provider error, got {err:?}"),
    }
}

#[tokio::test]
async fn test_malformed_streamed_arguments() {
    use agentia_model::{ModelChunk, ToolCallDelta};
    use agentia_test_model::PresetEvent;

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([PresetEvent::Chunk(
        ModelChunk::from_tool_call(
            ToolCallDelta::new(0)
                .with_id("call_1")
                .with_name("get_current_weather")
                .with_arguments("{\"location\""),
        ),
    )]));
    let mut agent = AgentBuilder::with_model_provider(provider)
        .with_tool(weather_tool())
        .build()
        .unwrap();
    let mut completion = agent.chat_completion(vec![Message::user("Hi")], true);
    let Some(ChatEvent::Stream(_)) = completion.next_event().await.unwrap() else {
        panic!("expected a stream");
    };
    assert!(matches!(
        completion.next_event().await,
        Err(Error::MalformedToolArguments { .. })
    ));
}

#[derive(Default)]
struct Recorder {
    inits: Mutex<usize>,
    roles: Arc<Mutex<Vec<Role>>>,
}

#[derive(Deserialize, JsonSchema)]
struct EchoInput {
    text: String,
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        "RecorderPlugin"
    }

    fn register(&self, tools: &mut PluginTools) {
        tools.add(tool_fn("echo", "Echoes the text", |input: EchoInput| {
            async move { Ok(json!(input.text)) }
        }));
    }

    async fn init(
        &self,
        ctx: &PluginContext,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        assert_eq!(ctx.agent_name(), "Recording");
        *self.inits.lock().unwrap() += 1;
        if *self.inits.lock().unwrap() > 1 {
            return Err("initialized twice".into());
        }
        Ok(())
    }

    async fn on_new_chat_message(&self, msg: &Message) {
        self.roles.lock().unwrap().push(msg.role());
    }
}

#[tokio::test]
async fn test_plugin() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([ToolCall::function(
        "call_1",
        "Recorder__echo",
        json!({ "text": "ping" }),
    )]));
    provider.add_response(PresetResponse::text("ping"));
    provider.add_response(PresetResponse::text("Still here."));

    let recorder = Recorder::default();
    let roles = Arc::clone(&recorder.roles);
    let mut agent = AgentBuilder::with_model_provider(provider)
        .with_name("Recording")
        .with_plugin(recorder)
        .build()
        .unwrap();
    let names: Vec<_> = agent.tools().map(|info| info.name.as_str()).collect();
    assert_eq!(names, ["Recorder__echo"]);
    assert!(agent.plugin("RecorderPlugin").is_some());

    let lines = run_turn(&mut agent, "Say ping", false).await;
    assert_eq!(lines[1], "end call_1 \"ping\"");
    // The tool message carries string results verbatim.
    assert_eq!(
        agent.history().messages()[2],
        Message::tool("call_1", "ping")
    );

    run_turn(&mut agent, "Are you there?", false).await;
    assert_eq!(
        *roles.lock().unwrap(),
        [
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
}

#[derive(Default)]
struct EventLog {
    lines: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Listener for EventLog {
    async fn on_tool_start(&self, event: &ToolEvent) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("tool start {}", event.display_name));
    }

    async fn on_tool_end(&self, event: &ToolEvent) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("tool end {}", event.result.is_some()));
    }

    async fn on_communication_start(&self, event: &CommunicationEvent) {
        self.lines.lock().unwrap().push(format!(
            "comm start {} {} -> {}",
            event.id, event.parent, event.child
        ));
    }

    async fn on_communication_end(&self, event: &CommunicationEvent) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("comm end {}", event.id));
    }
}

#[tokio::test]
async fn test_dispatch_job() {
    let mut helper_provider = TestModelProvider::default();
    helper_provider.add_response(PresetResponse::text("Done: 42"));
    let helper = AgentBuilder::with_model_provider(helper_provider)
        .with_name("Helper")
        .with_description("Good at maths")
        .build()
        .unwrap();

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([ToolCall::function(
        "call_1",
        "dispatch_job",
        json!({ "agent": "Helper", "job": "Compute 6 * 7" }),
    )]));
    provider.add_response(PresetResponse::text("The helper says 42."));

    let log = EventLog::default();
    let lines = Arc::clone(&log.lines);
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_name("Boss")
        .with_colleague(helper)
        .with_listener(log)
        .build()
        .unwrap();

    let tool = agent.tools().next().unwrap();
    assert_eq!(tool.name, "dispatch_job");
    assert!(tool.description.contains("- Helper: Good at maths"));
    assert_eq!(tool.parameters["properties"]["agent"]["enum"], json!(["Helper"]));

    let messages = agent
        .chat_completion(vec![Message::user("What is 6 * 7?")], false)
        .collect_messages()
        .await
        .unwrap();
    assert_eq!(messages, [Message::assistant("The helper says 42.")]);

    let Message::Tool { content, .. } = &agent.history().messages()[2] else {
        panic!("expected a tool message");
    };
    let response: serde_json::Value = serde_json::from_str(content).unwrap();
    assert_eq!(response[0]["content"], "Done: 42");

    assert_eq!(
        *lines.lock().unwrap(),
        [
            "tool start Dispatch a job",
            "comm start Boss-1 Boss -> Helper",
            "comm end Boss-1",
            "tool end true",
        ]
    );
}

#[tokio::test]
async fn test_trim_keeps_current_turn() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::text("ok"));
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_instructions("sys")
        .with_config(AgentConfig::default().with_token_limit(10))
        .with_token_counter(|text: &str| text.len())
        .build()
        .unwrap();
    agent
        .set_raw_history(
            &serde_json::to_string(&[
                Message::user("x".repeat(50)),
                Message::user("y".repeat(50)),
            ])
            .unwrap(),
        )
        .unwrap();

    run_turn(&mut agent, "hi", false).await;
    // Step selection counts assistant messages, none were kept.
    assert_eq!(
        provider.requests()[0].messages,
        [Message::system("sys"), Message::user("hi")]
    );
    assert_eq!(agent.history().len(), 4);
}

#[tokio::test]
async fn test_trim_keeps_tool_results_of_current_turn() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([weather_call("call_1")]));
    provider.add_response(PresetResponse::tool_calls([weather_call("call_2")]));
    provider.add_response(PresetResponse::text("Still 72 degrees."));
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(weather_tool())
        .with_instructions("sys")
        .with_config(AgentConfig::default().with_token_limit(10))
        .with_token_counter(|text: &str| text.len())
        .build()
        .unwrap();
    agent
        .set_raw_history(
            &serde_json::to_string(&[Message::user("x".repeat(50))]).unwrap(),
        )
        .unwrap();

    let lines = run_turn(&mut agent, "Weather in Boston?", false).await;
    assert_eq!(lines.last().unwrap(), "message: Still 72 degrees.");

    // Each tool result alone is over the budget.
    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    let messages = &requests[2].messages;
    let roles: Vec<_> = messages.iter().map(Message::role).collect();
    assert_eq!(
        roles,
        [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::Tool,
        ]
    );
    assert_eq!(messages[1], Message::user("Weather in Boston?"));
    let Message::Tool { tool_call_id, .. } = &messages[3] else {
        panic!("expected a tool message");
    };
    assert_eq!(tool_call_id, "call_1");
    assert_eq!(agent.history().len(), 7);
}

#[tokio::test]
async fn test_missing_call_id_leaves_history_clean() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::tool_calls([weather_call("")]));
    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(weather_tool())
        .build()
        .unwrap();

    let mut completion =
        agent.chat_completion(vec![Message::user("Weather in Boston?")], false);
    assert!(matches!(
        completion.next_event().await,
        Err(Error::MissingCorrelation(name)) if name == "get_current_weather"
    ));
    assert!(completion.next_event().await.unwrap().is_none());
    drop(completion);
    assert_eq!(
        agent.history().messages(),
        [Message::user("Weather in Boston?")]
    );

    // The rejected message is not resent with the next turn.
    let mut completion = agent.chat_completion(vec![Message::user("Hi")], true);
    let Some(ChatEvent::Stream(_)) = completion.next_event().await.unwrap() else {
        panic!("expected a stream");
    };
    assert!(matches!(
        completion.next_event().await,
        Err(Error::MissingCorrelation(_))
    ));
    drop(completion);
    let requests = provider.requests();
    let roles: Vec<_> = requests[1].messages.iter().map(Message::role).collect();
    assert_eq!(roles, [Role::User, Role::User]);
    assert_eq!(agent.history().len(), 2);
}

#[tokio::test]
async fn test_raw_history() {
    let mut agent = AgentBuilder::with_model_provider(weather_provider())
        .with_tool(weather_tool())
        .build()
        .unwrap();
    run_turn(&mut agent, "Weather in Boston?", false).await;
    let raw = agent.raw_history().unwrap();

    let mut restored =
        AgentBuilder::with_model_provider(TestModelProvider::default())
            .build()
            .unwrap();
    restored.set_raw_history(&raw).unwrap();
    assert_eq!(restored.history().messages(), agent.history().messages());

    restored.reset();
    assert!(restored.history().is_empty());
    assert!(matches!(
        restored.set_raw_history("not json"),
        Err(Error::InvalidHistory(_))
    ));
}

#[test]
fn test_invalid_tool_schema() {
    #[derive(Deserialize, JsonSchema)]
    struct Ratio {
        #[allow(dead_code)]
        value: f64,
    }

    let result = AgentBuilder::with_model_provider(TestModelProvider::default())
        .with_tool(tool_fn("ratio", "Takes a float", |_: Ratio| async move {
            Ok(json!(null))
        }))
        .build();
    assert!(matches!(result, Err(Error::Registration(_))));
}

#[test]
fn test_default_names() {
    let first = AgentBuilder::with_model_provider(TestModelProvider::default())
        .build()
        .unwrap();
    let second = AgentBuilder::with_model_provider(TestModelProvider::default())
        .build()
        .unwrap();
    assert!(first.name().starts_with("Agent#"));
    assert_ne!(first.name(), second.name());
    assert_eq!(first.model(), "test");
}

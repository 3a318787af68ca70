//! An interactive chat with an agent using the built-in plugins.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use agentia::core::{AgentBuilder, AgentConfig, ChatEvent, Error, MessageStream, ToolEvent};
use agentia::plugins::with_builtin_plugins;
use agentia_model::Message;
use agentia_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const MAX_RESULT_LEN: usize = 120;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(config) = provider_config() else {
        eprintln!(
            "Either OPENROUTER_API_KEY or OPENAI_API_KEY environment variable \
            must be set"
        );
        return;
    };
    let model_provider = OpenAIProvider::new(config);

    let data_dir = env::var_os("AGENTIA_DATA_DIR")
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|dir| dir.join("agentia")))
        .unwrap_or_else(|| env::temp_dir().join("agentia"));

    let builder = AgentBuilder::with_model_provider(model_provider)
        .with_name("Agentia")
        .with_instructions(include_str!("./instructions.md"))
        .with_config(AgentConfig::default().with_data_dir(data_dir));
    let mut agent = match with_builtin_plugins(builder).build() {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("Failed to create the agent: {err}");
            return;
        }
    };
    info!("chatting with {} using {}", agent.name(), agent.model());

    let progress_style = match ProgressStyle::with_template("{spinner} {wide_msg}") {
        Ok(style) => style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        Err(err) => {
            error!("invalid progress template: {err}");
            ProgressStyle::default_spinner()
        }
    };

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" => break,
            "/reset" => {
                agent.reset();
                println!("{}", "History cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        let mut completion =
            agent.chat_completion(vec![Message::user(line.trim())], true);

        loop {
            let progress_bar = ProgressBar::new_spinner();
            progress_bar.set_style(progress_style.clone());
            progress_bar.set_message("🤔 Thinking...");

            let next = completion.next_event();
            tokio::pin!(next);
            let event = loop {
                progress_bar.inc(1);
                select! {
                    event = &mut next => break event,
                    _ = sleep(Duration::from_millis(100)) => {}
                }
            };

            // Finish the progress bar before printing anything else.
            progress_bar.finish_and_clear();

            let result = match event {
                Ok(Some(event)) => print_event(event).await,
                Ok(None) => break,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                println!("{}{}", BAR_CHAR.bright_red(), err.bright_red());
                break;
            }
        }
        println!();
    }
}

fn provider_config() -> Option<agentia_openai_model::OpenAIConfig> {
    let mut builder = if let Ok(api_key) = env::var("OPENROUTER_API_KEY") {
        OpenAIConfigBuilder::openrouter(api_key)
    } else {
        let api_key = env::var("OPENAI_API_KEY").ok()?;
        let mut builder =
            OpenAIConfigBuilder::with_api_key(api_key).with_model("gpt-4o-mini");
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            builder = builder.with_base_url(base_url);
        }
        builder
    };
    if let Ok(model) = env::var("AGENTIA_MODEL") {
        builder = builder.with_model(model);
    }
    Some(builder.build())
}

async fn print_event(event: ChatEvent) -> Result<(), Error> {
    match event {
        ChatEvent::Message(msg) => {
            println!("{}🤖 {}", BAR_CHAR.bright_cyan(), msg.text().bright_white());
        }
        ChatEvent::Stream(stream) => print_stream(&stream).await?,
        ChatEvent::ToolStart(event) => {
            println!(
                "{}🔧 {} {}",
                BAR_CHAR.bright_yellow(),
                event.display_name.bright_white().bold(),
                event.arguments.dimmed()
            );
        }
        ChatEvent::ToolEnd(event) => {
            println!("{}   {}", BAR_CHAR.bright_yellow(), tool_result(&event).dimmed());
        }
    }
    Ok(())
}

async fn print_stream(stream: &MessageStream) -> Result<(), Error> {
    let mut out = std::io::stdout();
    if let Some(reasoning) = stream.reasoning() {
        let mut started = false;
        while let Some(delta) = reasoning.next_delta().await? {
            if !started {
                print!("{}💭 ", BAR_CHAR.bright_black());
                started = true;
            }
            print!("{}", delta.dimmed());
            out.flush().ok();
        }
        if started {
            println!();
        }
    }

    let mut started = false;
    while let Some(delta) = stream.next_delta().await? {
        if !started {
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
            started = true;
        }
        print!("{}", delta.bright_white());
        out.flush().ok();
    }
    if started {
        println!();
    }
    Ok(())
}

fn tool_result(event: &ToolEvent) -> String {
    let result = match &event.result {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => String::new(),
    };
    let result = result.replace('\n', " ");
    match result.char_indices().nth(MAX_RESULT_LEN) {
        Some((end, _)) => format!("{}...", &result[..end]),
        None => result,
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

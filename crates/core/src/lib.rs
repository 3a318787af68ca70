//! Core logic including the conversation loop, message streams, tools and
//! plugins.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod config;
mod error;
mod event;
mod history;
mod model_client;
mod plugin;
mod stream;
pub mod tool;

pub use agent::{Agent, AgentBuilder, ChatCompletion, ChatEvent};
pub use config::{AgentConfig, DEFAULT_TOKEN_LIMIT};
pub use error::Error;
pub use event::{CommunicationEvent, ConsentRequest, Listener, ToolEvent};
pub use history::{History, Tiktoken, TokenCounter};
pub use plugin::{Plugin, PluginContext, PluginTools};
pub use stream::{MessageStream, ReasoningStream};
pub use tool::Tool;

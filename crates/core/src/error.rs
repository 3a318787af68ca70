use agentia_model::{ErrorKind, ModelProviderError};
use thiserror::Error;

/// Errors raised while driving a conversation.
///
/// `ToolNotFound` and `ToolExecution` never abort a turn: the registry
/// turns them into `{"error": ...}` tool results using their display text,
/// so the model can react to them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The model asked for a tool that is not registered.
    #[error("Tool `{0}` not found")]
    ToolNotFound(String),
    /// A tool rejected its input, was denied or failed while running.
    #[error("Failed to run tool `{name}`: {reason}")]
    ToolExecution {
        /// Name of the tool.
        name: String,
        /// Why it failed.
        reason: String,
    },
    /// Streamed tool call arguments are not valid JSON.
    #[error("malformed arguments for tool `{name}`: {source}")]
    MalformedToolArguments {
        /// Name of the tool.
        name: String,
        /// The parse error.
        source: serde_json::Error,
    },
    /// The backend answered with something unusable, e.g. no choices.
    #[error("backend protocol error: {0}")]
    BackendProtocol(String),
    /// A tool call without an id. Legacy function calls are not supported.
    #[error("tool call `{0}` has no id")]
    MissingCorrelation(String),
    /// A tool call fragment addressed a position past the end of the
    /// assembled list.
    #[error("tool call fragment {index} skips ahead of {len} assembled calls")]
    FragmentGap {
        /// Index carried by the fragment.
        index: usize,
        /// Number of tool calls assembled so far.
        len: usize,
    },
    /// The stream reported an error.
    #[error("stream failed: {0}")]
    Stream(String),
    /// The model provider failed.
    #[error("model provider error: {0}")]
    Provider(Box<dyn ModelProviderError>),
    /// A turn was started without messages.
    #[error("a turn must start with at least one message")]
    EmptyTurn,
    /// A tool could not be registered.
    #[error("failed to register tool: {0}")]
    Registration(String),
    /// A plugin failed to initialize.
    #[error("plugin `{name}` failed: {reason}")]
    Plugin {
        /// Name of the plugin.
        name: String,
        /// Why it failed.
        reason: String,
    },
    /// The history could not be (de)serialized.
    #[error("invalid history: {0}")]
    InvalidHistory(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn from_provider<E: ModelProviderError>(err: E) -> Self {
        match err.kind() {
            ErrorKind::Protocol => Error::BackendProtocol(err.to_string()),
            _ => Error::Provider(Box::new(err)),
        }
    }
}

//! A model provider for OpenAI-compatible APIs, including OpenRouter and
//! DeepSeek.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use agentia_model::{
    ErrorKind, Message, ModelProvider, ModelProviderError, ModelRequest,
};
use backoff::ExponentialBackoffBuilder;
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
use proto::{ChatCompletion, ChatCompletionRequest};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Posts a completion request, retrying transient failures until
    /// the configured deadline passes.
    fn post(
        &self,
        body: ChatCompletionRequest,
        accept: &'static str,
    ) -> impl Future<Output = Result<Response, Error>> + Send + 'static {
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let url = format!("{}/chat/completions", config.base_url);

        async move {
            let backoff = ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(config.max_retry_elapsed))
                .build();
            backoff::future::retry(backoff, || {
                let req = client
                    .post(&url)
                    .bearer_auth(&config.api_key)
                    .header(header::ACCEPT, accept)
                    .json(&body);
                async move {
                    let resp = req.send().await.map_err(|err| {
                        warn!("request failed: {err}");
                        backoff::Error::transient(Error::new(
                            format!("{err}"),
                            ErrorKind::Other,
                        ))
                    })?;

                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = Error::new(
                        format!("{status}: {body}"),
                        kind_of_status(status),
                    );
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        warn!("retrying after {status}");
                        Err(backoff::Error::transient(err))
                    } else {
                        Err(backoff::Error::permanent(err))
                    }
                }
            })
            .await
        }
    }
}

#[inline]
fn kind_of_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::FORBIDDEN => ErrorKind::Moderated,
        _ => ErrorKind::Other,
    }
}

#[inline]
fn has_content_type(resp: &Response, essence: &str) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| m.essence_str() == essence)
        .unwrap_or(false)
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    #[inline]
    fn model(&self) -> &str {
        &self.config.model
    }

    #[inline]
    fn supports_reasoning(&self) -> bool {
        self.config.reasoning
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config, false);
        let resp_fut = self.post(openai_req, "application/json");

        async move {
            let resp = resp_fut.await?;
            let completion = resp.json::<ChatCompletion>().await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Protocol)
            })?;
            let message = proto::into_message(completion)?;
            trace!("got a message: {message:?}");
            Ok(message)
        }
    }

    fn stream_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config, true);
        let resp_fut = self.post(openai_req, "text/event-stream");

        async move {
            let resp = resp_fut.await?;
            if !has_content_type(&resp, "text/event-stream") {
                return Err(Error::new(
                    format!(
                        "Unexpected content type: {:?}",
                        resp.headers().get(header::CONTENT_TYPE)
                    ),
                    ErrorKind::Protocol,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

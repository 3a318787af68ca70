use std::fmt::Debug;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    reasoning: bool,
    max_retry_elapsed: Option<Duration>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            reasoning: false,
            max_retry_elapsed: None,
        }
    }

    /// Creates a builder targeting OpenRouter.
    #[inline]
    pub fn openrouter<S: Into<String>>(api_key: S) -> Self {
        Self::with_api_key(api_key)
            .with_base_url(OPENROUTER_BASE_URL)
            .with_model("openai/gpt-4o-mini")
    }

    /// Creates a builder targeting DeepSeek, whose chat models stream
    /// their reasoning before the answer.
    #[inline]
    pub fn deepseek<S: Into<String>>(api_key: S) -> Self {
        Self::with_api_key(api_key)
            .with_base_url(DEEPSEEK_BASE_URL)
            .with_model("deepseek-reasoner")
            .with_reasoning(true)
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets whether the model streams reasoning tokens before content.
    #[inline]
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Sets how long transient request failures are retried. Zero
    /// disables retrying.
    #[inline]
    pub fn with_max_retry_elapsed(mut self, duration: Duration) -> Self {
        self.max_retry_elapsed = Some(duration);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: self
                .base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_owned(),
            reasoning: self.reasoning,
            max_retry_elapsed: self
                .max_retry_elapsed
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<deducted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("reasoning", &self.reasoning)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) reasoning: bool,
    pub(crate) max_retry_elapsed: Duration,
}

impl OpenAIConfig {
    /// Returns the model name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<deducted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("reasoning", &self.reasoning)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = OpenAIConfigBuilder::openrouter("key").build();
        assert_eq!(config.base_url(), OPENROUTER_BASE_URL);
        assert!(!config.reasoning);

        let config = OpenAIConfigBuilder::deepseek("key")
            .with_model("deepseek-chat")
            .with_reasoning(false)
            .build();
        assert_eq!(config.base_url(), DEEPSEEK_BASE_URL);
        assert_eq!(config.model(), "deepseek-chat");
        assert!(!config.reasoning);

        let config = OpenAIConfigBuilder::with_api_key("key")
            .with_base_url("http://localhost:8080/v1/")
            .build();
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = OpenAIConfigBuilder::with_api_key("sk-secret").build();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<deducted>"));
    }
}

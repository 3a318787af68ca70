use std::path::{Path, PathBuf};

use agentia_model::SamplingOptions;

/// Default token budget of the history sent to the model.
pub const DEFAULT_TOKEN_LIMIT: usize = 120_000;

/// Settings of an [`Agent`](crate::Agent).
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    token_limit: usize,
    data_dir: PathBuf,
    options: SamplingOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token_limit: DEFAULT_TOKEN_LIMIT,
            data_dir: std::env::temp_dir().join("agentia"),
            options: SamplingOptions::default(),
        }
    }
}

impl AgentConfig {
    /// Sets the token budget of the history.
    #[inline]
    pub fn with_token_limit(mut self, token_limit: usize) -> Self {
        self.token_limit = token_limit;
        self
    }

    /// Sets the directory plugins keep their data in.
    #[inline]
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the sampling options of every request.
    #[inline]
    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the token budget of the history.
    #[inline]
    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Returns the directory plugins keep their data in.
    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the sampling options.
    #[inline]
    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }
}

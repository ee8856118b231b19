//! Generates subject plan documents with an OpenAI assistant.
//!
//! The assistant is given a `file_search` vector store built from a local
//! directory of reference material, asked for an eleven-section plan for one
//! subject and its five lessons, and the answer is written to a `.docx` file.

use serde::Deserialize;

pub mod assistants;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod upload;

pub use client::OpenAiClient;
pub use error::{ConfigError, PipelineError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

#[derive(Deserialize, Debug, Clone)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    pub fn new(message: String, error_type: String) -> OpenAiError {
        OpenAiError {
            message,
            error_type,
            param: None,
            code: None,
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for OpenAiError {}

impl From<reqwest::Error> for OpenAiError {
    fn from(value: reqwest::Error) -> Self {
        OpenAiError::new(value.to_string(), "http".to_string())
    }
}

impl From<serde_json::Error> for OpenAiError {
    fn from(value: serde_json::Error) -> Self {
        OpenAiError::new(value.to_string(), "decode".to_string())
    }
}

pub type ApiResponseOrError<T> = Result<T, OpenAiError>;

#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    /// Creates credentials with the given API key and base URL.
    /// The base URL is normalized to end with a slash so routes can be appended.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            api_key: api_key.into(),
            base_url,
        }
    }

    /// Reads `OPENAI_API_KEY` and, optionally, `OPENAI_BASE_URL` through `lookup`,
    /// usually `|name| std::env::var(name).ok()` after `dotenvy::dotenv()`.
    /// A missing or blank key is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey(API_KEY_VAR))?;
        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let result = Credentials::from_lookup(lookup_in(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey(API_KEY_VAR))));
    }

    #[test]
    fn blank_key_is_a_config_error() {
        let result = Credentials::from_lookup(lookup_in(&[(API_KEY_VAR, "   ")]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey(_))));
    }

    #[test]
    fn base_url_defaults_to_openai() {
        let credentials = Credentials::from_lookup(lookup_in(&[(API_KEY_VAR, "sk-test")])).unwrap();
        assert_eq!(credentials.api_key(), "sk-test");
        assert_eq!(credentials.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_override_gets_trailing_slash() {
        let credentials = Credentials::from_lookup(lookup_in(&[
            (API_KEY_VAR, "sk-test"),
            (BASE_URL_VAR, "http://localhost:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(credentials.base_url(), "http://localhost:8080/v1/");
    }

    #[test]
    fn debug_output_hides_the_key() {
        let credentials = Credentials::new("sk-secret", DEFAULT_BASE_URL);
        assert!(!format!("{credentials:?}").contains("sk-secret"));
    }
}

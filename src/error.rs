//! Error types for configuration and the generation pipeline.
//!
//! Every pipeline failure carries the stage it happened in and maps to a
//! distinct process exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    assistants::{runs::LastError, runs::Status as RunStatus, vector_stores::FileBatchStatus},
    OpenAiError,
};

/// Successful execution.
pub const EXIT_SUCCESS: u8 = 0;

/// Missing credential or invalid configuration.
pub const EXIT_CONFIG: u8 = 1;

/// A call to the assistant service failed or ended in a non-completed state.
pub const EXIT_REMOTE: u8 = 2;

/// The run completed but no usable text came back.
pub const EXIT_RESPONSE: u8 = 3;

/// The document could not be written.
pub const EXIT_DOCUMENT: u8 = 4;

/// A local source file could not be read.
pub const EXIT_IO: u8 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set; add it to the environment or a .env file")]
    MissingApiKey(&'static str),

    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The remote step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Stage {
    #[strum(serialize = "create assistant")]
    CreateAssistant,
    #[strum(serialize = "create vector store")]
    CreateVectorStore,
    #[strum(serialize = "upload files")]
    UploadFiles,
    #[strum(serialize = "attach vector store")]
    AttachVectorStore,
    #[strum(serialize = "create thread")]
    CreateThread,
    #[strum(serialize = "run assistant")]
    RunAssistant,
    #[strum(serialize = "list messages")]
    ListMessages,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{stage} failed: {source}")]
    Remote {
        stage: Stage,
        #[source]
        source: OpenAiError,
    },

    #[error("file batch {batch_id} ended as {status}")]
    BatchNotCompleted {
        batch_id: String,
        status: FileBatchStatus,
    },

    #[error("run {run_id} ended as {status}{}", last_error_suffix(.last_error))]
    RunNotCompleted {
        run_id: String,
        status: RunStatus,
        last_error: Option<LastError>,
    },

    #[error("run {run_id} produced no text response")]
    EmptyResponse { run_id: String },

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not save document {path}: {message}")]
    Document { path: PathBuf, message: String },
}

fn last_error_suffix(last_error: &Option<LastError>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" ({e})"))
        .unwrap_or_default()
}

impl PipelineError {
    pub fn remote(stage: Stage) -> impl FnOnce(OpenAiError) -> PipelineError {
        move |source| PipelineError::Remote { stage, source }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => EXIT_CONFIG,
            PipelineError::Remote { .. }
            | PipelineError::BatchNotCompleted { .. }
            | PipelineError::RunNotCompleted { .. } => EXIT_REMOTE,
            PipelineError::EmptyResponse { .. } => EXIT_RESPONSE,
            PipelineError::Document { .. } => EXIT_DOCUMENT,
            PipelineError::Io { .. } => EXIT_IO,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_CONFIG,
            EXIT_REMOTE,
            EXIT_RESPONSE,
            EXIT_DOCUMENT,
            EXIT_IO,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b, "exit codes must be distinct");
            }
        }
    }

    #[test]
    fn missing_key_maps_to_config_exit_code() {
        let err = PipelineError::from(ConfigError::MissingApiKey("OPENAI_API_KEY"));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn remote_error_names_the_stage() {
        let err = PipelineError::remote(Stage::CreateThread)(OpenAiError::new(
            "boom".to_string(),
            "server_error".to_string(),
        ));
        assert_eq!(err.exit_code(), EXIT_REMOTE);
        assert_eq!(err.to_string(), "create thread failed: boom");
    }

    #[test]
    fn failed_run_includes_last_error() {
        let err = PipelineError::RunNotCompleted {
            run_id: "run_1".to_string(),
            status: RunStatus::Failed,
            last_error: Some(LastError {
                code: "rate_limit_exceeded".to_string(),
                message: "slow down".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "run run_1 ended as failed (rate_limit_exceeded: slow down)"
        );
    }

    #[test]
    fn empty_response_has_its_own_exit_code() {
        let err = PipelineError::EmptyResponse {
            run_id: "run_1".to_string(),
        };
        assert_eq!(err.exit_code(), EXIT_RESPONSE);
    }
}

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{assistants::Tool, client::OpenAiClient, ApiResponseOrError};

use super::messages::IncompleteDetails;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Run {
    pub id: String,
    pub object: String,
    pub created_at: u32,
    /// The ID of the assistant used for this run.
    pub assistant_id: String,
    /// The ID of the thread associated with this run.
    pub thread_id: String,
    /// The status of the run.
    pub status: Status,
    /// The last error that occurred during this run.
    pub last_error: Option<LastError>,

    pub expires_at: Option<u32>,
    pub started_at: Option<u32>,
    pub completed_at: Option<u32>,
    pub cancelled_at: Option<u32>,
    pub failed_at: Option<u32>,
    /// Details on why the run is incomplete. Will be null if the run is not incomplete.
    pub incomplete_details: Option<IncompleteDetails>,

    /// The model used for this run.
    pub model: Option<String>,
    /// The instructions given to the assistant.
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    /// The usage of the run. Null until the run reaches a terminal state.
    pub usage: Option<Usage>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::InProgress | Status::Queued)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Serialize, Builder, Debug, Clone, Default)]
#[builder(pattern = "owned")]
#[builder(name = "CreateRunBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

impl OpenAiClient {
    pub async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(format!("threads/{thread_id}/runs"), request)
            .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        self.get(format!("threads/{thread_id}/runs/{run_id}")).await
    }

    pub async fn poll_run(&self, mut run: Run) -> ApiResponseOrError<Run> {
        while !run.status.is_terminal() {
            self.poll_delay().await;
            run = self
                .get_run(run.thread_id.as_str(), run.id.as_str())
                .await?;
            log::debug!("Run {} is {}", run.id, run.status);
        }
        Ok(run)
    }

    /// Starts a run and waits until it leaves the `queued`/`in_progress` states.
    pub async fn create_run_and_poll(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        let run = self.create_run(thread_id, request).await?;
        self.poll_run(run).await
    }
}

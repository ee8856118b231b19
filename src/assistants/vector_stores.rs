use std::collections::HashMap;

use crate::{client::OpenAiClient, ApiResponseOrError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VectorStore {
    pub id: String,
    pub object: String,
    pub created_at: u32,
    pub name: Option<String>,
    #[serde(default)]
    pub usage_bytes: u64,
    pub file_counts: FileCounts,
    pub status: VectorStoreStatus,
    pub expires_after: Option<ExpiresAfter>,
    pub expires_at: Option<u32>,
    pub last_active_at: Option<u32>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub in_progress: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub total: u32,
}

impl std::fmt::Display for FileCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} completed={} in_progress={} failed={} cancelled={}",
            self.total, self.completed, self.in_progress, self.failed, self.cancelled
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreStatus {
    Expired,
    InProgress,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExpiresAfter {
    pub anchor: String,
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CreateVectorStoreRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<ExpiresAfter>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VectorStoreFileBatch {
    pub id: String,
    pub object: String,
    pub created_at: u32,
    pub vector_store_id: String,
    pub status: FileBatchStatus,
    pub file_counts: FileCounts,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileBatchStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl FileBatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileBatchStatus::InProgress)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateFileBatchRequest {
    pub file_ids: Vec<String>,
}

impl OpenAiClient {
    pub async fn create_vector_store(
        &self,
        params: CreateVectorStoreRequest,
    ) -> ApiResponseOrError<VectorStore> {
        self.post("vector_stores", params).await
    }

    pub async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ApiResponseOrError<VectorStoreFileBatch> {
        self.post(
            format!("vector_stores/{vector_store_id}/file_batches"),
            CreateFileBatchRequest { file_ids },
        )
        .await
    }

    pub async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> ApiResponseOrError<VectorStoreFileBatch> {
        self.get(format!(
            "vector_stores/{vector_store_id}/file_batches/{batch_id}"
        ))
        .await
    }

    /// Re-fetches the batch every poll interval until ingestion stops.
    pub async fn poll_file_batch(
        &self,
        mut batch: VectorStoreFileBatch,
    ) -> ApiResponseOrError<VectorStoreFileBatch> {
        while !batch.status.is_terminal() {
            self.poll_delay().await;
            batch = self
                .get_file_batch(&batch.vector_store_id, &batch.id)
                .await?;
        }
        Ok(batch)
    }

    pub async fn create_file_batch_and_poll(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> ApiResponseOrError<VectorStoreFileBatch> {
        let batch = self.create_file_batch(vector_store_id, file_ids).await?;
        self.poll_file_batch(batch).await
    }
}

use crate::{client::OpenAiClient, ApiResponseOrError};
use reqwest::{
    multipart::{Form, Part},
    Body,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct File {
    pub id: String,
    pub object: String,
    pub created_at: u32,
    pub bytes: u64,
    pub filename: String,
    pub purpose: FilePurpose,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Assistants,
    AssistantsOutput,
    Batch,
    BatchOutput,
    FineTune,
    FineTuneResults,
    Vision,
}

impl OpenAiClient {
    /// Uploads `bytes` as a multipart `file` part. `length`, when known, is sent
    /// as the part length so the body does not need chunked encoding.
    pub async fn upload_file<B: Into<Body>>(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: B,
        length: Option<u64>,
        purpose: FilePurpose,
    ) -> ApiResponseOrError<File> {
        let file_part = match length {
            Some(length) => Part::stream_with_length(bytes, length),
            None => Part::stream(bytes),
        }
        .file_name(filename.to_string())
        .mime_str(mime_type)?;

        let form = Form::new()
            .part("file", file_part)
            .text("purpose", purpose.to_string());

        self.post_multipart("files", form).await
    }
}

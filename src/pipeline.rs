//! The generation pipeline, one method per stage.
//!
//! Stages run strictly in order and each consumes the previous stage's output.
//! The first error stops the pipeline; nothing created remotely is cleaned up.

use std::path::PathBuf;

use crate::{
    assistants::{
        messages::Message,
        runs::{CreateRunBuilder, Run, Status as RunStatus},
        threads::{CreateThreadBuilder, CreateThreadMessageRequest, Thread},
        vector_stores::{CreateVectorStoreRequest, VectorStore, VectorStoreFileBatch},
        Assistant, CreateAssistantBuilder, ModifyAssistantBuilder, Tool, ToolResources,
    },
    client::OpenAiClient,
    config::PlanConfig,
    document::PlanDocument,
    error::{ConfigError, PipelineError, Result, Stage},
    upload::{scan_source_dir, SourceBatch},
    Credentials,
};

/// Identifiers of everything a successful run created, plus the result.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub assistant_id: String,
    pub vector_store_id: String,
    pub thread_id: String,
    pub run_id: String,
    pub output_path: PathBuf,
    pub text: String,
}

pub struct Pipeline<'a> {
    client: &'a OpenAiClient,
    config: &'a PlanConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a OpenAiClient, config: &'a PlanConfig) -> Self {
        Self { client, config }
    }

    pub async fn provision_assistant(&self) -> Result<Assistant> {
        let settings = &self.config.assistant;
        let request = CreateAssistantBuilder::default()
            .model(settings.model.as_str())
            .name(settings.name.as_str())
            .instructions(settings.instructions.as_str())
            .tools(vec![Tool::file_search()])
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let assistant = self
            .client
            .create_assistant(request)
            .await
            .map_err(PipelineError::remote(Stage::CreateAssistant))?;

        log::info!("Assistant {} created", assistant.id);
        Ok(assistant)
    }

    pub async fn create_vector_store(&self) -> Result<VectorStore> {
        let vector_store = self
            .client
            .create_vector_store(CreateVectorStoreRequest {
                name: self.config.vector_store_name(),
                ..Default::default()
            })
            .await
            .map_err(PipelineError::remote(Stage::CreateVectorStore))?;

        log::info!("Vector store {} created", vector_store.id);
        Ok(vector_store)
    }

    /// Uploads the source directory. Returns `None` when there is nothing to upload.
    pub async fn upload_sources(
        &self,
        vector_store: &VectorStore,
    ) -> Result<Option<VectorStoreFileBatch>> {
        let paths = scan_source_dir(&self.config.source_dir)?;
        if paths.is_empty() {
            log::warn!(
                "No files found in {}; the assistant will answer without reference material",
                self.config.source_dir.display()
            );
            return Ok(None);
        }

        log::info!("Uploading {} files", paths.len());
        let batch = SourceBatch::open(&paths).await?;
        batch.upload(self.client, &vector_store.id).await.map(Some)
    }

    pub async fn attach_vector_store(
        &self,
        assistant: &Assistant,
        vector_store: &VectorStore,
    ) -> Result<Assistant> {
        let request = ModifyAssistantBuilder::default()
            .tool_resources(ToolResources::file_search(vector_store.id.as_str()))
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let assistant = self
            .client
            .update_assistant(&assistant.id, request)
            .await
            .map_err(PipelineError::remote(Stage::AttachVectorStore))?;

        log::debug!(
            "Assistant {} searches vector stores {:?}",
            assistant.id,
            assistant.vector_store_ids()
        );
        Ok(assistant)
    }

    pub async fn create_thread(&self) -> Result<Thread> {
        let request = CreateThreadBuilder::default()
            .messages(vec![CreateThreadMessageRequest::user(self.config.prompt()?)])
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let thread = self
            .client
            .create_thread(request)
            .await
            .map_err(PipelineError::remote(Stage::CreateThread))?;

        log::info!("Thread created for {}", self.config.subject());
        Ok(thread)
    }

    /// Runs the assistant on the thread and waits for it. Any terminal status
    /// other than `completed` is an error.
    pub async fn run_assistant(&self, assistant: &Assistant, thread: &Thread) -> Result<Run> {
        let request = CreateRunBuilder::default()
            .assistant_id(assistant.id.as_str())
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let run = self
            .client
            .create_run_and_poll(&thread.id, request)
            .await
            .map_err(PipelineError::remote(Stage::RunAssistant))?;

        if run.status != RunStatus::Completed {
            return Err(PipelineError::RunNotCompleted {
                run_id: run.id,
                status: run.status,
                last_error: run.last_error,
            });
        }

        if let Some(usage) = &run.usage {
            log::debug!(
                "Run {} used {} tokens ({} prompt, {} completion)",
                run.id,
                usage.total_tokens,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(run)
    }

    /// Text of the first content block of the newest message the run produced.
    pub async fn fetch_response(&self, run: &Run) -> Result<String> {
        let messages = self
            .client
            .list_messages(&run.thread_id, Some(&run.id))
            .await
            .map_err(PipelineError::remote(Stage::ListMessages))?;

        first_response_text(&messages)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::EmptyResponse {
                run_id: run.id.clone(),
            })
    }

    pub fn save_document(&self, text: &str) -> Result<PathBuf> {
        let path = self.config.output_path();
        PlanDocument::new(text).save(&path)?;
        Ok(path)
    }

    pub async fn run(&self) -> Result<GeneratedPlan> {
        let assistant = self.provision_assistant().await?;
        let vector_store = self.create_vector_store().await?;
        self.upload_sources(&vector_store).await?;
        let assistant = self.attach_vector_store(&assistant, &vector_store).await?;

        let thread = self.create_thread().await?;
        let run = self.run_assistant(&assistant, &thread).await?;
        let text = self.fetch_response(&run).await?;
        log::debug!("Response:\n{text}");

        let output_path = self.save_document(&text)?;

        Ok(GeneratedPlan {
            assistant_id: assistant.id,
            vector_store_id: vector_store.id,
            thread_id: thread.id,
            run_id: run.id,
            output_path,
            text,
        })
    }
}

/// Runs a full generation for `config`, reading credentials through `lookup`.
///
/// The API key is checked first and the configuration second, so a missing key
/// or an invalid configuration fails before any request is sent.
pub async fn generate<F>(config: &PlanConfig, lookup: F) -> Result<GeneratedPlan>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials = Credentials::from_lookup(lookup)?;
    config.validate()?;

    let client = OpenAiClient::new(credentials)
        .map_err(|e| ConfigError::Invalid(format!("could not build HTTP client: {e}")))?
        .with_poll_interval(config.poll_interval());

    Pipeline::new(&client, config).run().await
}

fn first_response_text(messages: &[Message]) -> Option<&str> {
    messages.first()?.first_text()
}

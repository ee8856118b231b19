//! Uploading the reference directory into a vector store.
//!
//! Every regular file directly inside the source directory is opened up front,
//! uploaded with purpose `assistants` and then added to the vector store as one
//! file batch. Open handles belong to [`SourceBatch`], so each one is closed
//! exactly once whether the upload finishes or stops on an error.

use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::{
    assistants::{
        files::FilePurpose,
        vector_stores::{FileBatchStatus, VectorStoreFileBatch},
    },
    client::OpenAiClient,
    error::{PipelineError, Result, Stage},
};

/// Lists the regular files directly inside `dir`, sorted by path.
/// Subdirectories are skipped, not descended into.
pub fn scan_source_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_error = |source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        // follows symlinks, like a plain `is_file` check on the path
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub filename: String,
    pub length: u64,
    file: File,
}

/// The opened files of one upload batch.
#[derive(Debug)]
pub struct SourceBatch {
    files: Vec<SourceFile>,
}

impl SourceBatch {
    /// Opens every path for reading. Files opened before a failure are closed
    /// when the partially built batch is dropped.
    pub async fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let io_error = |source| PipelineError::Io {
                path: path.clone(),
                source,
            };
            let file = File::open(path).await.map_err(io_error)?;
            let length = file.metadata().await.map_err(io_error)?.len();
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            files.push(SourceFile {
                path: path.clone(),
                filename,
                length,
                file,
            });
        }
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Uploads every file, then adds them to `vector_store_id` as one batch and
    /// waits for ingestion to finish.
    pub async fn upload(
        self,
        client: &OpenAiClient,
        vector_store_id: &str,
    ) -> Result<VectorStoreFileBatch> {
        let mut file_ids = Vec::with_capacity(self.files.len());

        for source in self.files {
            log::debug!("Uploading {}", source.path.display());
            let uploaded = client
                .upload_file(
                    &source.filename,
                    mime_type(&source.path),
                    source.file,
                    Some(source.length),
                    FilePurpose::Assistants,
                )
                .await
                .map_err(PipelineError::remote(Stage::UploadFiles))?;
            file_ids.push(uploaded.id);
        }

        let batch = client
            .create_file_batch_and_poll(vector_store_id, file_ids)
            .await
            .map_err(PipelineError::remote(Stage::UploadFiles))?;

        log::info!("Upload status: {}", batch.status);
        log::info!("Uploaded file counts: {}", batch.file_counts);

        match batch.status {
            FileBatchStatus::Failed | FileBatchStatus::Cancelled => {
                Err(PipelineError::BatchNotCompleted {
                    batch_id: batch.id,
                    status: batch.status,
                })
            }
            _ => {
                if batch.file_counts.failed > 0 {
                    log::warn!(
                        "{} of {} files failed to ingest",
                        batch.file_counts.failed,
                        batch.file_counts.total
                    );
                }
                Ok(batch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn scan_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("a.txt"), b"notes").unwrap();
        fs::write(dir.path().join("c.md"), b"# title").unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::create_dir(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("archive").join("old.txt"), b"old").unwrap();

        let files = scan_source_dir(dir.path()).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "b.pdf", "c.md"]);
    }

    #[test]
    fn scan_of_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_source_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type(Path::new("x.PDF")), "application/pdf");
        assert_eq!(mime_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn open_records_names_and_lengths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("guia.txt"), b"12345").unwrap();

        let paths = scan_source_dir(dir.path()).unwrap();
        let batch = SourceBatch::open(&paths).await.unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.files()[0].filename, "guia.txt");
        assert_eq!(batch.files()[0].length, 5);
    }

    #[tokio::test]
    async fn open_fails_on_vanished_file() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.txt");
        fs::write(&present, b"a").unwrap();
        let missing = dir.path().join("b.txt");

        let err = SourceBatch::open(&[present, missing.clone()]).await.unwrap_err();
        match err {
            PipelineError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(target_os = "linux")]
    fn open_handles_under(dir: &Path) -> usize {
        let dir = dir.canonicalize().unwrap();
        fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|entry| fs::read_link(entry.ok()?.path()).ok())
            .filter(|target| target.starts_with(&dir))
            .count()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn batch_holds_one_handle_per_file_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let paths = scan_source_dir(dir.path()).unwrap();
        let batch = SourceBatch::open(&paths).await.unwrap();
        assert_eq!(open_handles_under(dir.path()), 2);

        drop(batch);
        for _ in 0..50 {
            if open_handles_under(dir.path()) == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("handles still open after the batch was dropped");
    }
}

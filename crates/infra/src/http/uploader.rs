//! Artifact upload over HTTP

use std::path::PathBuf;

use async_trait::async_trait;
use tidewater_core::{ArtifactUploader, UploadOutcome};
use tidewater_domain::{AgentError, Result};
use tracing::{debug, info};

use super::client::HttpClient;
use crate::errors::infra_err;

/// PUTs every file in the uploads directory to `<target>/<file name>`.
pub struct HttpArtifactUploader {
    client: HttpClient,
    uploads_dir: PathBuf,
}

impl HttpArtifactUploader {
    pub fn new(client: HttpClient, uploads_dir: impl Into<PathBuf>) -> Self {
        Self { client, uploads_dir: uploads_dir.into() }
    }

    async fn artifacts(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(&self.uploads_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(infra_err(err, format!("read {}", self.uploads_dir.display()))),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| infra_err(e, format!("read {}", self.uploads_dir.display())))?
        {
            let file_type = entry.file_type().await.map_err(|e| infra_err(e, "stat artifact"))?;
            if file_type.is_file() {
                files.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl ArtifactUploader for HttpArtifactUploader {
    async fn purge(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.uploads_dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(infra_err(err, format!("purge {}", self.uploads_dir.display()))),
        }
        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| infra_err(e, format!("create {}", self.uploads_dir.display())))?;
        debug!(dir = %self.uploads_dir.display(), "uploads.purged");
        Ok(())
    }

    async fn upload(&self, target: &str) -> Result<UploadOutcome> {
        let artifacts = self.artifacts().await?;
        if artifacts.is_empty() {
            return Ok(UploadOutcome::NoArtifacts);
        }

        let base = target.trim_end_matches('/');
        let mut size_bytes: i64 = 0;
        for (name, path) in &artifacts {
            let body = tokio::fs::read(path)
                .await
                .map_err(|e| infra_err(e, format!("read artifact {name}")))?;
            let len = body.len();
            let url = format!("{base}/{name}");

            let status = self
                .client
                .put_artifact(&url, body)
                .await
                .map_err(|e| e.with_context(format!("upload {name}")))?;
            if !status.is_success() {
                return Err(AgentError::Upload(format!("upload {name}: server returned {status}")));
            }

            size_bytes = size_bytes.saturating_add(i64::try_from(len).unwrap_or(i64::MAX));
            debug!(artifact = %name, bytes = len, "uploads.artifact.sent");
        }

        info!(target_url = %base, artifacts = artifacts.len(), size_bytes, "uploads.completed");
        Ok(UploadOutcome::Uploaded { size_bytes, url: target.to_string() })
    }
}

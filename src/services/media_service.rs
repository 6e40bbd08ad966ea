/// Uploads note files to the external media host. Only the resulting URL and
/// the original filename are ever persisted.
use reqwest::{multipart, Client};
use serde::Deserialize;

use crate::config::MediaConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    /// `None` when uploads are stubbed (no media host configured).
    pub file_url: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<HostError>,
}

#[derive(Deserialize)]
struct HostError {
    message: String,
}

pub struct MediaClient {
    http: Client,
    config: MediaConfig,
}

impl MediaClient {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn is_stubbed(&self) -> bool {
        self.config.cloud_name.is_none()
    }

    fn upload_url(cloud_name: &str) -> String {
        format!("https://api.cloudinary.com/v1_1/{cloud_name}/raw/upload")
    }

    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<StoredFile> {
        let Some(cloud_name) = self.config.cloud_name.as_deref() else {
            tracing::debug!(file_name, "media host not configured, recording filename only");
            return Ok(StoredFile {
                file_name: file_name.to_string(),
                file_url: None,
            });
        };

        let size = bytes.len();
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("resource_type", "raw");

        let resp = self
            .http
            .post(Self::upload_url(cloud_name))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Upload failed: {e}")))?;

        let status = resp.status();
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Upload failed: {e}")))?;

        match (status.is_success(), body.secure_url) {
            (true, Some(url)) => {
                tracing::info!(file_name, size, "file uploaded to media host");
                Ok(StoredFile {
                    file_name: file_name.to_string(),
                    file_url: Some(url),
                })
            }
            _ => {
                let msg = body
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| format!("status {status}"));
                tracing::warn!(file_name, error = %msg, "media upload rejected");
                Err(AppError::Upstream(format!("Upload failed: {msg}")))
            }
        }
    }
}

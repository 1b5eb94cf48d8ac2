//! The [`ComputeBackend`] trait and the job result types it returns.

use async_trait::async_trait;
use orch_core::job::{
    ImageToImageParams, ImageToVideoParams, JobRequest, TextToImageParams, TextToVideoParams,
};
use serde::{Deserialize, Serialize};

/// One generated artifact.
///
/// Only `url` is guaranteed. Absent fields stay absent on the way back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of an inference job, returned to the caller unchanged.
///
/// Fields this layer does not know about are kept in `extra` so the response
/// body matches what the backend produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub images: Vec<Media>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Errors from a compute backend.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The worker returned a non-2xx status code.
    #[error("worker error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend failed for a reason of its own.
    #[error("{0}")]
    Backend(String),
}

/// Runs inference for admitted jobs.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn text_to_image(&self, params: &TextToImageParams)
        -> Result<ImageResponse, ComputeError>;

    async fn image_to_image(
        &self,
        params: &ImageToImageParams,
    ) -> Result<ImageResponse, ComputeError>;

    async fn image_to_video(
        &self,
        params: &ImageToVideoParams,
    ) -> Result<ImageResponse, ComputeError>;

    async fn text_to_video(&self, params: &TextToVideoParams)
        -> Result<ImageResponse, ComputeError>;

    /// Route a job to the method for its capability.
    async fn submit(&self, job: &JobRequest) -> Result<ImageResponse, ComputeError> {
        match job {
            JobRequest::TextToImage(p) => self.text_to_image(p).await,
            JobRequest::ImageToImage(p) => self.image_to_image(p).await,
            JobRequest::ImageToVideo(p) => self.image_to_video(p).await,
            JobRequest::TextToVideo(p) => self.text_to_video(p).await,
        }
    }
}

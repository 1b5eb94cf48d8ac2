//! HTTP client for a remote AI worker.
//!
//! The worker exposes `POST /{selector}` per capability: JSON bodies for the
//! text-driven jobs and `multipart/form-data` for the image-driven ones.

use async_trait::async_trait;
use orch_core::capability::Capability;
use orch_core::job::{
    ImageFile, ImageToImageParams, ImageToVideoParams, TextToImageParams, TextToVideoParams,
    IMAGE_FIELD,
};
use reqwest::multipart::{Form, Part};

use crate::backend::{ComputeBackend, ComputeError, ImageResponse};

/// HTTP client for a single AI worker.
pub struct WorkerClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorkerClient {
    /// Create a new client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, capability: Capability) -> String {
        format!("{}/{}", self.base_url, capability.selector())
    }

    async fn post_json<T: serde::Serialize + Sync>(
        &self,
        capability: Capability,
        body: &T,
    ) -> Result<ImageResponse, ComputeError> {
        let response = self
            .client
            .post(self.endpoint(capability))
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn post_multipart(
        &self,
        capability: Capability,
        fields: Vec<(&'static str, String)>,
        image: &ImageFile,
    ) -> Result<ImageResponse, ComputeError> {
        let mut part = Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }

        let form = fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(self.endpoint(capability))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, returning an
    /// [`ComputeError::Api`] with the status and body text otherwise.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComputeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "Worker returned an error");
            return Err(ComputeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response(response: reqwest::Response) -> Result<ImageResponse, ComputeError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<ImageResponse>().await?)
    }
}

#[async_trait]
impl ComputeBackend for WorkerClient {
    async fn text_to_image(
        &self,
        params: &TextToImageParams,
    ) -> Result<ImageResponse, ComputeError> {
        self.post_json(Capability::TextToImage, params).await
    }

    async fn image_to_image(
        &self,
        params: &ImageToImageParams,
    ) -> Result<ImageResponse, ComputeError> {
        self.post_multipart(Capability::ImageToImage, params.form_fields(), &params.image)
            .await
    }

    async fn image_to_video(
        &self,
        params: &ImageToVideoParams,
    ) -> Result<ImageResponse, ComputeError> {
        self.post_multipart(Capability::ImageToVideo, params.form_fields(), &params.image)
            .await
    }

    async fn text_to_video(
        &self,
        params: &TextToVideoParams,
    ) -> Result<ImageResponse, ComputeError> {
        self.post_json(Capability::TextToVideo, params).await
    }
}

//! Handler for the per-capability job endpoints.
//!
//! `POST /{selector}` resolves the selector to a [`Capability`], decodes the
//! body into that capability's parameters, then runs admission and dispatch.
//! Request bodies have already passed schema validation upstream.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::HeaderMap;
use axum::Json;
use orch_compute::ImageResponse;
use orch_core::capability::{BodyEncoding, Capability};
use orch_core::error::CoreError;
use orch_core::job::{ImageFile, JobRequest, MultipartForm, IMAGE_FIELD};
use orch_core::session::ManifestId;
use tracing::Instrument;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /{selector}
///
/// Run one AI job. Responds with the backend's result as JSON, or a
/// plain-text error.
pub async fn submit_job(
    State(state): State<AppState>,
    Path(selector): Path<String>,
    headers: HeaderMap,
    request: Request,
) -> AppResult<Json<ImageResponse>> {
    let request_id = ManifestId::random();

    let Some(capability) = Capability::from_selector(&selector) else {
        tracing::warn!(request_id = %request_id, selector = %selector, "Unknown request type");
        return Err(CoreError::UnknownCapability.into());
    };

    let job = decode_job(capability, request, &state)
        .await
        .inspect_err(|e| {
            tracing::warn!(
                request_id = %request_id,
                capability = %capability,
                error = %e,
                "Malformed request body",
            );
        })?;

    let span = tracing::info_span!(
        "ai_job",
        request_id = %request_id,
        capability = %capability,
        model_id = %job.model_id(),
    );

    async move {
        tracing::info!("Received request");

        let admission = state.admission.admit(&headers, &job).await?;
        let response = state.dispatcher.dispatch(&admission, &job).await?;
        Ok::<_, AppError>(Json(response))
    }
    .instrument(span.clone())
    .await
    .inspect_err(|e| {
        let _entered = span.enter();
        tracing::warn!(status = %e.status(), error = %e, "Request failed");
    })
}

/// Decode a request body into the job for `capability`.
pub async fn decode_job(
    capability: Capability,
    request: Request,
    state: &AppState,
) -> Result<JobRequest, CoreError> {
    match capability.body_encoding() {
        BodyEncoding::Json => JobRequest::from_json(capability, &read_body(request, state).await?),
        BodyEncoding::Multipart => {
            JobRequest::from_multipart(capability, read_multipart(request, state).await?)
        }
    }
}

/// Read the raw body regardless of the declared content type.
async fn read_body(request: Request, state: &AppState) -> Result<Bytes, CoreError> {
    Bytes::from_request(request, state)
        .await
        .map_err(|e| CoreError::MalformedBody(e.body_text()))
}

/// Collect the parts of a multipart body.
///
/// The `image` part is kept as bytes; every other part is read as text.
async fn read_multipart(request: Request, state: &AppState) -> Result<MultipartForm, CoreError> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| CoreError::MalformedBody(e.body_text()))?;

    let mut form = MultipartForm::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::MalformedBody(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CoreError::MalformedBody(e.body_text()))?;
            form.set_image(ImageFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| CoreError::MalformedBody(e.body_text()))?;
            form.insert_text(name, text);
        }
    }
    Ok(form)
}

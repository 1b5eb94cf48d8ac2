//! Route definitions for the AI job endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at the server root, one per capability.
///
/// ```text
/// POST   /text-to-image     JSON body
/// POST   /image-to-image    multipart body
/// POST   /image-to-video    multipart body
/// POST   /text-to-video     JSON body
/// POST   /{other}           400 Unknown request type
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{selector}", post(jobs::submit_job))
}

use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes requiring a validated session. The router layer above this module
/// applies the `AuthUser` extractor middleware, so every handler here receives
/// a resolved identity; per-group authorization (ownership) still happens in
/// the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /groups/{slug}/cover
        // Starts the cover-image upload pipeline: verifies group ownership,
        // then hands the client a short-lived presigned S3 URL so the image
        // bytes never pass through the application server.
        .route("/groups/{slug}/cover", post(handlers::upload_group_cover))
}

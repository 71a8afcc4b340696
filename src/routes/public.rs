use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without authentication. Guests browse these pages as
/// the anonymous actor; the group access policy decides per request what each
/// actor may see.
///
/// Security Mandate:
/// Hidden-group denials and genuine misses must both surface as the same 404.
/// The handlers delegate that decision to the access policy; nothing in this
/// router may short-circuit it.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /groups?sort=alpha|count|date
        // The groups directory. Lists visible (non-hidden) groups only and
        // reports whether the actor may create groups.
        .route("/groups", get(handlers::list_groups))
        // GET /groups/{slug}
        // Group details page. Slug resolution, then the full visibility
        // decision (membership / invitation / roles) in the access policy.
        .route("/groups/{slug}", get(handlers::get_group_details))
        // GET /groups/{slug}/members?page=N
        // Paginated member list (50 per page). Gated more strictly than the
        // details page: invitations do not unlock it.
        .route("/groups/{slug}/members", get(handlers::get_group_members))
}

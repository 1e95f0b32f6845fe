use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Moderation endpoints. They share the `/api/v1` prefix with the rest of the API and
/// sit behind the same authentication layer; the services reject non-admin callers
/// with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /user/{username}/restore
        // Clears the soft-delete marker of an account.
        .route("/user/{username}/restore", put(handlers::restore_user))
        // GET /role-requests?status=...&limit=...
        // Review queue, newest first. Shares its path with the authenticated POST.
        .route("/role-requests", get(handlers::list_role_requests))
        // PUT /role-requests/{id}/approve | /reject
        // Decides a pending request. Approval promotes the user in the same transaction.
        .route(
            "/role-requests/{id}/approve",
            put(handlers::approve_role_request),
        )
        .route(
            "/role-requests/{id}/reject",
            put(handlers::reject_role_request),
        )
        // PUT /blog/{title}/approve | /unapprove
        // Publishes or withdraws a post.
        .route("/blog/{title}/approve", put(handlers::approve_blog))
        .route("/blog/{title}/unapprove", put(handlers::unapprove_blog))
        // PUT /blog/{title}/restore
        // Brings back a soft-deleted post as an unapproved draft.
        .route("/blog/{title}/restore", put(handlers::restore_blog))
}

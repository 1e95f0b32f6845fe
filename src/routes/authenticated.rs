use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes any logged-in user may call. Every handler receives the caller as an
/// `AuthUser`; ownership and visibility are decided by the policy engine in the services.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profiles ---
        // GET /users?search=...&limit=...&include_deleted=...
        // Username prefix search for autocompletion. Deleted accounts only for admins.
        .route("/users", get(handlers::search_users))
        // GET/PUT/DELETE /user/{username}
        // Anyone reads active profiles. Update and soft delete are self-only unless admin.
        .route(
            "/user/{username}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // GET/PUT/DELETE /me
        // Same operations, targeting the caller.
        .route(
            "/me",
            get(handlers::get_me)
                .put(handlers::update_me)
                .delete(handlers::delete_me),
        )
        // POST /role-requests
        // Files a pending request to become admin. One open request per user.
        .route("/role-requests", post(handlers::request_admin_role))
        // --- Blogs ---
        // GET /blogs?include_deleted=...
        // Site-wide listing. Non-admins only ever see approved posts.
        .route("/blogs", get(handlers::list_blogs))
        // GET /blogs/{username}?include_deleted=...
        // One author's posts; the author also sees their unapproved ones.
        .route("/blogs/{username}", get(handlers::list_blogs_by_author))
        // GET /blogs-deleted/{username}
        // One author's posts including soft-deleted ones. Author or admin only.
        .route(
            "/blogs-deleted/{username}",
            get(handlers::list_deleted_blogs_by_author),
        )
        // POST /blog
        // Writers and admins publish. Admin posts start approved, writer posts do not.
        .route("/blog", post(handlers::create_blog))
        // GET/PUT/DELETE /blog/{title}
        // The title segment stays percent-encoded until the content service decodes it.
        .route(
            "/blog/{title}",
            get(handlers::get_blog)
                .put(handlers::update_blog)
                .delete(handlers::delete_blog),
        )
        // POST /blog/{title}/comments
        // Comments on any post the caller can see.
        .route("/blog/{title}/comments", post(handlers::add_comment))
}

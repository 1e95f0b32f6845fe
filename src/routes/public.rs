use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no session token. Everything else requires one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Returns "ok" without touching the store.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an account. `role: admin` files a role request instead of granting it.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Accepts a username or an email as identifier and returns a 24h bearer token.
        .route("/login", post(handlers::login))
}

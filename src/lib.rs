use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod password;
pub mod policy;
pub mod repository;
pub mod services;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use memory::InMemoryRepository;
pub use password::PasswordService;
pub use repository::{PostgresRepository, RepositoryState};
pub use services::{ContentService, IdentityService};

/// ApiDoc
///
/// OpenAPI document for every `/api/v1` handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::search_users,
        handlers::get_user, handlers::update_user, handlers::delete_user,
        handlers::get_me, handlers::update_me, handlers::delete_me,
        handlers::request_admin_role, handlers::restore_user, handlers::list_role_requests,
        handlers::approve_role_request, handlers::reject_role_request,
        handlers::list_blogs, handlers::list_blogs_by_author,
        handlers::list_deleted_blogs_by_author, handlers::get_blog, handlers::create_blog,
        handlers::update_blog, handlers::delete_blog, handlers::add_comment,
        handlers::approve_blog, handlers::unapprove_blog, handlers::restore_blog
    ),
    components(
        schemas(
            models::Role, models::RoleRequestStatus, models::RegisterRequest,
            models::LoginRequest, models::UpdateProfileRequest, models::BlogDraft,
            models::AdminRoleRequestPayload, models::CreateCommentRequest,
            models::RegisteredProfile, models::Session, models::Profile,
            models::UpdatedProfile, models::CommentView, models::BlogView,
            models::BlogUpdateResponse, models::DeletedBlog, models::RoleRequestView,
            error::ErrorBody, error::ErrorCode,
        )
    ),
    tags(
        (name = "blog-backend", description = "Blog platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for the services and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub content: ContentService,
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    /// Wires both services on top of one repository.
    pub fn new(repo: RepositoryState, config: AppConfig) -> AppResult<Self> {
        let passwords = PasswordService::new(&config)?;
        let tokens = TokenService::from_config(&config);

        Ok(Self {
            identity: IdentityService::new(repo.clone(), passwords, tokens.clone()),
            content: ContentService::new(repo),
            tokens,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted, i.e. a valid,
/// unexpired bearer token is present.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree under `/api/v1`, applies authentication to everything but
/// the public routes, and wraps the whole app in the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Assembly
    // Authenticated and admin routes share one router so `/role-requests` can carry both
    // the user's POST and the admin's GET.
    let protected = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .merge(public::public_routes())
        .merge(protected);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line carries the `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

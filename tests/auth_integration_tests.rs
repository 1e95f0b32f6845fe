use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use blog_backend::{
    AppState, InMemoryRepository, TokenService,
    auth::{AuthUser, Claims},
    config::{AppConfig, Env},
    error::AppError,
    models::{DeletionState, Role, User},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn test_user(id: i64, username: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        role,
        deletion: DeletionState::Active,
        followers: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Signs claims by hand so tests can control `exp`.
fn create_token(secret: &str, exp_offset_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        username: "bob".to_string(),
        user_id: 7,
        role: Role::Writer,
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
        jti: Uuid::new_v4(),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState::new(Arc::new(InMemoryRepository::new()), config).unwrap()
}

fn get_request_parts(method: Method, uri: Uri, bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = bearer {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

// --- TokenService ---

#[test]
fn test_issued_token_round_trips_claims() {
    let tokens = TokenService::new(TEST_JWT_SECRET);
    let token = tokens.issue(&test_user(3, "carol", Role::Reader)).unwrap();

    let claims = tokens.verify(&token).unwrap();
    assert_eq!(claims.username, "carol");
    assert_eq!(claims.user_id, 3);
    assert_eq!(claims.role, Role::Reader);
    assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
}

#[test]
fn test_each_token_gets_a_fresh_jti() {
    let tokens = TokenService::new(TEST_JWT_SECRET);
    let user = test_user(3, "carol", Role::Reader);

    let first = tokens.verify(&tokens.issue(&user).unwrap()).unwrap();
    let second = tokens.verify(&tokens.issue(&user).unwrap()).unwrap();
    assert_ne!(first.jti, second.jti);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let tokens = TokenService::new(TEST_JWT_SECRET);
    let foreign = create_token("some-other-secret", 3600);

    let result = tokens.verify(&foreign);
    assert!(matches!(result, Err(AppError::Unauthenticated(msg)) if msg == "invalid token"));
}

#[test]
fn test_expired_token_is_rejected() {
    let tokens = TokenService::new(TEST_JWT_SECRET);
    // Past the default validation leeway.
    let expired = create_token(TEST_JWT_SECRET, -3600);

    let result = tokens.verify(&expired);
    assert!(matches!(result, Err(AppError::Unauthenticated(msg)) if msg == "token expired"));
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = create_app_state(Env::Production);
    let token = create_token(TEST_JWT_SECRET, 3600);
    let bearer = format!("Bearer {token}");

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap(), Some(&bearer));
    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(user.id, 7);
    assert_eq!(user.username, "bob");
    assert_eq!(user.role, Role::Writer);

    let viewer = user.viewer();
    assert_eq!(viewer.username, "bob");
    assert!(!viewer.is_admin());
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Local);
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap(), None);

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let app_state = create_app_state(Env::Local);
    let token = create_token(TEST_JWT_SECRET, 3600);
    let basic = format!("Basic {token}");

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap(), Some(&basic));
    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(AppError::Unauthenticated(_))));
}

#[tokio::test]
async fn test_auth_failure_with_garbage_token() {
    let app_state = create_app_state(Env::Local);
    let mut parts = get_request_parts(
        Method::GET,
        "/".parse().unwrap(),
        Some("Bearer not.a.jwt"),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    models::{
        AdminRoleRequestPayload, BlogDraft, BlogUpdateResponse, BlogView, CommentView,
        CreateCommentRequest, DeletedBlog, Envelope, LoginRequest, Profile, RegisterRequest,
        RegisteredProfile, RoleRequestView, Session, UpdateProfileRequest, UpdatedProfile,
    },
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
};
use serde::Deserialize;

// --- Query Structs ---

/// UserSearchParams
///
/// Query parameters of GET /users.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchParams {
    /// Username prefix, matched case-insensitively. Blank returns an empty list.
    pub search: Option<String>,
    /// Maximum number of results. Values <= 0 fall back to 10.
    pub limit: Option<i64>,
    /// Include soft-deleted accounts (admins only; ignored otherwise).
    pub include_deleted: Option<bool>,
}

/// IncludeDeletedParams
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncludeDeletedParams {
    pub include_deleted: Option<bool>,
}

/// RoleRequestFilter
///
/// Query parameters of GET /role-requests.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoleRequestFilter {
    /// pending | approved | rejected. Omitted lists every status.
    pub status: Option<String>,
    /// Maximum number of results. Values <= 0 fall back to 100.
    pub limit: Option<i64>,
}

// --- Extractors ---

/// RawTitle
///
/// The `{title}` segment of a `/blog/{title}...` route exactly as the client sent it,
/// still percent-encoded. The content service decodes it once, with query-unescape rules.
#[derive(Debug, Clone)]
pub struct RawTitle(pub String);

impl<S> FromRequestParts<S> for RawTitle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut segments = parts.uri.path().split('/');
        segments.find(|segment| *segment == "blog");
        segments
            .next()
            .filter(|segment| !segment.is_empty())
            .map(|segment| RawTitle(segment.to_string()))
            .ok_or_else(|| AppError::validation("invalid title"))
    }
}

fn parse_request_id(raw: &str) -> AppResult<i64> {
    raw.parse()
        .map_err(|_| AppError::validation("invalid id"))
}

// --- Identity Handlers ---

/// register_user
///
/// [Public Route] Creates an account. Asking for `admin` stores `reader` and files a
/// pending admin role request.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered (data envelope)", body = RegisteredProfile),
        (status = 400, description = "Missing field or unknown role", body = ErrorBody),
        (status = 409, description = "Email or username already exists", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<RegisteredProfile>>)> {
    let profile = state.identity.register(payload).await?;
    let message = if profile.pending_role_request_id.is_some() {
        "User created successfully. Your admin role request was sent to the admins; \
         until it is approved your role is 'reader'."
    } else {
        "User created successfully"
    };
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(profile, message)),
    ))
}

/// login
///
/// [Public Route] Exchanges a username or email plus password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session (data envelope)", body = Session),
        (status = 401, description = "Unknown user, deleted user or wrong password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<Envelope<Session>>> {
    let session = state.identity.login(payload).await?;
    Ok(Json(Envelope::with_message(session, "User login successfully!")))
}

/// search_users
///
/// [Authenticated Route] Username prefix search for autocompletion.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserSearchParams),
    responses((status = 200, description = "Matching profiles (data envelope)", body = [Profile]))
)]
pub async fn search_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<UserSearchParams>,
) -> AppResult<Json<Envelope<Vec<Profile>>>> {
    let profiles = state
        .identity
        .search_profiles(
            &auth.viewer(),
            params.search.as_deref().unwrap_or_default(),
            params.limit.unwrap_or_default(),
            params.include_deleted.unwrap_or_default(),
        )
        .await?;
    Ok(Json(Envelope::data(profiles)))
}

/// get_user
///
/// [Authenticated Route] Reads any active profile.
#[utoipa::path(
    get,
    path = "/api/v1/user/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Profile (data envelope)", body = Profile),
        (status = 404, description = "Missing or deleted", body = ErrorBody)
    )
)]
pub async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Envelope<Profile>>> {
    let profile = state.identity.get_profile(&auth.viewer(), &username).await?;
    Ok(Json(Envelope::data(profile)))
}

/// update_user
///
/// [Authenticated Route] Partial profile update. Non-admins may only update themselves.
#[utoipa::path(
    put,
    path = "/api/v1/user/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated (data envelope)", body = UpdatedProfile),
        (status = 403, description = "Not your account", body = ErrorBody),
        (status = 409, description = "Username or email taken, or user deleted", body = ErrorBody)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<Envelope<UpdatedProfile>>> {
    let updated = state
        .identity
        .update_profile(&auth.viewer(), &username, payload)
        .await?;
    Ok(Json(Envelope::with_message(updated, "User updated successfully!")))
}

/// delete_user
///
/// [Authenticated Route] Soft-deletes an account. Non-admins may only delete themselves.
#[utoipa::path(
    delete,
    path = "/api/v1/user/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not your account", body = ErrorBody),
        (status = 409, description = "Already deleted", body = ErrorBody)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Envelope<()>>> {
    state
        .identity
        .delete_profile(&auth.viewer(), &username)
        .await?;
    Ok(Json(Envelope::with_message((), "User deleted successfully!")))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses((status = 200, description = "Profile (data envelope)", body = Profile))
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Envelope<Profile>>> {
    let profile = state.identity.get_me(&auth.viewer()).await?;
    Ok(Json(Envelope::data(profile)))
}

#[utoipa::path(
    put,
    path = "/api/v1/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated (data envelope)", body = UpdatedProfile))
)]
pub async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<Envelope<UpdatedProfile>>> {
    let updated = state.identity.update_me(&auth.viewer(), payload).await?;
    Ok(Json(Envelope::with_message(updated, "User updated successfully!")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/me",
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Envelope<()>>> {
    state.identity.delete_me(&auth.viewer()).await?;
    Ok(Json(Envelope::with_message((), "User deleted successfully!")))
}

/// request_admin_role
///
/// [Authenticated Route] Files a pending admin role request for the caller.
#[utoipa::path(
    post,
    path = "/api/v1/role-requests",
    request_body = AdminRoleRequestPayload,
    responses(
        (status = 201, description = "Request filed (data envelope)", body = RoleRequestView),
        (status = 409, description = "Already admin or a request is pending", body = ErrorBody)
    )
)]
pub async fn request_admin_role(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Option<Json<AdminRoleRequestPayload>>,
) -> AppResult<(StatusCode, Json<Envelope<RoleRequestView>>)> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let request = state
        .identity
        .request_admin_role(&auth.viewer(), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(request, "Your request was received")),
    ))
}

// --- Admin Identity Handlers ---

/// restore_user
///
/// [Admin Route] Clears the soft-delete marker of an account.
#[utoipa::path(
    put,
    path = "/api/v1/user/{username}/restore",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Restored"),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 409, description = "Not deleted", body = ErrorBody)
    )
)]
pub async fn restore_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Envelope<()>>> {
    state
        .identity
        .restore_profile(&auth.viewer(), &username)
        .await?;
    Ok(Json(Envelope::with_message((), "User restored successfully!")))
}

/// list_role_requests
///
/// [Admin Route] Role requests, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/role-requests",
    params(RoleRequestFilter),
    responses(
        (status = 200, description = "Requests (data envelope)", body = [RoleRequestView]),
        (status = 400, description = "Unknown status", body = ErrorBody)
    )
)]
pub async fn list_role_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<RoleRequestFilter>,
) -> AppResult<Json<Envelope<Vec<RoleRequestView>>>> {
    let requests = state
        .identity
        .list_role_requests(
            &auth.viewer(),
            filter.status.as_deref(),
            filter.limit.unwrap_or_default(),
        )
        .await?;
    Ok(Json(Envelope::data(requests)))
}

/// approve_role_request
///
/// [Admin Route] Approves a pending request and promotes its user.
#[utoipa::path(
    put,
    path = "/api/v1/role-requests/{id}/approve",
    params(("id" = i64, Path, description = "Role request id")),
    responses(
        (status = 200, description = "Approved (data envelope)", body = RoleRequestView),
        (status = 409, description = "Already decided", body = ErrorBody)
    )
)]
pub async fn approve_role_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Envelope<RoleRequestView>>> {
    let id = parse_request_id(&id)?;
    let request = state
        .identity
        .approve_role_request(&auth.viewer(), id)
        .await?;
    Ok(Json(Envelope::with_message(request, "Request approved")))
}

#[utoipa::path(
    put,
    path = "/api/v1/role-requests/{id}/reject",
    params(("id" = i64, Path, description = "Role request id")),
    responses(
        (status = 200, description = "Rejected (data envelope)", body = RoleRequestView),
        (status = 409, description = "Already decided", body = ErrorBody)
    )
)]
pub async fn reject_role_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Envelope<RoleRequestView>>> {
    let id = parse_request_id(&id)?;
    let request = state
        .identity
        .reject_role_request(&auth.viewer(), id)
        .await?;
    Ok(Json(Envelope::with_message(request, "Request rejected")))
}

// --- Content Handlers ---

/// list_blogs
///
/// [Authenticated Route] Site-wide listing. Only admins see unapproved or deleted posts.
#[utoipa::path(
    get,
    path = "/api/v1/blogs",
    params(IncludeDeletedParams),
    responses((status = 200, description = "Blogs (data envelope)", body = [BlogView]))
)]
pub async fn list_blogs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<IncludeDeletedParams>,
) -> AppResult<Json<Envelope<Vec<BlogView>>>> {
    let blogs = state
        .content
        .list_blogs(&auth.viewer(), params.include_deleted.unwrap_or_default())
        .await?;
    Ok(Json(Envelope::data(blogs)))
}

/// list_blogs_by_author
///
/// [Authenticated Route] One author's posts. The author and admins see unapproved posts.
#[utoipa::path(
    get,
    path = "/api/v1/blogs/{username}",
    params(("username" = String, Path, description = "Author"), IncludeDeletedParams),
    responses(
        (status = 200, description = "Blogs (data envelope)", body = [BlogView]),
        (status = 403, description = "Deleted posts of another author", body = ErrorBody)
    )
)]
pub async fn list_blogs_by_author(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<IncludeDeletedParams>,
) -> AppResult<Json<Envelope<Vec<BlogView>>>> {
    let blogs = state
        .content
        .list_blogs_by_author(
            &auth.viewer(),
            &username,
            params.include_deleted.unwrap_or_default(),
        )
        .await?;
    Ok(Json(Envelope::data(blogs)))
}

/// list_deleted_blogs_by_author
///
/// [Authenticated Route] Shorthand for `/blogs/{username}?include_deleted=true`.
#[utoipa::path(
    get,
    path = "/api/v1/blogs-deleted/{username}",
    params(("username" = String, Path, description = "Author")),
    responses(
        (status = 200, description = "Blogs including deleted (data envelope)", body = [BlogView]),
        (status = 403, description = "Not the author or an admin", body = ErrorBody)
    )
)]
pub async fn list_deleted_blogs_by_author(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Envelope<Vec<BlogView>>>> {
    let blogs = state
        .content
        .list_blogs_by_author(&auth.viewer(), &username, true)
        .await?;
    Ok(Json(Envelope::data(blogs)))
}

/// get_blog
///
/// [Authenticated Route] A single post. Hidden posts answer 404 like missing ones.
#[utoipa::path(
    get,
    path = "/api/v1/blog/{title}",
    params(("title" = String, Path, description = "Percent-encoded title")),
    responses(
        (status = 200, description = "Blog (data envelope)", body = BlogView),
        (status = 404, description = "Missing or not visible", body = ErrorBody)
    )
)]
pub async fn get_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
) -> AppResult<Json<Envelope<BlogView>>> {
    let blog = state
        .content
        .get_blog_by_title(&auth.viewer(), &title)
        .await?;
    Ok(Json(Envelope::data(blog)))
}

/// create_blog
///
/// [Authenticated Route] Writers and admins publish posts; admin posts are pre-approved.
#[utoipa::path(
    post,
    path = "/api/v1/blog",
    request_body = BlogDraft,
    responses(
        (status = 201, description = "Created (data envelope)", body = BlogView),
        (status = 403, description = "Readers cannot publish", body = ErrorBody),
        (status = 409, description = "Same body already exists", body = ErrorBody)
    )
)]
pub async fn create_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BlogDraft>,
) -> AppResult<(StatusCode, Json<Envelope<BlogView>>)> {
    let blog = state.content.create_blog(&auth.viewer(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(blog, "Blog created successfully!")),
    ))
}

/// update_blog
///
/// [Authenticated Route] Full replacement by the owner or an admin.
#[utoipa::path(
    put,
    path = "/api/v1/blog/{title}",
    params(("title" = String, Path, description = "Percent-encoded title")),
    request_body = BlogDraft,
    responses(
        (status = 200, description = "Updated (data envelope)", body = BlogUpdateResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 409, description = "Same body already exists", body = ErrorBody)
    )
)]
pub async fn update_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
    Json(payload): Json<BlogDraft>,
) -> AppResult<Json<Envelope<BlogUpdateResponse>>> {
    let updated = state
        .content
        .update_blog(&auth.viewer(), &title, payload)
        .await?;
    Ok(Json(Envelope::with_message(updated, "Blog updated successfully!")))
}

/// delete_blog
///
/// [Authenticated Route] Soft delete by the owner or an admin.
#[utoipa::path(
    delete,
    path = "/api/v1/blog/{title}",
    params(("title" = String, Path, description = "Percent-encoded title")),
    responses(
        (status = 200, description = "Deleted (data envelope)", body = DeletedBlog),
        (status = 409, description = "Already deleted", body = ErrorBody)
    )
)]
pub async fn delete_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
) -> AppResult<Json<Envelope<DeletedBlog>>> {
    let deleted = state.content.delete_blog(&auth.viewer(), &title).await?;
    Ok(Json(Envelope::with_message(deleted, "Blog deleted successfully!")))
}

/// add_comment
///
/// [Authenticated Route] Comments on a post visible to the caller.
#[utoipa::path(
    post,
    path = "/api/v1/blog/{title}/comments",
    params(("title" = String, Path, description = "Percent-encoded title")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added (data envelope)", body = CommentView),
        (status = 404, description = "Missing or not visible", body = ErrorBody)
    )
)]
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Envelope<CommentView>>)> {
    let comment = state
        .content
        .add_comment(&auth.viewer(), &title, &payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::data(comment))))
}

// --- Admin Content Handlers ---

/// approve_blog
///
/// [Admin Route] Makes a post visible to everyone.
#[utoipa::path(
    put,
    path = "/api/v1/blog/{title}/approve",
    params(("title" = String, Path, description = "Percent-encoded title")),
    responses(
        (status = 200, description = "Approved (data envelope)", body = BlogView),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn approve_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
) -> AppResult<Json<Envelope<BlogView>>> {
    let blog = state
        .content
        .approve_blog(&auth.viewer(), &title, true)
        .await?;
    Ok(Json(Envelope::with_message(blog, "Blog approved")))
}

#[utoipa::path(
    put,
    path = "/api/v1/blog/{title}/unapprove",
    params(("title" = String, Path, description = "Percent-encoded title")),
    responses(
        (status = 200, description = "Unapproved (data envelope)", body = BlogView),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn unapprove_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
) -> AppResult<Json<Envelope<BlogView>>> {
    let blog = state
        .content
        .approve_blog(&auth.viewer(), &title, false)
        .await?;
    Ok(Json(Envelope::with_message(blog, "Blog unapproved")))
}

/// restore_blog
///
/// [Admin Route] Brings a soft-deleted post back as an unapproved draft.
#[utoipa::path(
    put,
    path = "/api/v1/blog/{title}/restore",
    params(("title" = String, Path, description = "Percent-encoded title")),
    responses(
        (status = 200, description = "Restored"),
        (status = 409, description = "Not deleted", body = ErrorBody)
    )
)]
pub async fn restore_blog(
    auth: AuthUser,
    State(state): State<AppState>,
    RawTitle(title): RawTitle,
) -> AppResult<Json<Envelope<()>>> {
    state.content.restore_blog(&auth.viewer(), &title).await?;
    Ok(Json(Envelope::with_message((), "Blog restored successfully!")))
}

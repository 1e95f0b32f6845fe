use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Domain Types ---

/// Role
///
/// The RBAC field of a user. `Admin` is never granted at registration; it is reached only
/// through an approved role request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored or claimed role. Input is expected to be normalized already.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reader" => Some(Self::Reader),
            "writer" => Some(Self::Writer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DeletionState
///
/// Soft-delete marker shared by users and blogs. Stores persist it as a nullable
/// `deleted_at` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionState {
    #[default]
    Active,
    Deleted { at: DateTime<Utc> },
}

impl DeletionState {
    pub fn from_timestamp(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(at) => Self::Deleted { at },
            None => Self::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Deleted { at } => Some(*at),
            Self::Active => None,
        }
    }
}

/// User
///
/// Canonical identity record. The password hash is an opaque PHC string and never leaves
/// the service layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub deletion: DeletionState,
    // Usernames; duplicates are not rejected.
    pub followers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Content
///
/// The content block of a blog post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub title: String,
    pub body: String,
    pub blog_type: String,
    pub status: String,
    pub is_approved: bool,
}

/// Blog
///
/// A blog post. Ownership is the denormalized `username`; a user rename rewrites it.
#[derive(Debug, Clone)]
pub struct Blog {
    pub id: i64,
    pub content: Content,
    pub tags: String,
    pub category: String,
    pub author_id: i64,
    pub username: String,
    pub comments: Vec<Comment>,
    pub deletion: DeletionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// Immutable comment owned by exactly one blog.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub blog_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// RoleRequestStatus
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RoleRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RoleRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// RoleRequest
///
/// A user's petition for the admin role. `decided_by`/`decided_at` are set exactly once,
/// together with the terminal status.
#[derive(Debug, Clone)]
pub struct RoleRequest {
    pub id: i64,
    pub username: String,
    pub requested_role: Role,
    pub status: RoleRequestStatus,
    pub reason: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Store Inputs ---

/// Insert payload for the identity store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Fields rewritten by a profile update. All values are final (already merged).
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Insert payload for the content store.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub content: Content,
    pub tags: String,
    pub category: String,
    pub author_id: i64,
    pub username: String,
}

/// Full replacement of a blog's content block and classification. Approval is untouched.
#[derive(Debug, Clone, Default)]
pub struct BlogReplacement {
    pub title: String,
    pub body: String,
    pub blog_type: String,
    pub status: String,
    pub tags: String,
    pub category: String,
}

/// Insert payload for the role-request store.
#[derive(Debug, Clone)]
pub struct NewRoleRequest {
    pub username: String,
    pub requested_role: Role,
    pub reason: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for POST /register. `role` is free text; it is trimmed and lower-cased before
/// validation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// LoginRequest
///
/// `identifier` is either the username or the email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// UpdateProfileRequest
///
/// Partial update: empty fields keep the current value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// BlogDraft
///
/// Input for blog creation and update. On update this is a full replacement: omitted
/// fields deserialize to empty strings and are stored as such.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct BlogDraft {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub blog_type: String,
    pub tags: String,
    pub category: String,
    pub status: String,
}

/// AdminRoleRequestPayload
///
/// Input for POST /role-requests. The reason is optional free text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct AdminRoleRequestPayload {
    pub reason: String,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

// --- Response Schemas (Output) ---

/// Envelope
///
/// Success wrapper used by every handler: `{ "data": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// RegisteredProfile
///
/// The stored profile after registration. `role` is the stored (possibly downgraded) role;
/// `pending_role_request_id` is set when an admin role was requested.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisteredProfile {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub pending_role_request_id: Option<i64>,
}

/// Session
///
/// Login result carrying the signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Session {
    pub token: String,
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Profile
///
/// Public view of a user record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub followers: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            followers: user.followers.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            deleted_at: user.deletion.deleted_at(),
        }
    }
}

/// UpdatedProfile
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatedProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UpdatedProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            updated_at: user.updated_at,
        }
    }
}

/// CommentView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentView {
    pub id: i64,
    pub blog_id: i64,
    pub user_id: i64,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            blog_id: comment.blog_id,
            user_id: comment.user_id,
            content: comment.content.clone(),
            created_at: comment.created_at,
        }
    }
}

/// BlogView
///
/// Caller-facing representation of a blog post, comments included.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BlogView {
    pub id: i64,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub blog_type: String,
    pub username: String,
    pub tags: String,
    pub category: String,
    pub comments: Vec<CommentView>,
    pub is_approved: bool,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Blog> for BlogView {
    fn from(blog: &Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.content.title.clone(),
            body: blog.content.body.clone(),
            blog_type: blog.content.blog_type.clone(),
            username: blog.username.clone(),
            tags: blog.tags.clone(),
            category: blog.category.clone(),
            comments: blog.comments.iter().map(CommentView::from).collect(),
            is_approved: blog.content.is_approved,
            status: blog.content.status.clone(),
            created_at: blog.created_at,
            updated_at: blog.updated_at,
            deleted_at: blog.deletion.deleted_at(),
        }
    }
}

/// BlogUpdateResponse
///
/// Echo of the replaced content after an update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BlogUpdateResponse {
    pub username: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub blog_type: String,
    pub tags: String,
    pub category: String,
    pub status: String,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Blog> for BlogUpdateResponse {
    fn from(blog: &Blog) -> Self {
        Self {
            username: blog.username.clone(),
            title: blog.content.title.clone(),
            body: blog.content.body.clone(),
            blog_type: blog.content.blog_type.clone(),
            tags: blog.tags.clone(),
            category: blog.category.clone(),
            status: blog.content.status.clone(),
            updated_at: blog.updated_at,
        }
    }
}

/// DeletedBlog
///
/// Result of a soft delete: the decoded title and the blog's owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeletedBlog {
    pub title: String,
    pub blog_author: String,
}

/// RoleRequestView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleRequestView {
    pub id: i64,
    pub username: String,
    pub requested_role: Role,
    pub status: RoleRequestStatus,
    pub reason: String,
    pub decided_by: Option<String>,
    #[ts(type = "string | null")]
    pub decided_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&RoleRequest> for RoleRequestView {
    fn from(request: &RoleRequest) -> Self {
        Self {
            id: request.id,
            username: request.username.clone(),
            requested_role: request.requested_role,
            status: request.status,
            reason: request.reason.clone(),
            decided_by: request.decided_by.clone(),
            decided_at: request.decided_at,
            created_at: request.created_at,
        }
    }
}

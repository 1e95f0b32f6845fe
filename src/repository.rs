use crate::models::{
    Blog, BlogReplacement, Comment, Content, DeletionState, NewBlog, NewRoleRequest, NewUser,
    ProfileChanges, Role, RoleRequest, RoleRequestStatus, User,
};
use crate::policy::BlogScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// StoreError
///
/// Failure modes shared by every store implementation. `NotFound` means the addressed
/// record does not exist; `NoRowsAffected` means it exists but was not in the state the
/// mutation requires (already deleted, not deleted, already decided).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("no rows affected")]
    NoRowsAffected,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            _ => {
                tracing::error!("store error: {:?}", err);
                Self::Database(err.to_string())
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// IdentityStore
///
/// Persistence contract for user records. Lookups return soft-deleted users as well; the
/// caller decides what a `DeletionState::Deleted` record means for the operation at hand.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    // Inserts a user. A racing duplicate username/email surfaces as `Conflict`.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    // Exact, case-sensitive username match.
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    // Matches either the username or the email. The oldest record wins.
    async fn user_by_identifier(&self, identifier: &str) -> StoreResult<Option<User>>;
    // Existence checks over every record, soft-deleted included. `except` excludes one id.
    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool>;
    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool>;
    // Case-insensitive username prefix search, ordered by username.
    async fn search_users(
        &self,
        prefix: &str,
        include_deleted: bool,
        limit: i64,
    ) -> StoreResult<Vec<User>>;

    /// Rewrites username, email and password hash of an active user. When the username
    /// changes, every blog owned by `old_username` (and every role request filed under it)
    /// is re-owned in the same transaction.
    async fn update_profile(
        &self,
        id: i64,
        old_username: &str,
        changes: ProfileChanges,
    ) -> StoreResult<User>;

    // `NotFound` if missing, `NoRowsAffected` if already deleted.
    async fn soft_delete_user(&self, username: &str) -> StoreResult<()>;
    // `NotFound` if missing, `NoRowsAffected` if not deleted.
    async fn restore_user(&self, username: &str) -> StoreResult<()>;
}

/// ContentStore
///
/// Persistence contract for blog posts and their comments. Returned blogs always carry
/// their full comment list, oldest first.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_blog(&self, blog: NewBlog) -> StoreResult<Blog>;

    /// Looks up a blog by exact title. Titles are not unique: active records are preferred,
    /// then the lowest id. Soft-deleted records are considered only with `include_deleted`.
    async fn blog_by_title(&self, title: &str, include_deleted: bool)
    -> StoreResult<Option<Blog>>;

    // Body collision check across every record, soft-deleted included.
    async fn body_exists(&self, body: &str) -> StoreResult<bool>;

    // Listing restricted to `scope`, optionally to one author, ordered by id.
    async fn list_blogs(&self, author: Option<&str>, scope: BlogScope) -> StoreResult<Vec<Blog>>;

    // Full replacement of the content block and classification of an active blog.
    async fn replace_blog(&self, id: i64, replacement: BlogReplacement) -> StoreResult<Blog>;
    // Sets the approval flag of an active blog. `NotFound` if missing or deleted.
    async fn set_blog_approval(&self, id: i64, approved: bool) -> StoreResult<Blog>;

    /// Soft delete: stamps `deleted_at`, forces `is_approved = false` and
    /// `status = "deleted"`. `NoRowsAffected` if already deleted.
    async fn soft_delete_blog(&self, id: i64) -> StoreResult<()>;
    /// Clears `deleted_at` and resets to an unapproved draft. `NoRowsAffected` if the blog
    /// was never deleted.
    async fn restore_blog(&self, id: i64) -> StoreResult<()>;

    async fn insert_comment(&self, blog_id: i64, user_id: i64, content: &str)
    -> StoreResult<Comment>;
}

/// RoleRequestStore
///
/// Persistence contract for admin role requests.
#[async_trait]
pub trait RoleRequestStore: Send + Sync {
    async fn insert_role_request(&self, request: NewRoleRequest) -> StoreResult<RoleRequest>;
    // Most recently filed request of a user, any status.
    async fn latest_role_request(&self, username: &str) -> StoreResult<Option<RoleRequest>>;
    // Newest first.
    async fn list_role_requests(
        &self,
        status: Option<RoleRequestStatus>,
        limit: i64,
    ) -> StoreResult<Vec<RoleRequest>>;

    /// Marks a pending request approved and grants the requested role to its user, in one
    /// transaction. `NotFound` if the request or its user is missing, `NoRowsAffected` if
    /// not pending. Nothing changes on failure.
    async fn approve_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest>;
    // Marks a pending request rejected. Same failure modes as approval.
    async fn reject_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest>;
}

/// Repository
///
/// The full persistence surface the services depend on. Implemented automatically for any
/// type that implements the three stores.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
pub trait Repository: IdentityStore + ContentStore + RoleRequestStore {}

impl<T> Repository for T where T: IdentityStore + ContentStore + RoleRequestStore {}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Mapping ---

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, followers, created_at, updated_at, deleted_at";
const BLOG_COLUMNS: &str = "id, title, body, blog_type, status, is_approved, tags, category, \
     author_id, username, created_at, updated_at, deleted_at";
const ROLE_REQUEST_COLUMNS: &str = "id, username, requested_role, status, reason, decided_by, \
     decided_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    followers: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| StoreError::Database(format!("unknown role '{}'", row.role)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            deletion: DeletionState::from_timestamp(row.deleted_at),
            followers: row.followers,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BlogRow {
    id: i64,
    title: String,
    body: String,
    blog_type: String,
    status: String,
    is_approved: bool,
    tags: String,
    category: String,
    author_id: i64,
    username: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl BlogRow {
    fn into_blog(self, comments: Vec<Comment>) -> Blog {
        Blog {
            id: self.id,
            content: Content {
                title: self.title,
                body: self.body,
                blog_type: self.blog_type,
                status: self.status,
                is_approved: self.is_approved,
            },
            tags: self.tags,
            category: self.category,
            author_id: self.author_id,
            username: self.username,
            comments,
            deletion: DeletionState::from_timestamp(self.deleted_at),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    blog_id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            blog_id: row.blog_id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRequestRow {
    id: i64,
    username: String,
    requested_role: String,
    status: String,
    reason: String,
    decided_by: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRequestRow> for RoleRequest {
    type Error = StoreError;

    fn try_from(row: RoleRequestRow) -> Result<Self, Self::Error> {
        let requested_role = Role::parse(&row.requested_role).ok_or_else(|| {
            StoreError::Database(format!("unknown role '{}'", row.requested_role))
        })?;
        let status = RoleRequestStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Database(format!("unknown role request status '{}'", row.status))
        })?;
        Ok(RoleRequest {
            id: row.id,
            username: row.username,
            requested_role,
            status,
            reason: row.reason,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escapes LIKE wildcards so a search prefix is matched literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// PostgresRepository
///
/// The concrete implementation of the store traits, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the comments of the given blogs in one query and attaches them.
    async fn with_comments(&self, rows: Vec<BlogRow>) -> StoreResult<Vec<Blog>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let comment_rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, blog_id, user_id, content, created_at FROM comments \
             WHERE blog_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_blog: HashMap<i64, Vec<Comment>> = HashMap::new();
        for row in comment_rows {
            by_blog.entry(row.blog_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let comments = by_blog.remove(&row.id).unwrap_or_default();
                row.into_blog(comments)
            })
            .collect())
    }

    async fn with_comments_one(&self, row: BlogRow) -> StoreResult<Blog> {
        self.with_comments(vec![row])
            .await?
            .pop()
            .ok_or(StoreError::NotFound)
    }

    async fn user_exists(&self, username: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn role_request_exists(&self, id: i64) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM role_requests WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Moves a pending request to a terminal status. Runs inside the caller's transaction.
    async fn decide_role_request(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        id: i64,
        status: RoleRequestStatus,
        decided_by: &str,
    ) -> StoreResult<Option<RoleRequestRow>> {
        let row = sqlx::query_as::<_, RoleRequestRow>(&format!(
            "UPDATE role_requests \
             SET status = $2, decided_by = $3, decided_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {ROLE_REQUEST_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(decided_by)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    async fn undecided_error(&self, id: i64) -> StoreError {
        match self.role_request_exists(id).await {
            Ok(true) => StoreError::NoRowsAffected,
            Ok(false) => StoreError::NotFound,
            Err(err) => err,
        }
    }
}

#[async_trait]
impl IdentityStore for PostgresRepository {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn user_by_identifier(&self, identifier: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 \
             ORDER BY id LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 \
             AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 \
             AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// search_users
    ///
    /// Uses QueryBuilder so the soft-delete filter is added only when needed.
    async fn search_users(
        &self,
        prefix: &str,
        include_deleted: bool,
        limit: i64,
    ) -> StoreResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) LIKE LOWER("));
        builder.push_bind(like_prefix(prefix));
        builder.push(") ESCAPE '\\'");
        if !include_deleted {
            builder.push(" AND deleted_at IS NULL");
        }
        builder.push(" ORDER BY username ASC LIMIT ");
        builder.push_bind(limit);

        builder
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// update_profile
    ///
    /// The profile row, the owner column of the user's blogs and the username on their
    /// role requests change together or not at all.
    async fn update_profile(
        &self,
        id: i64,
        old_username: &str,
        changes: ProfileChanges,
    ) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        if changes.username != old_username {
            let renamed = sqlx::query("UPDATE blogs SET username = $2 WHERE username = $1")
                .bind(old_username)
                .bind(&changes.username)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE role_requests SET username = $2 WHERE username = $1")
                .bind(old_username)
                .bind(&changes.username)
                .execute(&mut *tx)
                .await?;
            tracing::debug!(
                old = %old_username,
                new = %changes.username,
                blogs = renamed.rows_affected(),
                "re-owned blogs after rename"
            );
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn soft_delete_user(&self, username: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() \
             WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .execute(&self.pool)
        .await?;

        match result.rows_affected() {
            0 if self.user_exists(username).await? => Err(StoreError::NoRowsAffected),
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn restore_user(&self, username: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NULL, updated_at = NOW() \
             WHERE username = $1 AND deleted_at IS NOT NULL",
        )
        .bind(username)
        .execute(&self.pool)
        .await?;

        match result.rows_affected() {
            0 if self.user_exists(username).await? => Err(StoreError::NoRowsAffected),
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ContentStore for PostgresRepository {
    async fn insert_blog(&self, blog: NewBlog) -> StoreResult<Blog> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "INSERT INTO blogs (title, body, blog_type, status, is_approved, tags, category, \
             author_id, username) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {BLOG_COLUMNS}"
        ))
        .bind(&blog.content.title)
        .bind(&blog.content.body)
        .bind(&blog.content.blog_type)
        .bind(&blog.content.status)
        .bind(blog.content.is_approved)
        .bind(&blog.tags)
        .bind(&blog.category)
        .bind(blog.author_id)
        .bind(&blog.username)
        .fetch_one(&self.pool)
        .await?;
        // Fresh blogs have no comments.
        Ok(row.into_blog(Vec::new()))
    }

    async fn blog_by_title(
        &self,
        title: &str,
        include_deleted: bool,
    ) -> StoreResult<Option<Blog>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE title = "));
        builder.push_bind(title);
        if !include_deleted {
            builder.push(" AND deleted_at IS NULL");
        }
        builder.push(" ORDER BY (deleted_at IS NOT NULL) ASC, id ASC LIMIT 1");

        let row = builder
            .build_query_as::<BlogRow>()
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.with_comments_one(row).await?)),
            None => Ok(None),
        }
    }

    async fn body_exists(&self, body: &str) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM blogs WHERE body = $1)")
                .bind(body)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// list_blogs
    ///
    /// The scope is translated into SQL predicates; the services still re-check each entry.
    async fn list_blogs(&self, author: Option<&str>, scope: BlogScope) -> StoreResult<Vec<Blog>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE TRUE"));
        if let Some(author) = author {
            builder.push(" AND username = ");
            builder.push_bind(author);
        }
        match scope {
            BlogScope::ApprovedOnly => {
                builder.push(" AND is_approved = TRUE AND deleted_at IS NULL");
            }
            BlogScope::All => {
                builder.push(" AND deleted_at IS NULL");
            }
            BlogScope::AllIncludingDeleted => {}
        }
        builder.push(" ORDER BY id ASC");

        let rows = builder
            .build_query_as::<BlogRow>()
            .fetch_all(&self.pool)
            .await?;
        self.with_comments(rows).await
    }

    async fn replace_blog(&self, id: i64, replacement: BlogReplacement) -> StoreResult<Blog> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "UPDATE blogs SET title = $2, body = $3, blog_type = $4, status = $5, tags = $6, \
             category = $7, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .bind(&replacement.title)
        .bind(&replacement.body)
        .bind(&replacement.blog_type)
        .bind(&replacement.status)
        .bind(&replacement.tags)
        .bind(&replacement.category)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        self.with_comments_one(row).await
    }

    async fn set_blog_approval(&self, id: i64, approved: bool) -> StoreResult<Blog> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "UPDATE blogs SET is_approved = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .bind(approved)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        self.with_comments_one(row).await
    }

    async fn soft_delete_blog(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE blogs SET deleted_at = NOW(), is_approved = FALSE, status = 'deleted', \
             updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRowsAffected);
        }
        Ok(())
    }

    async fn restore_blog(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE blogs SET deleted_at = NULL, is_approved = FALSE, status = 'draft', \
             updated_at = NOW() WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRowsAffected);
        }
        Ok(())
    }

    async fn insert_comment(
        &self,
        blog_id: i64,
        user_id: i64,
        content: &str,
    ) -> StoreResult<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            "INSERT INTO comments (blog_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING id, blog_id, user_id, content, created_at",
        )
        .bind(blog_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl RoleRequestStore for PostgresRepository {
    async fn insert_role_request(&self, request: NewRoleRequest) -> StoreResult<RoleRequest> {
        let row = sqlx::query_as::<_, RoleRequestRow>(&format!(
            "INSERT INTO role_requests (username, requested_role, status, reason) \
             VALUES ($1, $2, 'pending', $3) RETURNING {ROLE_REQUEST_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(request.requested_role.as_str())
        .bind(&request.reason)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn latest_role_request(&self, username: &str) -> StoreResult<Option<RoleRequest>> {
        sqlx::query_as::<_, RoleRequestRow>(&format!(
            "SELECT {ROLE_REQUEST_COLUMNS} FROM role_requests WHERE username = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(RoleRequest::try_from)
        .transpose()
    }

    async fn list_role_requests(
        &self,
        status: Option<RoleRequestStatus>,
        limit: i64,
    ) -> StoreResult<Vec<RoleRequest>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ROLE_REQUEST_COLUMNS} FROM role_requests"));
        if let Some(status) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);

        builder
            .build_query_as::<RoleRequestRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(RoleRequest::try_from)
            .collect()
    }

    /// approve_role_request
    ///
    /// Status change and role promotion share one transaction. Dropping `tx` on an early
    /// return rolls it back.
    async fn approve_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest> {
        let mut tx = self.pool.begin().await?;

        let Some(row) =
            Self::decide_role_request(&mut tx, id, RoleRequestStatus::Approved, decided_by).await?
        else {
            drop(tx);
            return Err(self.undecided_error(id).await);
        };

        let promoted =
            sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE username = $1")
                .bind(&row.username)
                .bind(&row.requested_role)
                .execute(&mut *tx)
                .await?;
        if promoted.rows_affected() == 0 {
            tracing::warn!(request_id = id, username = %row.username, "role request names no user");
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn reject_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest> {
        let mut tx = self.pool.begin().await?;

        let Some(row) =
            Self::decide_role_request(&mut tx, id, RoleRequestStatus::Rejected, decided_by).await?
        else {
            drop(tx);
            return Err(self.undecided_error(id).await);
        };

        tx.commit().await?;
        row.try_into()
    }
}

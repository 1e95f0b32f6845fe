use crate::models::{
    Blog, BlogReplacement, Comment, Content, DeletionState, NewBlog, NewRoleRequest, NewUser,
    ProfileChanges, RoleRequest, RoleRequestStatus, User,
};
use crate::policy::BlogScope;
use crate::repository::{
    ContentStore, IdentityStore, RoleRequestStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    blogs: Vec<Blog>,
    role_requests: Vec<RoleRequest>,
    next_user_id: i64,
    next_blog_id: i64,
    next_comment_id: i64,
    next_role_request_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn user_mut(&mut self, username: &str) -> StoreResult<&mut User> {
        self.users
            .iter_mut()
            .find(|user| user.username == username)
            .ok_or(StoreError::NotFound)
    }

    fn blog_mut(&mut self, id: i64) -> StoreResult<&mut Blog> {
        self.blogs
            .iter_mut()
            .find(|blog| blog.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn pending_request_mut(&mut self, id: i64) -> StoreResult<&mut RoleRequest> {
        let request = self
            .role_requests
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or(StoreError::NotFound)?;
        if request.status != RoleRequestStatus::Pending {
            return Err(StoreError::NoRowsAffected);
        }
        Ok(request)
    }
}

/// InMemoryRepository
///
/// Store implementation over plain vectors guarded by a single `RwLock`, so every
/// multi-table mutation (rename cascade, role promotion) is atomic. Used by the test suite
/// and by local runs without `DATABASE_URL`. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryRepository {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|existing| existing.username == user.username || existing.email == user.email)
        {
            return Err(StoreError::Conflict("username or email already exists".to_string()));
        }
        let now = Utc::now();
        let record = User {
            id: Tables::next_id(&mut tables.next_user_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            deletion: DeletionState::Active,
            followers: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|user| user.username == username).cloned())
    }

    async fn user_by_identifier(&self, identifier: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == identifier || user.email == identifier)
            .cloned())
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|user| user.username == username && Some(user.id) != except))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|user| user.email == email && Some(user.id) != except))
    }

    async fn search_users(
        &self,
        prefix: &str,
        include_deleted: bool,
        limit: i64,
    ) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let prefix = prefix.to_lowercase();
        let mut found: Vec<User> = tables
            .users
            .iter()
            .filter(|user| include_deleted || !user.deletion.is_deleted())
            .filter(|user| user.username.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn update_profile(
        &self,
        id: i64,
        old_username: &str,
        changes: ProfileChanges,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|user| {
            user.id != id && (user.username == changes.username || user.email == changes.email)
        }) {
            return Err(StoreError::Conflict("username or email already exists".to_string()));
        }

        let user = tables
            .users
            .iter_mut()
            .find(|user| user.id == id && !user.deletion.is_deleted())
            .ok_or(StoreError::NotFound)?;
        user.username = changes.username.clone();
        user.email = changes.email;
        user.password_hash = changes.password_hash;
        user.updated_at = Utc::now();
        let updated = user.clone();

        if changes.username != old_username {
            for blog in tables.blogs.iter_mut().filter(|b| b.username == old_username) {
                blog.username = changes.username.clone();
            }
            for request in tables
                .role_requests
                .iter_mut()
                .filter(|r| r.username == old_username)
            {
                request.username = changes.username.clone();
            }
        }
        Ok(updated)
    }

    async fn soft_delete_user(&self, username: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(username)?;
        if user.deletion.is_deleted() {
            return Err(StoreError::NoRowsAffected);
        }
        let now = Utc::now();
        user.deletion = DeletionState::Deleted { at: now };
        user.updated_at = now;
        Ok(())
    }

    async fn restore_user(&self, username: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(username)?;
        if !user.deletion.is_deleted() {
            return Err(StoreError::NoRowsAffected);
        }
        user.deletion = DeletionState::Active;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ContentStore for InMemoryRepository {
    async fn insert_blog(&self, blog: NewBlog) -> StoreResult<Blog> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = Blog {
            id: Tables::next_id(&mut tables.next_blog_id),
            content: blog.content,
            tags: blog.tags,
            category: blog.category,
            author_id: blog.author_id,
            username: blog.username,
            comments: Vec::new(),
            deletion: DeletionState::Active,
            created_at: now,
            updated_at: now,
        };
        tables.blogs.push(record.clone());
        Ok(record)
    }

    async fn blog_by_title(
        &self,
        title: &str,
        include_deleted: bool,
    ) -> StoreResult<Option<Blog>> {
        let tables = self.tables.read().await;
        // Blogs are kept in id order, so the first match per pass is the lowest id.
        let active = tables
            .blogs
            .iter()
            .find(|blog| blog.content.title == title && !blog.deletion.is_deleted());
        let found = match active {
            Some(blog) => Some(blog),
            None if include_deleted => tables.blogs.iter().find(|blog| blog.content.title == title),
            None => None,
        };
        Ok(found.cloned())
    }

    async fn body_exists(&self, body: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.blogs.iter().any(|blog| blog.content.body == body))
    }

    async fn list_blogs(&self, author: Option<&str>, scope: BlogScope) -> StoreResult<Vec<Blog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .blogs
            .iter()
            .filter(|blog| author.is_none_or(|author| blog.username == author))
            .filter(|blog| scope.admits(blog.content.is_approved, blog.deletion.is_deleted()))
            .cloned()
            .collect())
    }

    async fn replace_blog(&self, id: i64, replacement: BlogReplacement) -> StoreResult<Blog> {
        let mut tables = self.tables.write().await;
        let blog = tables.blog_mut(id)?;
        if blog.deletion.is_deleted() {
            return Err(StoreError::NotFound);
        }
        blog.content = Content {
            title: replacement.title,
            body: replacement.body,
            blog_type: replacement.blog_type,
            status: replacement.status,
            is_approved: blog.content.is_approved,
        };
        blog.tags = replacement.tags;
        blog.category = replacement.category;
        blog.updated_at = Utc::now();
        Ok(blog.clone())
    }

    async fn set_blog_approval(&self, id: i64, approved: bool) -> StoreResult<Blog> {
        let mut tables = self.tables.write().await;
        let blog = tables.blog_mut(id)?;
        if blog.deletion.is_deleted() {
            return Err(StoreError::NotFound);
        }
        blog.content.is_approved = approved;
        blog.updated_at = Utc::now();
        Ok(blog.clone())
    }

    async fn soft_delete_blog(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let blog = tables.blog_mut(id)?;
        if blog.deletion.is_deleted() {
            return Err(StoreError::NoRowsAffected);
        }
        let now = Utc::now();
        blog.deletion = DeletionState::Deleted { at: now };
        blog.content.is_approved = false;
        blog.content.status = "deleted".to_string();
        blog.updated_at = now;
        Ok(())
    }

    async fn restore_blog(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let blog = tables.blog_mut(id)?;
        if !blog.deletion.is_deleted() {
            return Err(StoreError::NoRowsAffected);
        }
        blog.deletion = DeletionState::Active;
        blog.content.is_approved = false;
        blog.content.status = "draft".to_string();
        blog.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_comment(
        &self,
        blog_id: i64,
        user_id: i64,
        content: &str,
    ) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_comment_id);
        let blog = tables.blog_mut(blog_id)?;
        let comment = Comment {
            id,
            blog_id,
            user_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        blog.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl RoleRequestStore for InMemoryRepository {
    async fn insert_role_request(&self, request: NewRoleRequest) -> StoreResult<RoleRequest> {
        let mut tables = self.tables.write().await;
        if tables.role_requests.iter().any(|existing| {
            existing.username == request.username && existing.status == RoleRequestStatus::Pending
        }) {
            return Err(StoreError::Conflict("pending role request exists".to_string()));
        }
        let now = Utc::now();
        let record = RoleRequest {
            id: Tables::next_id(&mut tables.next_role_request_id),
            username: request.username,
            requested_role: request.requested_role,
            status: RoleRequestStatus::Pending,
            reason: request.reason,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.role_requests.push(record.clone());
        Ok(record)
    }

    async fn latest_role_request(&self, username: &str) -> StoreResult<Option<RoleRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_requests
            .iter()
            .rev()
            .find(|request| request.username == username)
            .cloned())
    }

    async fn list_role_requests(
        &self,
        status: Option<RoleRequestStatus>,
        limit: i64,
    ) -> StoreResult<Vec<RoleRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_requests
            .iter()
            .rev()
            .filter(|request| status.is_none_or(|status| request.status == status))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn approve_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let (username, role) = {
            let request = tables.pending_request_mut(id)?;
            (request.username.clone(), request.requested_role)
        };

        // Both changes happen under the same write guard; a missing user changes nothing.
        let user = tables.user_mut(&username)?;
        user.role = role;
        user.updated_at = now;

        let request = tables.pending_request_mut(id)?;
        request.status = RoleRequestStatus::Approved;
        request.decided_by = Some(decided_by.to_string());
        request.decided_at = Some(now);
        request.updated_at = now;
        Ok(request.clone())
    }

    async fn reject_role_request(&self, id: i64, decided_by: &str) -> StoreResult<RoleRequest> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let request = tables.pending_request_mut(id)?;
        request.status = RoleRequestStatus::Rejected;
        request.decided_by = Some(decided_by.to_string());
        request.decided_at = Some(now);
        request.updated_at = now;
        Ok(request.clone())
    }
}

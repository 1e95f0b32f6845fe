use crate::{
    error::{AppError, AppResult},
    models::{
        Blog, BlogDraft, BlogReplacement, BlogUpdateResponse, BlogView, CommentView, Content,
        DeletedBlog, NewBlog, User,
    },
    policy::{self, BlogAction, BlogFacts, BlogScope, Viewer},
    repository::RepositoryState,
    services::{decode_title, require, store_error},
};

/// ContentService
///
/// Blog CRUD, listings, approval, restore and comments.
///
/// Unlike the identity workflows, every operation here re-reads the caller from the
/// identity store and decides with the *stored* role, so a promotion or demotion takes
/// effect before the session token expires.
#[derive(Clone)]
pub struct ContentService {
    repo: RepositoryState,
}

impl ContentService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// create_blog
    ///
    /// Writers and admins only. Posts by admins are approved on creation.
    pub async fn create_blog(&self, caller: &Viewer, draft: BlogDraft) -> AppResult<BlogView> {
        let author = self.resolve_caller(caller).await?;
        policy::authorize_blog_creation(author.role).into_result()?;

        require(&draft.title, "blog title must not be empty")?;
        require(&draft.blog_type, "blog type is required")?;
        require(&draft.body, "blog body must not be empty")?;
        require(&draft.status, "blog status is required")?;
        require(&draft.tags, "blog tags must not be empty")?;
        require(&draft.category, "blog category is required")?;

        if self.repo.body_exists(&draft.body).await? {
            return Err(AppError::Conflict(
                "blog with the same body already exists".to_string(),
            ));
        }

        let is_approved = policy::initial_approval(author.role);
        let blog = self
            .repo
            .insert_blog(NewBlog {
                content: Content {
                    title: draft.title,
                    body: draft.body,
                    blog_type: draft.blog_type,
                    status: draft.status,
                    is_approved,
                },
                tags: draft.tags,
                category: draft.category,
                author_id: author.id,
                username: author.username.clone(),
            })
            .await?;

        tracing::info!(blog_id = blog.id, author = %author.username, approved = is_approved, "blog created");
        Ok(BlogView::from(&blog))
    }

    /// update_blog
    ///
    /// Full replacement of title, body, type, status, tags and category of the first active
    /// blog with the given title. Omitted fields become empty strings. Approval and owner
    /// are kept.
    pub async fn update_blog(
        &self,
        caller: &Viewer,
        raw_title: &str,
        draft: BlogDraft,
    ) -> AppResult<BlogUpdateResponse> {
        let title = decode_title(raw_title)?;
        let blog = self
            .repo
            .blog_by_title(&title, false)
            .await?
            .ok_or_else(|| AppError::not_found("blog not found"))?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        policy::authorize_blog_action(&viewer, BlogAction::Update, &blog.username).into_result()?;

        // The blog's own current body counts as a collision.
        if self.repo.body_exists(&draft.body).await? {
            return Err(AppError::Conflict(
                "blog with the same body already exists".to_string(),
            ));
        }
        require(&draft.title, "blog title must not be empty")?;
        require(&draft.body, "blog body must not be empty")?;

        let updated = self
            .repo
            .replace_blog(
                blog.id,
                BlogReplacement {
                    title: draft.title,
                    body: draft.body,
                    blog_type: draft.blog_type,
                    status: draft.status,
                    tags: draft.tags,
                    category: draft.category,
                },
            )
            .await
            .map_err(|e| store_error(e, "blog not found", "blog not found"))?;

        tracing::info!(blog_id = updated.id, by = %viewer.username, "blog updated");
        Ok(BlogUpdateResponse::from(&updated))
    }

    /// delete_blog
    ///
    /// Soft delete. The blog loses its approval and its status becomes `deleted`.
    pub async fn delete_blog(&self, caller: &Viewer, raw_title: &str) -> AppResult<DeletedBlog> {
        let title = decode_title(raw_title)?;
        let blog = self
            .repo
            .blog_by_title(&title, true)
            .await?
            .ok_or_else(|| AppError::not_found("blog not found"))?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        policy::authorize_blog_action(&viewer, BlogAction::Delete, &blog.username).into_result()?;

        if blog.deletion.is_deleted() {
            return Err(AppError::AlreadyInState(
                "blog is already deleted".to_string(),
            ));
        }
        self.repo
            .soft_delete_blog(blog.id)
            .await
            .map_err(|e| store_error(e, "blog not found", "blog is already deleted"))?;

        tracing::info!(blog_id = blog.id, by = %viewer.username, "blog soft-deleted");
        Ok(DeletedBlog {
            title,
            blog_author: blog.username,
        })
    }

    /// approve_blog
    ///
    /// Admin-only. `approved = false` withdraws an approval. Deleted blogs cannot be
    /// (un)approved.
    pub async fn approve_blog(
        &self,
        caller: &Viewer,
        raw_title: &str,
        approved: bool,
    ) -> AppResult<BlogView> {
        let title = decode_title(raw_title)?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        let action = if approved {
            BlogAction::Approve
        } else {
            BlogAction::Unapprove
        };
        // Before the lookup: a hidden title must not answer differently from a missing one.
        policy::authorize_blog_action(&viewer, action, "").into_result()?;

        let blog = self
            .repo
            .blog_by_title(&title, false)
            .await?
            .ok_or_else(|| AppError::not_found("blog not found"))?;

        let blog = self
            .repo
            .set_blog_approval(blog.id, approved)
            .await
            .map_err(|e| store_error(e, "blog not found", "blog not found"))?;

        tracing::info!(blog_id = blog.id, approved, by = %viewer.username, "blog approval changed");
        Ok(BlogView::from(&blog))
    }

    /// restore_blog
    ///
    /// Admin-only. A restored blog comes back as an unapproved draft, not in its
    /// pre-delete state.
    pub async fn restore_blog(&self, caller: &Viewer, raw_title: &str) -> AppResult<()> {
        let title = decode_title(raw_title)?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        policy::authorize_blog_action(&viewer, BlogAction::Restore, "").into_result()?;

        let blog = self
            .repo
            .blog_by_title(&title, true)
            .await?
            .ok_or_else(|| AppError::not_found("blog not found"))?;

        self.repo
            .restore_blog(blog.id)
            .await
            .map_err(|e| store_error(e, "blog not found", "blog is not deleted"))?;

        tracing::info!(blog_id = blog.id, by = %viewer.username, "blog restored");
        Ok(())
    }

    /// list_blogs
    ///
    /// Site-wide listing. Non-admins get approved posts only; their include-deleted flag is
    /// ignored.
    pub async fn list_blogs(
        &self,
        caller: &Viewer,
        include_deleted: bool,
    ) -> AppResult<Vec<BlogView>> {
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        let scope = policy::listing_scope(&viewer, include_deleted);
        let blogs = self.repo.list_blogs(None, scope).await?;
        Ok(visible_views(&viewer, &blogs, scope))
    }

    /// list_blogs_by_author
    ///
    /// One author's posts. Include-deleted is reserved to the author and admins.
    pub async fn list_blogs_by_author(
        &self,
        caller: &Viewer,
        author: &str,
        include_deleted: bool,
    ) -> AppResult<Vec<BlogView>> {
        require(author, "username required")?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        if include_deleted {
            policy::authorize_include_deleted(&viewer, author).into_result()?;
        }

        let scope = policy::author_listing_scope(&viewer, author, include_deleted);
        let blogs = self.repo.list_blogs(Some(author), scope).await?;
        Ok(visible_views(&viewer, &blogs, scope))
    }

    /// get_blog_by_title
    ///
    /// A blog the caller may not see is reported exactly like a missing one.
    pub async fn get_blog_by_title(&self, caller: &Viewer, raw_title: &str) -> AppResult<BlogView> {
        let title = decode_title(raw_title)?;
        let viewer = Viewer::from(&self.resolve_caller(caller).await?);
        let blog = self.visible_blog(&viewer, &title).await?;
        Ok(BlogView::from(&blog))
    }

    /// add_comment
    ///
    /// Comments can be left on any blog the caller can see.
    pub async fn add_comment(
        &self,
        caller: &Viewer,
        raw_title: &str,
        text: &str,
    ) -> AppResult<CommentView> {
        let title = decode_title(raw_title)?;
        let commenter = self.resolve_caller(caller).await?;
        let viewer = Viewer::from(&commenter);
        let blog = self.visible_blog(&viewer, &title).await?;

        let text = text.trim();
        require(text, "comment text is required")?;

        let comment = self
            .repo
            .insert_comment(blog.id, commenter.id, text)
            .await
            .map_err(|e| store_error(e, "blog not found", "blog not found"))?;

        tracing::info!(blog_id = blog.id, comment_id = comment.id, by = %commenter.username, "comment added");
        Ok(CommentView::from(&comment))
    }

    /// Loads the caller's current record. The token only tells us who they claim to be.
    async fn resolve_caller(&self, caller: &Viewer) -> AppResult<User> {
        self.repo
            .user_by_username(&caller.username)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn visible_blog(&self, viewer: &Viewer, title: &str) -> AppResult<Blog> {
        let blog = self
            .repo
            .blog_by_title(title, false)
            .await?
            .ok_or_else(|| AppError::not_found("blog not found"))?;

        if !policy::can_view_blog(viewer, BlogFacts::from(&blog), false) {
            tracing::debug!(viewer = %viewer.username, blog_id = blog.id, "blog hidden from viewer");
            return Err(AppError::not_found("blog not found or not approved"));
        }
        Ok(blog)
    }
}

/// Re-applies the visibility rule to every listed entry.
fn visible_views(viewer: &Viewer, blogs: &[Blog], scope: BlogScope) -> Vec<BlogView> {
    let include_deleted = scope == BlogScope::AllIncludingDeleted;
    blogs
        .iter()
        .filter(|blog| policy::can_view_blog(viewer, BlogFacts::from(*blog), include_deleted))
        .map(BlogView::from)
        .collect()
}

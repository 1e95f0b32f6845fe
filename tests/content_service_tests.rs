use blog_backend::{
    AppConfig, ContentService, IdentityService, InMemoryRepository, PasswordService,
    RepositoryState, TokenService,
    error::AppError,
    models::{BlogDraft, NewUser, RegisterRequest, Role},
    policy::Viewer,
    repository::{ContentStore, IdentityStore},
    services::decode_title,
};
use std::sync::Arc;

// --- Test Context ---

struct TestContext {
    repo: Arc<InMemoryRepository>,
    identity: IdentityService,
    content: ContentService,
}

impl TestContext {
    fn new() -> Self {
        let config = AppConfig::default();
        let repo = Arc::new(InMemoryRepository::new());
        let shared: RepositoryState = repo.clone();
        let passwords = PasswordService::new(&config).unwrap();
        let tokens = TokenService::from_config(&config);

        Self {
            identity: IdentityService::new(shared.clone(), passwords, tokens),
            content: ContentService::new(shared),
            repo,
        }
    }

    async fn register(&self, username: &str, role: &str) -> Viewer {
        let profile = self
            .identity
            .register(RegisterRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "pw".to_string(),
                role: role.to_string(),
            })
            .await
            .unwrap();
        Viewer::new(profile.username, profile.role)
    }

    async fn seed_admin(&self, username: &str) -> Viewer {
        self.repo
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "unused".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        Viewer::new(username, Role::Admin)
    }

    /// bob (writer), carol (reader), root (admin).
    async fn cast(&self) -> (Viewer, Viewer, Viewer) {
        (
            self.register("bob", "writer").await,
            self.register("carol", "reader").await,
            self.seed_admin("root").await,
        )
    }
}

fn draft(title: &str, body: &str) -> BlogDraft {
    BlogDraft {
        title: title.to_string(),
        body: body.to_string(),
        blog_type: "article".to_string(),
        tags: "rust".to_string(),
        category: "tech".to_string(),
        status: "published".to_string(),
    }
}

// --- Creation ---

#[tokio::test]
async fn test_writer_blog_starts_unapproved_admin_blog_approved() {
    let ctx = TestContext::new();
    let (bob, _, admin) = ctx.cast().await;

    let by_writer = ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    assert!(!by_writer.is_approved);
    assert_eq!(by_writer.username, "bob");
    assert!(by_writer.comments.is_empty());

    let by_admin = ctx.content.create_blog(&admin, draft("News", "b2")).await.unwrap();
    assert!(by_admin.is_approved);
}

#[tokio::test]
async fn test_reader_cannot_create_blog() {
    let ctx = TestContext::new();
    let (_, carol, _) = ctx.cast().await;

    let result = ctx.content.create_blog(&carol, draft("Nope", "b1")).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_create_requires_all_fields_and_unique_body() {
    let ctx = TestContext::new();
    let (bob, _, _) = ctx.cast().await;

    let mut missing_category = draft("Hello", "b1");
    missing_category.category = String::new();
    assert!(matches!(
        ctx.content.create_blog(&bob, missing_category).await,
        Err(AppError::Validation(_))
    ));

    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    let duplicate = ctx.content.create_blog(&bob, draft("Other", "b1")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_session_role_is_rechecked_against_store() {
    let ctx = TestContext::new();
    let (bob, _, _) = ctx.cast().await;

    // A token claiming admin does not help a stored writer approve anything.
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    let forged = Viewer::new("bob", Role::Admin);
    assert!(matches!(
        ctx.content.approve_blog(&forged, "Hello", true).await,
        Err(AppError::Forbidden(_))
    ));
}

// --- Visibility ---

#[tokio::test]
async fn test_approval_flow_controls_visibility() {
    let ctx = TestContext::new();
    let (bob, carol, admin) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();

    // Hidden from carol everywhere until approved.
    assert!(matches!(
        ctx.content.get_blog_by_title(&carol, "Hello").await,
        Err(AppError::NotFound(msg)) if msg == "blog not found or not approved"
    ));
    assert!(ctx.content.list_blogs(&carol, false).await.unwrap().is_empty());
    assert!(
        ctx.content
            .list_blogs_by_author(&carol, "bob", false)
            .await
            .unwrap()
            .is_empty()
    );

    // The author and the admin see it.
    assert_eq!(ctx.content.list_blogs_by_author(&bob, "bob", false).await.unwrap().len(), 1);
    assert_eq!(ctx.content.list_blogs(&admin, false).await.unwrap().len(), 1);
    assert!(ctx.content.get_blog_by_title(&bob, "Hello").await.is_ok());

    let approved = ctx.content.approve_blog(&admin, "Hello", true).await.unwrap();
    assert!(approved.is_approved);
    assert!(ctx.content.get_blog_by_title(&carol, "Hello").await.is_ok());
    assert_eq!(ctx.content.list_blogs(&carol, false).await.unwrap().len(), 1);

    ctx.content.approve_blog(&admin, "Hello", false).await.unwrap();
    assert!(ctx.content.get_blog_by_title(&carol, "Hello").await.is_err());
}

#[tokio::test]
async fn test_only_admin_moderates_even_own_blog() {
    let ctx = TestContext::new();
    let (bob, _, _) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();

    let result = ctx.content.approve_blog(&bob, "Hello", true).await;
    assert!(matches!(result, Err(AppError::Forbidden(msg)) if msg == "only admin can approve"));
}

#[tokio::test]
async fn test_moderation_does_not_reveal_hidden_titles() {
    let ctx = TestContext::new();
    let (bob, carol, _) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Secret", "s1")).await.unwrap();
    ctx.content.create_blog(&bob, draft("Gone", "g1")).await.unwrap();
    ctx.content.delete_blog(&bob, "Gone").await.unwrap();

    for title in ["Secret", "Missing"] {
        let approve = ctx.content.approve_blog(&carol, title, true).await;
        assert!(matches!(approve, Err(AppError::Forbidden(_))), "approve {title}");
        let unapprove = ctx.content.approve_blog(&carol, title, false).await;
        assert!(matches!(unapprove, Err(AppError::Forbidden(_))), "unapprove {title}");
    }
    for title in ["Gone", "Missing"] {
        let restore = ctx.content.restore_blog(&carol, title).await;
        assert!(matches!(restore, Err(AppError::Forbidden(_))), "restore {title}");
    }
}

#[tokio::test]
async fn test_deleted_listing_is_author_or_admin_only() {
    let ctx = TestContext::new();
    let (bob, carol, admin) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    ctx.content.create_blog(&bob, draft("Second", "b2")).await.unwrap();
    ctx.content.delete_blog(&bob, "Hello").await.unwrap();

    assert!(matches!(
        ctx.content.list_blogs_by_author(&carol, "bob", true).await,
        Err(AppError::Forbidden(_))
    ));

    let own = ctx.content.list_blogs_by_author(&bob, "bob", true).await.unwrap();
    assert_eq!(own.len(), 2);
    let deleted = own.iter().find(|b| b.title == "Hello").unwrap();
    assert!(deleted.deleted_at.is_some());
    assert_eq!(deleted.status, "deleted");

    assert_eq!(ctx.content.list_blogs_by_author(&bob, "bob", false).await.unwrap().len(), 1);
    assert_eq!(ctx.content.list_blogs(&admin, true).await.unwrap().len(), 2);
    assert_eq!(ctx.content.list_blogs(&admin, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_site_listing_ignores_include_deleted_for_non_admin() {
    let ctx = TestContext::new();
    let (bob, carol, admin) = ctx.cast().await;
    ctx.content.create_blog(&admin, draft("News", "b1")).await.unwrap();
    ctx.content.create_blog(&bob, draft("Hello", "b2")).await.unwrap();
    ctx.content.delete_blog(&admin, "News").await.unwrap();

    assert!(ctx.content.list_blogs(&carol, true).await.unwrap().is_empty());
    // Bob's own unapproved draft is not part of the site-wide listing for him.
    assert!(ctx.content.list_blogs(&bob, true).await.unwrap().is_empty());
}

// --- Update ---

#[tokio::test]
async fn test_update_is_full_replacement_and_keeps_approval() {
    let ctx = TestContext::new();
    let (_, _, admin) = ctx.cast().await;
    ctx.content.create_blog(&admin, draft("News", "b1")).await.unwrap();

    let updated = ctx
        .content
        .update_blog(
            &admin,
            "News",
            BlogDraft {
                title: "News v2".to_string(),
                body: "b2".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "News v2");
    assert_eq!(updated.blog_type, "");
    assert_eq!(updated.tags, "");
    assert_eq!(updated.category, "");

    let stored = ctx.repo.blog_by_title("News v2", false).await.unwrap().unwrap();
    assert!(stored.content.is_approved);
    assert!(ctx.repo.blog_by_title("News", false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_rules() {
    let ctx = TestContext::new();
    let (bob, _, admin) = ctx.cast().await;
    let dave = ctx.register("dave", "writer").await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();

    assert!(matches!(
        ctx.content.update_blog(&dave, "Hello", draft("Hello", "b9")).await,
        Err(AppError::Forbidden(_))
    ));
    // Reusing the current body counts as a duplicate.
    assert!(matches!(
        ctx.content.update_blog(&bob, "Hello", draft("Hello", "b1")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        ctx.content.update_blog(&bob, "Missing", draft("x", "b9")).await,
        Err(AppError::NotFound(_))
    ));
    assert!(ctx.content.update_blog(&admin, "Hello", draft("Hello", "b9")).await.is_ok());
}

// --- Delete & Restore ---

#[tokio::test]
async fn test_delete_twice_reports_already_deleted() {
    let ctx = TestContext::new();
    let (bob, carol, _) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();

    assert!(matches!(
        ctx.content.delete_blog(&carol, "Hello").await,
        Err(AppError::Forbidden(_))
    ));

    let deleted = ctx.content.delete_blog(&bob, "Hello").await.unwrap();
    assert_eq!(deleted.title, "Hello");
    assert_eq!(deleted.blog_author, "bob");

    let again = ctx.content.delete_blog(&bob, "Hello").await;
    assert!(matches!(again, Err(AppError::AlreadyInState(msg)) if msg == "blog is already deleted"));
}

#[tokio::test]
async fn test_restore_brings_back_unapproved_draft() {
    let ctx = TestContext::new();
    let (bob, carol, admin) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    ctx.content.approve_blog(&admin, "Hello", true).await.unwrap();
    ctx.content.delete_blog(&bob, "Hello").await.unwrap();

    assert!(matches!(
        ctx.content.restore_blog(&bob, "Hello").await,
        Err(AppError::Forbidden(_))
    ));
    ctx.content.restore_blog(&admin, "Hello").await.unwrap();

    let restored = ctx.repo.blog_by_title("Hello", false).await.unwrap().unwrap();
    assert!(!restored.deletion.is_deleted());
    assert!(!restored.content.is_approved);
    assert_eq!(restored.content.status, "draft");
    assert!(ctx.content.get_blog_by_title(&carol, "Hello").await.is_err());

    let not_deleted = ctx.content.restore_blog(&admin, "Hello").await;
    assert!(matches!(not_deleted, Err(AppError::AlreadyInState(msg)) if msg == "blog is not deleted"));
}

#[tokio::test]
async fn test_deleted_blog_cannot_be_approved() {
    let ctx = TestContext::new();
    let (bob, _, admin) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();
    ctx.content.delete_blog(&bob, "Hello").await.unwrap();

    assert!(matches!(
        ctx.content.approve_blog(&admin, "Hello", true).await,
        Err(AppError::NotFound(_))
    ));
}

// --- Comments ---

#[tokio::test]
async fn test_comments_need_visibility_and_text() {
    let ctx = TestContext::new();
    let (bob, carol, admin) = ctx.cast().await;
    ctx.content.create_blog(&bob, draft("Hello", "b1")).await.unwrap();

    assert!(matches!(
        ctx.content.add_comment(&carol, "Hello", "nice").await,
        Err(AppError::NotFound(_))
    ));

    ctx.content.approve_blog(&admin, "Hello", true).await.unwrap();
    assert!(matches!(
        ctx.content.add_comment(&carol, "Hello", "   ").await,
        Err(AppError::Validation(_))
    ));

    let comment = ctx.content.add_comment(&carol, "Hello", " nice ").await.unwrap();
    assert_eq!(comment.content, "nice");

    let blog = ctx.content.get_blog_by_title(&carol, "Hello").await.unwrap();
    assert_eq!(blog.comments.len(), 1);
}

// --- Titles ---

#[tokio::test]
async fn test_titles_are_decoded_once() {
    let ctx = TestContext::new();
    let (_, carol, admin) = ctx.cast().await;
    ctx.content
        .create_blog(&admin, draft("Rust & Go: 100%", "b1"))
        .await
        .unwrap();

    let blog = ctx
        .content
        .get_blog_by_title(&carol, "Rust+%26+Go%3A+100%25")
        .await
        .unwrap();
    assert_eq!(blog.title, "Rust & Go: 100%");

    assert!(matches!(
        ctx.content.get_blog_by_title(&carol, "100%").await,
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_decode_title() {
    assert_eq!(decode_title("Hello%20World").unwrap(), "Hello World");
    assert_eq!(decode_title("Hello+World").unwrap(), "Hello World");
    assert_eq!(decode_title("caf%C3%A9").unwrap(), "café");
    assert!(decode_title("").is_err());
    assert!(decode_title("%zz").is_err());
    assert!(decode_title("%E").is_err());
    assert!(decode_title("%FF").is_err());
}

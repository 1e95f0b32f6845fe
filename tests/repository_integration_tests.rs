use blog_backend::{
    models::{BlogReplacement, Content, NewBlog, NewRoleRequest, NewUser, ProfileChanges, Role, RoleRequestStatus, User},
    policy::BlogScope,
    repository::{ContentStore, IdentityStore, PostgresRepository, RoleRequestStore, StoreError},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the pool of a real Postgres database. These tests are skipped when
/// `DATABASE_URL` is not set.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Usernames are unique per run so tests can share one database.
fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    let username = unique("user");
    repo.insert_user(NewUser {
        email: format!("{username}@test.example"),
        username,
        password_hash: "hash".to_string(),
        role,
    })
    .await
    .expect("Failed to create test user")
}

fn new_blog(author: &User, title: &str) -> NewBlog {
    NewBlog {
        content: Content {
            title: title.to_string(),
            body: unique("body"),
            blog_type: "article".to_string(),
            status: "published".to_string(),
            is_approved: false,
        },
        tags: "rust".to_string(),
        category: "tech".to_string(),
        author_id: author.id,
        username: author.username.clone(),
    }
}

// --- Tests ---

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Reader).await;

    let duplicate = repo
        .insert_user(NewUser {
            username: user.username.clone(),
            email: format!("other_{}", user.email),
            password_hash: "hash".to_string(),
            role: Role::Reader,
        })
        .await;
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
}

#[tokio::test]
async fn test_soft_delete_and_restore_user() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Writer).await;

    repo.soft_delete_user(&user.username).await.unwrap();
    assert_eq!(
        repo.soft_delete_user(&user.username).await,
        Err(StoreError::NoRowsAffected)
    );

    let stored = repo.user_by_username(&user.username).await.unwrap().unwrap();
    assert!(stored.deletion.is_deleted());

    repo.restore_user(&user.username).await.unwrap();
    assert_eq!(
        repo.restore_user(&user.username).await,
        Err(StoreError::NoRowsAffected)
    );
    assert_eq!(
        repo.restore_user("missing_user_zz").await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn test_rename_cascades_to_blogs() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Writer).await;
    let title = unique("title");
    repo.insert_blog(new_blog(&user, &title)).await.unwrap();

    let new_name = unique("renamed");
    repo.update_profile(
        user.id,
        &user.username,
        ProfileChanges {
            username: new_name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
        },
    )
    .await
    .unwrap();

    let blog = repo.blog_by_title(&title, false).await.unwrap().unwrap();
    assert_eq!(blog.username, new_name);
    assert!(
        repo.list_blogs(Some(&user.username), BlogScope::AllIncludingDeleted)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_blog_lifecycle_and_scopes() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Writer).await;
    let title = unique("title");
    let blog = repo.insert_blog(new_blog(&user, &title)).await.unwrap();
    let author = Some(user.username.as_str());

    assert!(repo.body_exists(&blog.content.body).await.unwrap());
    assert!(repo.list_blogs(author, BlogScope::ApprovedOnly).await.unwrap().is_empty());

    repo.set_blog_approval(blog.id, true).await.unwrap();
    assert_eq!(repo.list_blogs(author, BlogScope::ApprovedOnly).await.unwrap().len(), 1);

    let replaced = repo
        .replace_blog(
            blog.id,
            BlogReplacement {
                title: title.clone(),
                body: unique("body"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(replaced.content.is_approved);
    assert_eq!(replaced.tags, "");

    let comment = repo.insert_comment(blog.id, user.id, "nice").await.unwrap();
    let with_comment = repo.blog_by_title(&title, false).await.unwrap().unwrap();
    assert_eq!(with_comment.comments.len(), 1);
    assert_eq!(with_comment.comments[0].id, comment.id);

    repo.soft_delete_blog(blog.id).await.unwrap();
    assert_eq!(repo.soft_delete_blog(blog.id).await, Err(StoreError::NoRowsAffected));
    assert!(repo.blog_by_title(&title, false).await.unwrap().is_none());
    assert_eq!(repo.list_blogs(author, BlogScope::All).await.unwrap().len(), 0);
    assert_eq!(
        repo.list_blogs(author, BlogScope::AllIncludingDeleted).await.unwrap().len(),
        1
    );
    assert_eq!(repo.set_blog_approval(blog.id, true).await.unwrap_err(), StoreError::NotFound);

    repo.restore_blog(blog.id).await.unwrap();
    let restored = repo.blog_by_title(&title, false).await.unwrap().unwrap();
    assert!(!restored.content.is_approved);
    assert_eq!(restored.content.status, "draft");
}

#[tokio::test]
async fn test_role_request_approval_promotes_user() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Reader).await;

    let request = repo
        .insert_role_request(NewRoleRequest {
            username: user.username.clone(),
            requested_role: Role::Admin,
            reason: "test".to_string(),
        })
        .await
        .unwrap();
    let second = repo
        .insert_role_request(NewRoleRequest {
            username: user.username.clone(),
            requested_role: Role::Admin,
            reason: "again".to_string(),
        })
        .await;
    assert!(matches!(second, Err(StoreError::Conflict(_))));

    let approved = repo.approve_role_request(request.id, "root").await.unwrap();
    assert_eq!(approved.status, RoleRequestStatus::Approved);
    assert_eq!(approved.decided_by.as_deref(), Some("root"));

    let promoted = repo.user_by_username(&user.username).await.unwrap().unwrap();
    assert_eq!(promoted.role, Role::Admin);

    assert_eq!(
        repo.reject_role_request(request.id, "root").await.unwrap_err(),
        StoreError::NoRowsAffected
    );
}

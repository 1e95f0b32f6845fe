use blog_backend::{
    error::AppError,
    models::Role,
    policy::{
        self, BlogAction, BlogFacts, BlogScope, PolicyDecision, Viewer, author_listing_scope,
        authorize_blog_action, authorize_blog_creation, can_view_blog, listing_scope,
        registration_role,
    },
};

fn facts(owner: &str, is_approved: bool, is_deleted: bool) -> BlogFacts<'_> {
    BlogFacts {
        owner,
        is_approved,
        is_deleted,
    }
}

// --- Visibility ---

#[test]
fn test_unapproved_blog_is_visible_to_owner_and_admin_only() {
    let bob = Viewer::new("bob", Role::Writer);
    let carol = Viewer::new("carol", Role::Reader);
    let admin = Viewer::new("root", Role::Admin);
    let draft = facts("bob", false, false);

    assert!(can_view_blog(&bob, draft, false));
    assert!(can_view_blog(&admin, draft, false));
    assert!(!can_view_blog(&carol, draft, false));
}

#[test]
fn test_approved_blog_is_visible_to_everyone() {
    let carol = Viewer::new("carol", Role::Reader);
    assert!(can_view_blog(&carol, facts("bob", true, false), false));
}

#[test]
fn test_deleted_blog_needs_explicit_request_and_privilege() {
    let bob = Viewer::new("bob", Role::Writer);
    let carol = Viewer::new("carol", Role::Reader);
    let admin = Viewer::new("root", Role::Admin);
    // A deleted blog may still carry is_approved from older data; it must not leak.
    let deleted = facts("bob", true, true);

    assert!(!can_view_blog(&bob, deleted, false));
    assert!(!can_view_blog(&admin, deleted, false));
    assert!(can_view_blog(&bob, deleted, true));
    assert!(can_view_blog(&admin, deleted, true));
    assert!(!can_view_blog(&carol, deleted, true));
}

#[test]
fn test_site_listing_scope_ignores_non_admin_include_deleted() {
    let carol = Viewer::new("carol", Role::Reader);
    let admin = Viewer::new("root", Role::Admin);

    assert_eq!(listing_scope(&carol, true), BlogScope::ApprovedOnly);
    assert_eq!(listing_scope(&admin, false), BlogScope::All);
    assert_eq!(listing_scope(&admin, true), BlogScope::AllIncludingDeleted);
}

#[test]
fn test_author_listing_scope() {
    let bob = Viewer::new("bob", Role::Writer);
    let carol = Viewer::new("carol", Role::Reader);

    assert_eq!(author_listing_scope(&bob, "bob", false), BlogScope::All);
    assert_eq!(author_listing_scope(&carol, "bob", false), BlogScope::ApprovedOnly);
    assert_eq!(
        author_listing_scope(&bob, "bob", true),
        BlogScope::AllIncludingDeleted
    );

    assert!(policy::authorize_include_deleted(&bob, "bob").is_allowed());
    assert!(policy::authorize_include_deleted(&carol, "bob").is_denied());
}

#[test]
fn test_scope_admits() {
    assert!(BlogScope::ApprovedOnly.admits(true, false));
    assert!(!BlogScope::ApprovedOnly.admits(false, false));
    assert!(!BlogScope::All.admits(true, true));
    assert!(BlogScope::AllIncludingDeleted.admits(false, true));
}

// --- Mutations ---

#[test]
fn test_readers_cannot_create_blogs() {
    assert!(authorize_blog_creation(Role::Reader).is_denied());
    assert!(authorize_blog_creation(Role::Writer).is_allowed());
    assert!(authorize_blog_creation(Role::Admin).is_allowed());
    assert!(policy::initial_approval(Role::Admin));
    assert!(!policy::initial_approval(Role::Writer));
}

#[test]
fn test_update_and_delete_are_owner_or_admin() {
    let bob = Viewer::new("bob", Role::Writer);
    let dave = Viewer::new("dave", Role::Writer);
    let admin = Viewer::new("root", Role::Admin);

    assert!(authorize_blog_action(&bob, BlogAction::Update, "bob").is_allowed());
    assert!(authorize_blog_action(&admin, BlogAction::Delete, "bob").is_allowed());
    assert_eq!(
        authorize_blog_action(&dave, BlogAction::Delete, "bob"),
        PolicyDecision::Deny("you are not authorized to delete this blog".to_string())
    );
}

#[test]
fn test_moderation_is_admin_only_even_for_owner() {
    let bob = Viewer::new("bob", Role::Writer);
    let admin = Viewer::new("root", Role::Admin);

    for action in [BlogAction::Approve, BlogAction::Unapprove, BlogAction::Restore] {
        assert!(authorize_blog_action(&bob, action, "bob").is_denied());
        assert!(authorize_blog_action(&admin, action, "bob").is_allowed());
    }
}

#[test]
fn test_denied_decision_becomes_forbidden() {
    let err = authorize_blog_creation(Role::Reader)
        .into_result()
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(msg) if msg == "user is not authorized to create a blog"));
}

// --- Accounts ---

#[test]
fn test_user_target_self_or_admin() {
    let bob = Viewer::new("bob", Role::Writer);
    let admin = Viewer::new("root", Role::Admin);

    assert_eq!(policy::user_target(&bob, "bob").unwrap(), "bob");
    assert_eq!(policy::user_target(&admin, "bob").unwrap(), "bob");
    assert!(matches!(
        policy::user_target(&bob, "carol"),
        Err(AppError::Forbidden(_))
    ));
}

#[test]
fn test_search_include_deleted_is_admin_only() {
    assert!(!policy::effective_include_deleted(Role::Writer, true));
    assert!(policy::effective_include_deleted(Role::Admin, true));
    assert!(!policy::effective_include_deleted(Role::Admin, false));
}

#[test]
fn test_registration_role_mapping() {
    let admin = registration_role("  Admin ").unwrap();
    assert_eq!(admin.stored, Role::Reader);
    assert!(admin.request_admin);

    let writer = registration_role("writer").unwrap();
    assert_eq!(writer.stored, Role::Writer);
    assert!(!writer.request_admin);

    assert!(matches!(registration_role(""), Err(AppError::Validation(_))));
    assert!(matches!(
        registration_role("moderator"),
        Err(AppError::Validation(_))
    ));
}

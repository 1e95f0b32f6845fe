//! Authorization and visibility policy.
//!
//! Every decision about who may see or change a blog post or a user account is made
//! here, from plain values: the caller's username and role, the resource owner, and the
//! resource's approval and deletion state. Nothing in this module performs I/O, so the
//! services can evaluate the same rule for a single lookup, for each entry of a listing,
//! and in tests without a store.

use crate::{
    error::{AppError, AppResult},
    models::{Blog, Role, User},
};

// --- Inputs ---

/// The caller a decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub username: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn owns(&self, owner: &str) -> bool {
        self.username == owner
    }
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self::new(user.username.clone(), user.role)
    }
}

/// The state of a blog post that visibility depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlogFacts<'a> {
    pub owner: &'a str,
    pub is_approved: bool,
    pub is_deleted: bool,
}

impl<'a> From<&'a Blog> for BlogFacts<'a> {
    fn from(blog: &'a Blog) -> Self {
        Self {
            owner: &blog.username,
            is_approved: blog.content.is_approved,
            is_deleted: blog.deletion.is_deleted(),
        }
    }
}

// --- Decisions ---

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action is allowed.
    Allow,
    /// The action is denied, with a reason.
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Converts a denial into `AppError::Forbidden`.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => {
                tracing::warn!(reason = %reason, "policy denied request");
                Err(AppError::Forbidden(reason))
            }
        }
    }
}

/// Which subset of blog records a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogScope {
    /// Approved and not deleted.
    ApprovedOnly,
    /// Every non-deleted record.
    All,
    /// Every record, soft-deleted ones included.
    AllIncludingDeleted,
}

impl BlogScope {
    /// Whether a record with the given state belongs to this scope.
    pub fn admits(&self, is_approved: bool, is_deleted: bool) -> bool {
        match self {
            Self::ApprovedOnly => is_approved && !is_deleted,
            Self::All => !is_deleted,
            Self::AllIncludingDeleted => true,
        }
    }
}

/// Mutations on a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogAction {
    Update,
    Delete,
    Approve,
    Unapprove,
    Restore,
}

impl BlogAction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Unapprove => "unapprove",
            Self::Restore => "restore",
        }
    }

    fn is_admin_only(&self) -> bool {
        matches!(self, Self::Approve | Self::Unapprove | Self::Restore)
    }
}

// --- Blog visibility ---

/// Whether `viewer` may see a single blog post.
///
/// Deleted posts are visible only on an explicit include-deleted request, and then only
/// to the owner or an admin. Otherwise owners and admins see everything and everyone else
/// sees approved posts only.
pub fn can_view_blog(viewer: &Viewer, blog: BlogFacts<'_>, include_deleted: bool) -> bool {
    let privileged = viewer.owns(blog.owner) || viewer.is_admin();
    if blog.is_deleted {
        return include_deleted && privileged;
    }
    privileged || blog.is_approved
}

/// Scope of the site-wide listing.
///
/// Admins see every post (deleted ones on request); everyone else sees approved posts.
/// A non-admin include-deleted request is dropped rather than rejected.
pub fn listing_scope(viewer: &Viewer, include_deleted: bool) -> BlogScope {
    match (viewer.is_admin(), include_deleted) {
        (true, true) => BlogScope::AllIncludingDeleted,
        (true, false) => BlogScope::All,
        (false, _) => BlogScope::ApprovedOnly,
    }
}

/// Gate for include-deleted listings of one author's posts: the author or an admin.
pub fn authorize_include_deleted(viewer: &Viewer, author: &str) -> PolicyDecision {
    if viewer.owns(author) || viewer.is_admin() {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny("not authorized to view deleted blogs of this user".to_string())
    }
}

/// Scope of an author-scoped listing. Callers must have passed
/// [`authorize_include_deleted`] when `include_deleted` is set.
pub fn author_listing_scope(viewer: &Viewer, author: &str, include_deleted: bool) -> BlogScope {
    if include_deleted {
        return BlogScope::AllIncludingDeleted;
    }
    if viewer.owns(author) || viewer.is_admin() {
        BlogScope::All
    } else {
        BlogScope::ApprovedOnly
    }
}

// --- Blog mutations ---

/// Only writers and admins may publish.
pub fn authorize_blog_creation(role: Role) -> PolicyDecision {
    match role {
        Role::Writer | Role::Admin => PolicyDecision::Allow,
        Role::Reader => PolicyDecision::Deny("user is not authorized to create a blog".to_string()),
    }
}

/// Update and delete are owner-or-admin. Approve, unapprove and restore are admin-only,
/// ownership notwithstanding.
pub fn authorize_blog_action(viewer: &Viewer, action: BlogAction, owner: &str) -> PolicyDecision {
    if viewer.is_admin() {
        return PolicyDecision::Allow;
    }
    if action.is_admin_only() {
        return PolicyDecision::Deny(format!("only admin can {}", action.verb()));
    }
    if viewer.owns(owner) {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny(format!(
            "you are not authorized to {} this blog",
            action.verb()
        ))
    }
}

/// New posts by admins are approved on creation; all others wait for an admin.
pub fn initial_approval(author_role: Role) -> bool {
    author_role.is_admin()
}

// --- User accounts ---

/// Admin-only gate for account and role-request administration.
pub fn authorize_admin(role: Role, action: &str) -> PolicyDecision {
    if role.is_admin() {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny(format!("only admin can {action}"))
    }
}

/// Resolves which account a self-service request acts on.
///
/// Admins act on the requested account. Anyone else may only name their own account.
pub fn user_target<'a>(caller: &'a Viewer, requested: &'a str) -> AppResult<&'a str> {
    if caller.is_admin() {
        return Ok(requested);
    }
    if caller.owns(requested) {
        Ok(caller.username.as_str())
    } else {
        tracing::warn!(caller = %caller.username, target = %requested, "cross-account request denied");
        Err(AppError::forbidden("not allowed"))
    }
}

/// Soft-deleted accounts appear in search results only for admins.
pub fn effective_include_deleted(viewer_role: Role, requested: bool) -> bool {
    requested && viewer_role.is_admin()
}

/// Outcome of mapping a requested registration role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    /// The role written to the user record.
    pub stored: Role,
    /// Whether a pending admin role request must be filed.
    pub request_admin: bool,
}

/// Maps the free-text role of a registration to the stored role.
///
/// `admin` is never granted directly: the account is stored as `reader` and an admin
/// role request is filed for review.
pub fn registration_role(raw: &str) -> AppResult<RoleAssignment> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::validation(
            "please choose a role: reader, writer, admin",
        ));
    }
    match Role::parse(&normalized) {
        Some(Role::Admin) => Ok(RoleAssignment {
            stored: Role::Reader,
            request_admin: true,
        }),
        Some(role) => Ok(RoleAssignment {
            stored: role,
            request_admin: false,
        }),
        None => Err(AppError::Validation(format!(
            "unknown role '{normalized}': expected reader, writer or admin"
        ))),
    }
}

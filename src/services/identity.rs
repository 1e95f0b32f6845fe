use crate::{
    auth::TokenService,
    error::{AppError, AppResult},
    models::{
        AdminRoleRequestPayload, LoginRequest, NewRoleRequest, NewUser, Profile, ProfileChanges,
        RegisterRequest, RegisteredProfile, Role, RoleRequestStatus, RoleRequestView, Session,
        UpdateProfileRequest, UpdatedProfile, User,
    },
    password::PasswordService,
    policy::{self, Viewer},
    repository::RepositoryState,
    services::{require, store_error},
};

/// Search results when the caller does not ask for a positive limit.
const DEFAULT_SEARCH_LIMIT: i64 = 10;
/// Role-request listing size when the caller does not ask for a positive limit.
const DEFAULT_ROLE_REQUEST_LIMIT: i64 = 100;

/// IdentityService
///
/// Registration, login, profile management and the admin role-request workflow. The
/// caller's role comes from the verified session claims.
#[derive(Clone)]
pub struct IdentityService {
    repo: RepositoryState,
    passwords: PasswordService,
    tokens: TokenService,
}

impl IdentityService {
    pub fn new(repo: RepositoryState, passwords: PasswordService, tokens: TokenService) -> Self {
        Self {
            repo,
            passwords,
            tokens,
        }
    }

    /// register
    ///
    /// Creates an account. A requested `admin` role is stored as `reader` and turned into a
    /// pending role request, whose id is reported back.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<RegisteredProfile> {
        require(&req.username, "username is required")?;
        require(&req.email, "email is required")?;
        require(&req.password, "password is required")?;
        let assignment = policy::registration_role(&req.role)?;

        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        if self.repo.email_taken(&email, None).await?
            || self.repo.username_taken(&username, None).await?
        {
            return Err(AppError::Conflict(
                "email or username already exists".to_string(),
            ));
        }

        let password_hash = self.passwords.hash(&req.password)?;
        let user = self
            .repo
            .insert_user(NewUser {
                username,
                email,
                password_hash,
                role: assignment.stored,
            })
            .await?;

        let pending_role_request_id = if assignment.request_admin {
            let request = self
                .repo
                .insert_role_request(NewRoleRequest {
                    username: user.username.clone(),
                    requested_role: Role::Admin,
                    reason: "requested at registration".to_string(),
                })
                .await?;
            tracing::info!(username = %user.username, request_id = request.id, "admin role requested at registration");
            Some(request.id)
        } else {
            None
        };

        tracing::info!(username = %user.username, role = %user.role, "user registered");
        Ok(RegisteredProfile {
            username: user.username,
            email: user.email,
            role: user.role,
            pending_role_request_id,
        })
    }

    /// login
    ///
    /// `identifier` is a username or an email. Soft-deleted accounts cannot log in even
    /// with the right password.
    pub async fn login(&self, req: LoginRequest) -> AppResult<Session> {
        let user = self
            .repo
            .user_by_identifier(req.identifier.trim())
            .await?
            .ok_or_else(|| AppError::Unauthenticated("user not found".to_string()))?;

        if user.deletion.is_deleted() {
            return Err(AppError::Unauthenticated("user is deleted".to_string()));
        }
        if !self.passwords.verify(&req.password, &user.password_hash) {
            tracing::warn!(username = %user.username, "login with invalid password");
            return Err(AppError::Unauthenticated("invalid password".to_string()));
        }

        let token = self.tokens.issue(&user)?;
        tracing::info!(username = %user.username, "user logged in");
        Ok(Session {
            token,
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }

    /// get_profile
    ///
    /// Only the target's state is checked; a caller whose own account was deleted after
    /// login can still read profiles until the token expires.
    pub async fn get_profile(&self, caller: &Viewer, target: &str) -> AppResult<Profile> {
        require(target, "username required")?;
        let user = self.active_user(target).await?;
        tracing::debug!(caller = %caller.username, target = %target, "profile read");
        Ok(Profile::from(&user))
    }

    pub async fn get_me(&self, caller: &Viewer) -> AppResult<Profile> {
        self.get_profile(caller, &caller.username).await
    }

    /// search_profiles
    ///
    /// Case-insensitive username prefix search. Soft-deleted accounts are included only for
    /// admins who ask for them.
    pub async fn search_profiles(
        &self,
        viewer: &Viewer,
        query: &str,
        limit: i64,
        include_deleted: bool,
    ) -> AppResult<Vec<Profile>> {
        let prefix = query.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit <= 0 { DEFAULT_SEARCH_LIMIT } else { limit };
        let include_deleted = policy::effective_include_deleted(viewer.role, include_deleted);

        let users = self
            .repo
            .search_users(prefix, include_deleted, limit)
            .await?;
        Ok(users.iter().map(Profile::from).collect())
    }

    /// update_profile
    ///
    /// Partial update: blank fields keep their current value, a new password is re-hashed.
    /// Renaming re-owns the user's blogs in the same store transaction.
    pub async fn update_profile(
        &self,
        caller: &Viewer,
        target: &str,
        req: UpdateProfileRequest,
    ) -> AppResult<UpdatedProfile> {
        require(target, "username required")?;
        let target = policy::user_target(caller, target)?;

        let user = self
            .repo
            .user_by_username(target)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;
        if user.deletion.is_deleted() {
            return Err(AppError::AlreadyInState("user is deleted".to_string()));
        }

        let username = non_blank_or(&req.username, &user.username);
        let email = non_blank_or(&req.email, &user.email);

        if username != user.username && self.repo.username_taken(&username, Some(user.id)).await?
        {
            return Err(AppError::Conflict("username already exists".to_string()));
        }
        if email != user.email && self.repo.email_taken(&email, Some(user.id)).await? {
            return Err(AppError::Conflict("email already exists".to_string()));
        }

        let password_hash = if req.password.is_empty() {
            user.password_hash.clone()
        } else {
            self.passwords.hash(&req.password)?
        };

        let updated = self
            .repo
            .update_profile(
                user.id,
                &user.username,
                ProfileChanges {
                    username,
                    email,
                    password_hash,
                },
            )
            .await
            .map_err(|e| store_error(e, "user not found", "user is deleted"))?;

        if updated.username != user.username {
            tracing::info!(old = %user.username, new = %updated.username, "user renamed");
        }
        tracing::info!(username = %updated.username, by = %caller.username, "profile updated");
        Ok(UpdatedProfile::from(&updated))
    }

    pub async fn update_me(
        &self,
        caller: &Viewer,
        req: UpdateProfileRequest,
    ) -> AppResult<UpdatedProfile> {
        self.update_profile(caller, &caller.username, req).await
    }

    /// delete_profile
    ///
    /// Soft delete. Not idempotent: deleting a deleted account fails.
    pub async fn delete_profile(&self, caller: &Viewer, target: &str) -> AppResult<()> {
        require(target, "username required")?;
        let target = policy::user_target(caller, target)?;

        self.repo
            .soft_delete_user(target)
            .await
            .map_err(|e| store_error(e, "user not found", "user is already deleted"))?;

        tracing::info!(username = %target, by = %caller.username, "user soft-deleted");
        Ok(())
    }

    pub async fn delete_me(&self, caller: &Viewer) -> AppResult<()> {
        self.delete_profile(caller, &caller.username).await
    }

    /// restore_profile
    ///
    /// Admin-only. Restoring an account that was never deleted fails.
    pub async fn restore_profile(&self, caller: &Viewer, target: &str) -> AppResult<()> {
        policy::authorize_admin(caller.role, "restore users").into_result()?;
        require(target, "username required")?;

        self.repo
            .restore_user(target)
            .await
            .map_err(|e| store_error(e, "user not found", "user is not deleted"))?;

        tracing::info!(username = %target, by = %caller.username, "user restored");
        Ok(())
    }

    /// request_admin_role
    ///
    /// Files a pending admin role request for the caller. One open request per user.
    pub async fn request_admin_role(
        &self,
        caller: &Viewer,
        payload: AdminRoleRequestPayload,
    ) -> AppResult<RoleRequestView> {
        let user = self.active_user(&caller.username).await?;
        if user.role.is_admin() {
            return Err(AppError::AlreadyInState("user is already admin".to_string()));
        }

        if let Some(latest) = self.repo.latest_role_request(&user.username).await? {
            if latest.status == RoleRequestStatus::Pending {
                return Err(AppError::Conflict(
                    "a pending role request already exists".to_string(),
                ));
            }
        }

        let request = self
            .repo
            .insert_role_request(NewRoleRequest {
                username: user.username.clone(),
                requested_role: Role::Admin,
                reason: payload.reason.trim().to_string(),
            })
            .await?;

        tracing::info!(username = %user.username, request_id = request.id, "admin role requested");
        Ok(RoleRequestView::from(&request))
    }

    /// list_role_requests
    ///
    /// Admin-only. `status` is optional; an unknown value is a validation error.
    pub async fn list_role_requests(
        &self,
        caller: &Viewer,
        status: Option<&str>,
        limit: i64,
    ) -> AppResult<Vec<RoleRequestView>> {
        policy::authorize_admin(caller.role, "list role requests").into_result()?;

        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => Some(RoleRequestStatus::parse(&raw.to_lowercase()).ok_or_else(|| {
                AppError::Validation(format!(
                    "invalid status '{raw}': expected pending, approved or rejected"
                ))
            })?),
        };
        let limit = if limit <= 0 { DEFAULT_ROLE_REQUEST_LIMIT } else { limit };

        let requests = self.repo.list_role_requests(status, limit).await?;
        Ok(requests.iter().map(RoleRequestView::from).collect())
    }

    /// approve_role_request
    ///
    /// Admin-only. Marks the request approved and promotes its user atomically.
    pub async fn approve_role_request(
        &self,
        caller: &Viewer,
        id: i64,
    ) -> AppResult<RoleRequestView> {
        policy::authorize_admin(caller.role, "approve role requests").into_result()?;
        validate_request_id(id)?;

        let request = self
            .repo
            .approve_role_request(id, &caller.username)
            .await
            .map_err(|e| store_error(e, "role request not found", "role request already decided"))?;

        tracing::info!(request_id = id, username = %request.username, by = %caller.username, "role request approved");
        Ok(RoleRequestView::from(&request))
    }

    pub async fn reject_role_request(
        &self,
        caller: &Viewer,
        id: i64,
    ) -> AppResult<RoleRequestView> {
        policy::authorize_admin(caller.role, "reject role requests").into_result()?;
        validate_request_id(id)?;

        let request = self
            .repo
            .reject_role_request(id, &caller.username)
            .await
            .map_err(|e| store_error(e, "role request not found", "role request already decided"))?;

        tracing::info!(request_id = id, username = %request.username, by = %caller.username, "role request rejected");
        Ok(RoleRequestView::from(&request))
    }

    /// Loads a user that must exist and not be soft-deleted.
    async fn active_user(&self, username: &str) -> AppResult<User> {
        let user = self
            .repo
            .user_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;
        if user.deletion.is_deleted() {
            return Err(AppError::not_found("user is deleted"));
        }
        Ok(user)
    }
}

fn non_blank_or(candidate: &str, current: &str) -> String {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        current.to_string()
    } else {
        trimmed.to_string()
    }
}

fn validate_request_id(id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::validation("invalid id"));
    }
    Ok(())
}

//! 会话服务：登录、注册、令牌校验与刷新、角色授权

use crate::{
    auth::{
        jwt::{JwtService, TokenPair},
        middleware::AuthContext,
        password::PasswordHasher,
    },
    error::AppError,
    models::{normalize_email, LoginRequest, NewUser, Principal, RegisterRequest, Role, User, UserResponse},
    repository::UserRepository,
};
use std::sync::Arc;
use uuid::Uuid;

/// 登录结果：令牌对 + 用户摘要
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: UserResponse,
}

/// 刷新结果：新的访问令牌 + 当前会话
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub context: AuthContext,
}

/// 角色授权（纯函数，无 I/O）
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AppError> {
    if principal.has_role(allowed) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %principal.id,
        role = %principal.role,
        "Role not allowed"
    );
    Err(AppError::Forbidden)
}

pub struct SessionService {
    users: Arc<dyn UserRepository>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt_service: Arc<JwtService>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            jwt_service,
            hasher,
        }
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// 校验访问令牌并解析当前账户
    pub async fn authenticate(&self, access_token: Option<&str>) -> Result<AuthContext, AppError> {
        let token = access_token.ok_or(AppError::Unauthorized)?;
        let claims = self.jwt_service.validate_access_token(token)?;
        let user = self.resolve_account(claims.user_id()?).await?;

        Ok(AuthContext::from(user))
    }

    /// 用刷新令牌签发新的访问令牌
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshOutcome, AppError> {
        let token = refresh_token.ok_or(AppError::Unauthorized)?;
        let claims = self.jwt_service.validate_refresh_token(token)?;
        let user = self.resolve_account(claims.user_id()?).await?;

        let access_token = self.jwt_service.generate_access_token(&user.id)?;

        tracing::info!(user_id = %user.id, "Access token refreshed");

        Ok(RefreshOutcome {
            access_token,
            context: AuthContext::from(user),
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, AppError> {
        let email = normalize_email(&req.email);

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("User not found!"))?;

        self.verify_password(req.password, user.password_hash.clone())
            .await
            .inspect_err(|_| tracing::info!(user_id = %user.id, "Login rejected: wrong password"))?;

        let tokens = self.jwt_service.generate_token_pair(&user.id)?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginOutcome {
            tokens,
            user: UserResponse::from(user),
        })
    }

    /// 注册新用户（默认角色为 user）
    pub async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError> {
        let email = normalize_email(&req.email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("Email already exists!"));
        }

        let password_hash = self.hash_password(req.password).await?;

        let user = self
            .users
            .create(NewUser {
                name: req.name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(UserResponse::from(user))
    }

    /// 校验当前密码后更换密码
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: String,
        new_password: String,
    ) -> Result<(), AppError> {
        let user = self.resolve_account(user_id).await?;

        self.verify_password(old_password, user.password_hash).await?;
        let new_hash = self.hash_password(new_password).await?;

        if !self.users.update_password(user_id, &new_hash).await? {
            return Err(AppError::not_found("User not found!"));
        }

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// 确保存在指定的管理员账户（启动引导）
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: String,
    ) -> Result<UserResponse, AppError> {
        let email = normalize_email(email);

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.role == Role::Admin {
                return Ok(UserResponse::from(existing));
            }

            let promoted = self
                .users
                .update_role(existing.id, Role::Admin)
                .await?
                .ok_or_else(|| AppError::not_found("User not found!"))?;
            tracing::info!(user_id = %promoted.id, "Existing account promoted to admin");
            return Ok(UserResponse::from(promoted));
        }

        let password_hash = self.hash_password(password).await?;
        let admin = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = %admin.id, "Bootstrap admin created");
        Ok(UserResponse::from(admin))
    }

    /// 令牌引用的账户必须仍然存在
    async fn resolve_account(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users.find_by_id(&user_id).await?.ok_or_else(|| {
            tracing::debug!(user_id = %user_id, "Token references a missing account");
            AppError::Unauthorized
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<(), AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }
}

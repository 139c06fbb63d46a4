//! 会话认证中间件

use crate::{
    auth::cookies::{clear_session, get_cookie, ACCESS_COOKIE_NAME},
    error::AppError,
    middleware::AppState,
    models::{Principal, User, UserResponse},
    services::authorize,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub user: UserResponse,
}

impl AuthContext {
    /// 要求当前主体具备给定角色之一
    pub fn require_role(&self, allowed: &[crate::models::Role]) -> Result<(), AppError> {
        authorize(&self.principal, allowed)
    }
}

impl From<User> for AuthContext {
    fn from(user: User) -> Self {
        Self {
            principal: Principal {
                id: user.id,
                role: user.role,
            },
            user: UserResponse::from(user),
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取令牌（非浏览器客户端的备用方式）
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 访问令牌：优先 Cookie，其次 Bearer 头
pub fn extract_access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    get_cookie(jar, ACCESS_COOKIE_NAME).or_else(|| extract_bearer(headers))
}

/// 会话认证中间件 - 必须认证
///
/// 令牌存在但校验失败（签名、过期、账户已删除）时，同时清除两个会话 Cookie。
pub async fn session_auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_access_token(&jar, req.headers());
    let presented = token.is_some();

    match state.session_service.authenticate(token.as_deref()).await {
        Ok(auth_context) => {
            tracing::debug!(
                user_id = %auth_context.principal.id,
                role = %auth_context.principal.role,
                "Request authenticated"
            );
            req.extensions_mut().insert(auth_context);
            next.run(req).await
        }
        Err(err) if presented => (clear_session(jar), err).into_response(),
        Err(err) => err.into_response(),
    }
}

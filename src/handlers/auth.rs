//! 认证相关的 HTTP 处理器
//! 会话令牌只通过 HttpOnly Cookie 下发，响应体中不含令牌

use crate::{
    auth::{
        clear_session,
        cookies::{get_cookie, REFRESH_COOKIE_NAME},
        extract_access_token, AuthContext,
    },
    error::AppError,
    middleware::AppState,
    models::{LoginRequest, MessageResponse, RegisterRequest, UserEnvelope},
    validation::ValidatedJson,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// 当前用户
pub async fn me(auth_context: AuthContext) -> Json<UserEnvelope> {
    Json(UserEnvelope::new(auth_context.user))
}

/// 注册（默认 user 角色）
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.session_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope::with_message("Register success.", user)),
    ))
}

/// 登录，下发访问令牌与刷新令牌 Cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.session_service.login(req).await?;

    let jar = state.cookie_policy.with_session(
        jar,
        outcome.tokens.access_token,
        outcome.tokens.refresh_token,
    );

    Ok((jar, Json(UserEnvelope::with_message("Login success.", outcome.user))))
}

/// 登出
///
/// 无访问令牌时直接成功；令牌存在但无效时返回 401，两种情况都会清除 Cookie。
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = extract_access_token(&jar, &headers) {
        match state.session_service.authenticate(Some(&token)).await {
            Ok(auth_context) => {
                tracing::info!(user_id = %auth_context.principal.id, "User logged out");
            }
            Err(err) => return (clear_session(jar), err).into_response(),
        }
    }

    (clear_session(jar), Json(MessageResponse::new("Logout success."))).into_response()
}

/// 刷新访问令牌
///
/// 刷新失败时清除两个 Cookie，强制重新登录。
pub async fn refresh_token(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let token = get_cookie(&jar, REFRESH_COOKIE_NAME);

    match state.session_service.refresh(token.as_deref()).await {
        Ok(outcome) => {
            let jar = state.cookie_policy.with_access(jar, outcome.access_token);
            (
                jar,
                Json(UserEnvelope::with_message("Token refreshed.", outcome.context.user)),
            )
                .into_response()
        }
        Err(err) => (clear_session(jar), err).into_response(),
    }
}

//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{ChangePasswordRequest, ListUsersQuery, MessageResponse, Role, UpdateRoleRequest, UserEnvelope},
    validation::ValidatedJson,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require_role(ADMIN_ONLY)?;

    let listing = state.user_service.list(&query).await?;
    Ok(Json(listing))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require_role(ADMIN_ONLY)?;

    let user = state.user_service.get(id).await?;
    Ok(Json(UserEnvelope::new(user)))
}

/// 修改用户角色
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require_role(ADMIN_ONLY)?;

    let user = state
        .user_service
        .update_role(auth_context.principal.id, id, req.role)
        .await?;

    Ok(Json(UserEnvelope::with_message("Role updated.", user)))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require_role(ADMIN_ONLY)?;

    state
        .user_service
        .delete(auth_context.principal.id, id)
        .await?;

    Ok(Json(MessageResponse::new("User deleted.")))
}

/// 修改自己的密码（任意角色）
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .session_service
        .change_password(auth_context.principal.id, req.old_password, req.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password changed.")))
}

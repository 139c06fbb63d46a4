//! 用户管理服务（会话服务的下游消费者）

use crate::{
    error::AppError,
    models::{ListUsersQuery, Role, UserListResponse, UserResponse},
    repository::UserRepository,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// 分页列出用户
    pub async fn list(&self, query: &ListUsersQuery) -> Result<UserListResponse, AppError> {
        let (limit, offset) = query.normalized();
        let users: Vec<UserResponse> = self
            .users
            .list(limit, offset)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

        Ok(UserListResponse {
            count: users.len(),
            users,
        })
    }

    /// 获取用户详情
    pub async fn get(&self, id: Uuid) -> Result<UserResponse, AppError> {
        self.users
            .find_by_id(&id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::not_found("User not found!"))
    }

    /// 修改角色，生效于该用户下一次令牌校验
    pub async fn update_role(
        &self,
        actor: Uuid,
        id: Uuid,
        role: Role,
    ) -> Result<UserResponse, AppError> {
        if actor == id {
            return Err(AppError::BadRequest("You cannot change your own role.".to_string()));
        }

        let user = self
            .users
            .update_role(id, role)
            .await?
            .ok_or_else(|| AppError::not_found("User not found!"))?;

        tracing::info!(actor = %actor, user_id = %id, role = %role, "User role updated");
        Ok(UserResponse::from(user))
    }

    /// 删除用户；其令牌在下一次使用时失效
    pub async fn delete(&self, actor: Uuid, id: Uuid) -> Result<(), AppError> {
        // 不允许删除自己
        if actor == id {
            return Err(AppError::BadRequest("You cannot delete your own account.".to_string()));
        }

        if !self.users.delete(id).await? {
            return Err(AppError::not_found("User not found!"));
        }

        tracing::info!(actor = %actor, user_id = %id, "User deleted");
        Ok(())
    }
}

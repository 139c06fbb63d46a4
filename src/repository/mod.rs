//! Database repository layer

pub mod memory;
pub mod user_repo;

pub use memory::MemoryUserRepository;
pub use user_repo::PgUserRepository;

use crate::{
    error::AppError,
    models::{NewUser, Role, User},
};
use async_trait::async_trait;
use uuid::Uuid;

/// 账户存储（系统的唯一持久化状态）
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError>;

    /// 根据邮箱查找用户（邮箱已规范化）
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// 创建用户，邮箱重复时返回 Conflict
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// 列出用户（按创建时间倒序）
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError>;

    /// 更新角色
    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError>;

    /// 更新密码
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;

    /// 删除用户
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// 存储健康检查
    async fn ping(&self) -> Result<(), AppError>;
}

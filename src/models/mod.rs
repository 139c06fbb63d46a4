//! 数据模型模块

pub mod auth;
pub mod role;
pub mod user;

pub use auth::*;
pub use role::Role;
pub use user::*;

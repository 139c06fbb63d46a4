//! 图书馆管理后端
//! 基于 Cookie 的访问令牌/刷新令牌会话、用户管理 API 与客户端会话守卫

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod validation;

//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{
    auth::session_auth_middleware,
    config::ServerConfig,
    handlers,
    middleware::{
        error_detail_middleware, login_rate_limit_middleware, request_tracking_middleware,
        AppState,
    },
};

/// 请求体上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（登录应用速率限制）
    let auth_routes = Router::new()
        .route(
            "/auth/login",
            post(handlers::auth::login).layer(from_fn_with_state(
                state.clone(),
                login_rate_limit_middleware,
            )),
        )
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/refresh-token", post(handlers::auth::refresh_token));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/users", get(handlers::user::list_users))
        .route("/users/me/password", put(handlers::user::change_password))
        .route(
            "/users/{id}",
            get(handlers::user::get_user).delete(handlers::user::delete_user),
        )
        .route("/users/{id}/role", patch(handlers::user::update_role))
        .layer(from_fn_with_state(state.clone(), session_auth_middleware));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(from_fn_with_state(state.clone(), error_detail_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.server))
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// 带凭据的 CORS，仅允许配置中的来源
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

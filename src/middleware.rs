//! HTTP 中间件
//! 应用状态、请求追踪、登录限流

use crate::{
    auth::{CookiePolicy, JwtService, PasswordHasher},
    config::AppConfig,
    error::{AppError, ErrorDetail},
    repository::UserRepository,
    services::{SessionService, UserService},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务使用 Arc 包装，Clone 成本低廉；配置显式传入，没有全局状态。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub users: Arc<dyn UserRepository>,
    pub session_service: Arc<SessionService>,
    pub user_service: Arc<UserService>,
    pub cookie_policy: CookiePolicy,
    /// 登录接口的 IP 限流器
    pub login_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    /// 根据配置和账户存储组装所有服务
    pub fn new(config: AppConfig, users: Arc<dyn UserRepository>) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.security)?);
        let hasher = PasswordHasher::from_config(&config.security)?;

        let cookie_policy = CookiePolicy {
            secure: config.server.is_production(),
            access_max_age_secs: config.security.access_token_exp_secs,
            refresh_max_age_secs: config.security.refresh_token_exp_secs,
        };

        let login_limiter = Arc::new(IpRateLimiter::new(
            config.security.login_rate_limit_max as usize,
            Duration::from_secs(config.security.login_rate_limit_window_secs as u64),
        ));

        Ok(Self {
            session_service: Arc::new(SessionService::new(users.clone(), jwt_service, hasher)),
            user_service: Arc::new(UserService::new(users.clone())),
            users,
            cookie_policy,
            login_limiter,
            config,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_label = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "PATCH" => "PATCH",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_label = match status {
            200..=299 => "2xx",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            429 => "429",
            500..=599 => "5xx",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_label, "status" => status_label)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中回显 trace_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 非生产环境下把服务端错误的内部详情写回响应体
pub async fn error_detail_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;

    let Some(ErrorDetail(detailed)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    if state.config.server.is_production() {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, Json(detailed)).into_response()
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 登录限流中间件，以客户端 IP 作为限流键
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = client_ip(req.headers(), peer, state.config.security.trust_proxy);

    if !state.login_limiter.check(client_ip) {
        tracing::warn!(
            client_ip = %client_ip,
            uri = %req.uri().path(),
            "Login rate limit exceeded"
        );
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
/// 信任代理时优先使用代理头，其次是 TCP 对端地址；都没有时回退到本地回环地址
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());

        if let Some(ip) = real_ip {
            return ip;
        }
    }

    peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ==================== 限流服务 ====================

/// IP 级别的速率限制器（滑动窗口）
pub struct IpRateLimiter {
    windows: DashMap<IpAddr, Arc<Mutex<VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl IpRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// 检查是否允许请求，允许时记录本次请求
    pub fn check(&self, ip: IpAddr) -> bool {
        let entry = self
            .windows
            .entry(ip)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone();

        let mut requests = entry.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        // 清理过期的请求记录
        while let Some(&front) = requests.front() {
            if now.duration_since(front) < self.window {
                break;
            }
            requests.pop_front();
        }

        if requests.len() < self.max_requests {
            requests.push_back(now);
            true
        } else {
            false
        }
    }

    /// 移除窗口内已无请求的 IP
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();

        self.windows.retain(|_, requests| {
            let requests = requests.lock().unwrap_or_else(|e| e.into_inner());
            requests
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });

        before - self.windows.len()
    }

    pub fn tracked_ips(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        assert_eq!(extract_or_generate_trace_id(&headers), "test-trace-123");

        let trace_id = extract_or_generate_trace_id(&HeaderMap::new());
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_client_ip_respects_trust_proxy() {
        let peer: IpAddr = "203.0.113.7".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "192.168.1.1, 10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers, Some(peer), true), "192.168.1.1".parse::<IpAddr>().unwrap());
        // 不信任代理时忽略代理头，使用对端地址
        assert_eq!(client_ip(&headers, Some(peer), false), peer);

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.168.1.2".parse().unwrap());
        assert_eq!(client_ip(&headers, None, true), "192.168.1.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_then_loopback() {
        let peer: IpAddr = "203.0.113.7".parse().unwrap();

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), peer);
        assert_eq!(client_ip(&HeaderMap::new(), None, false), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_ip_rate_limiter() {
        let limiter = IpRateLimiter::new(5, Duration::from_secs(60));
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        let other = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2));

        // 前 5 个请求应该通过
        for _ in 0..5 {
            assert!(limiter.check(ip));
        }

        // 第 6 个请求应该被限流，其他 IP 不受影响
        assert!(!limiter.check(ip));
        assert!(limiter.check(other));
    }

    #[test]
    fn test_cleanup_drops_idle_windows() {
        let limiter = IpRateLimiter::new(5, Duration::from_millis(1));
        limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(limiter.cleanup_expired(), 1);
        assert_eq!(limiter.tracked_ips(), 0);
    }
}

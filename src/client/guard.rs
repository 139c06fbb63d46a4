//! 客户端会话守卫
//!
//! 请求收到 401 时先调用 `/auth/refresh-token`，成功后把原请求重发一次；
//! 刷新失败则尽力登出并把会话状态置为匿名。
//!
//! 并发请求不合并刷新：每个遇到 401 的请求各自触发一次刷新。

use tokio::sync::watch;

use super::{ApiRequest, ApiResponse, ClientError, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const LOGOUT_PATH: &str = "/auth/logout";

/// 客户端视角的会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

pub struct SessionGuard<T> {
    transport: T,
    state: watch::Sender<SessionState>,
}

impl<T: Transport> SessionGuard<T> {
    pub fn new(transport: T) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self { transport, state }
    }

    /// 底层传输（不经过守卫的调用使用）
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// 订阅会话状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Session state changed");
        }
    }

    /// 发送请求；401 时最多刷新并重试一次
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        loop {
            let response = self.transport.send(&request).await?;

            if response.status != 401 {
                return response.into_result();
            }

            // 已重试过的请求再次 401 直接失败
            if request.retried {
                tracing::warn!(path = %request.path, "Request still unauthorized after refresh");
                return response.into_result();
            }
            request.retried = true;

            if let Err(err) = self.refresh().await {
                self.end_session().await;
                return Err(err);
            }

            tracing::debug!(path = %request.path, "Session refreshed, retrying request");
        }
    }

    /// 直接通过传输层刷新访问令牌
    pub async fn refresh(&self) -> Result<ApiResponse, ClientError> {
        let response = self
            .transport
            .send(&ApiRequest::post(REFRESH_PATH))
            .await?
            .into_result()?;

        self.set_state(SessionState::Authenticated);
        Ok(response)
    }

    /// 尽力登出（忽略错误），会话状态置为匿名
    pub async fn end_session(&self) {
        if let Err(err) = self.transport.send(&ApiRequest::post(LOGOUT_PATH)).await {
            tracing::debug!(error = %err, "Best-effort logout failed");
        }
        self.set_state(SessionState::Anonymous);
    }
}

//! 图书馆 API 客户端
//!
//! `LibraryClient` 在会话守卫之上提供类型化调用。登录、注册、登出和刷新
//! 直接走传输层，其余调用经过守卫，访问令牌过期时自动刷新并重试一次。

mod error;
mod guard;
mod transport;

pub use error::ClientError;
pub use guard::{SessionGuard, SessionState, LOGOUT_PATH, REFRESH_PATH};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

use crate::models::{
    LoginRequest, RegisterRequest, Role, UserEnvelope, UserListResponse, UserResponse,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

pub struct LibraryClient<T = HttpTransport> {
    guard: SessionGuard<T>,
}

impl LibraryClient<HttpTransport> {
    /// 连接到指定地址的服务
    pub fn connect(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self::new(HttpTransport::new(base_url)?))
    }
}

impl<T: Transport> LibraryClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            guard: SessionGuard::new(transport),
        }
    }

    pub fn guard(&self) -> &SessionGuard<T> {
        &self.guard
    }

    pub fn session_state(&self) -> SessionState {
        self.guard.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.guard.subscribe()
    }

    /// 直接发送，不做刷新重试
    async fn send_direct(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.guard.transport().send(&request).await?.into_result()
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<UserResponse, ClientError> {
        let response = self
            .send_direct(ApiRequest::post("/auth/register").json(req)?)
            .await?;
        Ok(response.json::<UserEnvelope>()?.user)
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<UserResponse, ClientError> {
        let response = self
            .send_direct(ApiRequest::post("/auth/login").json(req)?)
            .await?;
        let envelope: UserEnvelope = response.json()?;

        self.guard.set_state(SessionState::Authenticated);
        Ok(envelope.user)
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        let response = self.guard.execute(ApiRequest::get("/auth/me")).await?;
        Ok(response.json::<UserEnvelope>()?.user)
    }

    /// 登出；无论服务端结果如何，本地状态都变为匿名
    pub async fn logout(&self) -> Result<String, ClientError> {
        let result = self.send_direct(ApiRequest::post(LOGOUT_PATH)).await;
        self.guard.set_state(SessionState::Anonymous);
        Ok(result?.json::<MessageBody>()?.message)
    }

    pub async fn refresh(&self) -> Result<UserResponse, ClientError> {
        let response = match self.guard.refresh().await {
            Ok(response) => response,
            Err(err) => {
                self.guard.set_state(SessionState::Anonymous);
                return Err(err);
            }
        };
        Ok(response.json::<UserEnvelope>()?.user)
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<UserListResponse, ClientError> {
        let path = format!("/users?limit={}&offset={}", limit, offset);
        self.guard.execute(ApiRequest::get(path)).await?.json()
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserResponse, ClientError> {
        let response = self
            .guard
            .execute(ApiRequest::get(format!("/users/{}", id)))
            .await?;
        Ok(response.json::<UserEnvelope>()?.user)
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> Result<UserResponse, ClientError> {
        let request =
            ApiRequest::patch(format!("/users/{}/role", id)).json(&json!({ "role": role }))?;
        let response = self.guard.execute(request).await?;
        Ok(response.json::<UserEnvelope>()?.user)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), ClientError> {
        self.guard
            .execute(ApiRequest::delete(format!("/users/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::put("/users/me/password").json(&json!({
            "old_password": old_password,
            "new_password": new_password,
        }))?;
        self.guard.execute(request).await?;
        Ok(())
    }
}

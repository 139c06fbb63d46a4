//! Authentication and authorization module

pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use cookies::{clear_session, CookiePolicy, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
pub use jwt::{Claims, JwtService, TokenPair, TokenType};
pub use middleware::{extract_access_token, session_auth_middleware, AuthContext};
pub use password::PasswordHasher;

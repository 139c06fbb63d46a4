//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 内置的开发用密钥，生产环境必须覆盖
const DEFAULT_ACCESS_TOKEN_SECRET: &str = "change-this-access-secret-in-production!!";
const DEFAULT_REFRESH_TOKEN_SECRET: &str = "change-this-refresh-secret-in-production!";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 运行环境: development, test, production
    pub environment: String,
    /// 允许跨域的前端来源，逗号分隔
    pub cors_allowed_origins: String,
}

impl ServerConfig {
    /// 是否为生产环境（决定 Cookie 的 Secure 属性）
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// 解析后的 CORS 来源列表
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 访问令牌签名密钥
    pub access_token_secret: Secret<String>,
    /// 刷新令牌签名密钥（必须与访问令牌密钥不同）
    pub refresh_token_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// Argon2 内存成本（KiB）
    pub password_hash_memory_kib: u32,
    /// Argon2 迭代次数
    pub password_hash_iterations: u32,
    /// Argon2 并行度
    pub password_hash_parallelism: u32,
    /// 登录接口时间窗口内允许的最大请求数
    pub login_rate_limit_max: u32,
    /// 登录限流时间窗口（秒）
    pub login_rate_limit_window_secs: u32,
    /// 是否信任 X-Forwarded-For / X-Real-IP 头（仅在反向代理之后开启）
    pub trust_proxy: bool,
}

/// 启动时确保存在的管理员账户
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    pub admin_password: Option<Secret<String>>,
    pub admin_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.environment", "development")?
            .set_default("server.cors_allowed_origins", "http://localhost:5173")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.access_token_secret", DEFAULT_ACCESS_TOKEN_SECRET)?
            .set_default("security.refresh_token_secret", DEFAULT_REFRESH_TOKEN_SECRET)?
            .set_default("security.access_token_exp_secs", 3600)?
            .set_default("security.refresh_token_exp_secs", 2592000)?
            .set_default("security.password_hash_memory_kib", 65536)?
            .set_default("security.password_hash_iterations", 3)?
            .set_default("security.password_hash_parallelism", 4)?
            .set_default("security.login_rate_limit_max", 10)?
            .set_default("security.login_rate_limit_window_secs", 300)?
            .set_default("security.trust_proxy", false)?
            .set_default("bootstrap.admin_name", "Administrator")?;

        // 从环境变量加载配置（前缀为 LIBRARY_）
        settings = settings.add_source(
            Environment::with_prefix("LIBRARY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        match self.server.environment.to_lowercase().as_str() {
            "development" | "test" | "production" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid environment: {}. Must be one of: development, test, production",
                    self.server.environment
                )))
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证令牌密钥（至少 32 字符，且两者不同）
        let access_secret = self.security.access_token_secret.expose_secret();
        let refresh_secret = self.security.refresh_token_secret.expose_secret();
        if access_secret.len() < 32 || refresh_secret.len() < 32 {
            return Err(ConfigError::Message(
                "Token secrets must be at least 32 characters long".to_string(),
            ));
        }
        if access_secret == refresh_secret {
            return Err(ConfigError::Message(
                "access_token_secret and refresh_token_secret must differ".to_string(),
            ));
        }
        if self.server.is_production()
            && (access_secret == DEFAULT_ACCESS_TOKEN_SECRET
                || refresh_secret == DEFAULT_REFRESH_TOKEN_SECRET)
        {
            return Err(ConfigError::Message(
                "Built-in token secrets must be overridden in production".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < 3600
            || self.security.refresh_token_exp_secs > 2592000
        {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be between 3600 and 2592000 (1 hour to 30 days)"
                    .to_string(),
            ));
        }

        if self.security.login_rate_limit_max == 0 || self.security.login_rate_limit_window_secs == 0
        {
            return Err(ConfigError::Message(
                "login rate limit max and window must be > 0".to_string(),
            ));
        }

        if self.bootstrap.admin_email.is_some() != self.bootstrap.admin_password.is_some() {
            return Err(ConfigError::Message(
                "bootstrap.admin_email and bootstrap.admin_password must be set together"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

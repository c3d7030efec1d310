//! warden-config - 配置加载库
//!
//! 加载顺序：`<dir>/default.toml` -> `<dir>/<APP_ENV>.toml` -> `ACCOUNT_STORE_*` 环境变量。
//! 环境变量中使用 `__` 分隔嵌套字段，例如 `ACCOUNT_STORE_DATABASE__URL`。

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "ACCOUNT_STORE_";

/// 指向配置文件的环境变量
pub const SETTINGS_ENV_VAR: &str = "ACCOUNT_STORE_SETTINGS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Environment variable {0} is not set")]
    MissingSettingsVar(&'static str),

    #[error("Settings file does not exist: {0}")]
    SettingsFileMissing(String),

    #[error("Database connection is not configured: set database.url or database.engine")]
    MissingDatabaseUrl,
}

/// 由组件拼装连接串的引擎配置
///
/// 拼装格式：`{dialect}:{path}{userid}[:{password}][@{hostname}][:{port}][/{db}]`
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub dialect: String,
    #[serde(default = "default_engine_path")]
    pub path: String,
    pub userid: Option<String>,
    pub password: Option<Secret<String>>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub db: Option<String>,
}

fn default_engine_path() -> String {
    "//".to_string()
}

impl EngineConfig {
    /// 拼装连接串
    pub fn url(&self) -> Secret<String> {
        let mut url = format!("{}:{}", self.dialect, self.path);

        if let Some(userid) = &self.userid {
            url.push_str(userid);
        }
        // 只有同时提供用户名和密码时才写入密码段
        if let (Some(_), Some(password)) = (&self.userid, &self.password) {
            url.push(':');
            url.push_str(password.expose_secret());
        }
        if let Some(hostname) = &self.hostname {
            url.push('@');
            url.push_str(hostname);
        }
        if let Some(port) = self.port {
            url.push(':');
            url.push_str(&port.to_string());
        }
        if let Some(db) = self.db.as_deref().filter(|db| !db.is_empty()) {
            url.push('/');
            url.push_str(db);
        }

        Secret::new(url)
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 完整连接串，优先于 `engine`
    pub url: Option<Secret<String>>,
    pub engine: Option<EngineConfig>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl DatabaseConfig {
    /// 解析最终使用的连接串
    pub fn connection_url(&self) -> Result<Secret<String>, ConfigError> {
        match (&self.url, &self.engine) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(engine)) => Ok(engine.url()),
            (None, None) => Err(ConfigError::MissingDatabaseUrl),
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// 遥测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// 账户存储设置
///
/// 凭证类型表 `credential_type.title` 中哪些取值代表密码、哪些代表 TOTP 密钥。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStoreSettings {
    #[serde(default = "default_password_credential_type")]
    pub password_credential_type: String,
    #[serde(default = "default_totp_credential_type")]
    pub totp_credential_type: String,
}

fn default_password_credential_type() -> String {
    "password".to_string()
}

fn default_totp_credential_type() -> String {
    "totp_key".to_string()
}

impl Default for AccountStoreSettings {
    fn default() -> Self {
        Self {
            password_credential_type: default_password_credential_type(),
            totp_credential_type: default_totp_credential_type(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub account_store: AccountStoreSettings,
}

fn default_app_name() -> String {
    "account-store".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置目录和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let config: Self = Figment::new()
            .merge(Serialized::default("app_env", &env))
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// 从 `ACCOUNT_STORE_SETTINGS` 指向的单个文件加载配置
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(SETTINGS_ENV_VAR)
            .map_err(|_| ConfigError::MissingSettingsVar(SETTINGS_ENV_VAR))?;
        Self::load_file(&path)
    }

    /// 从指定文件加载配置，文件必须存在
    pub fn load_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::SettingsFileMissing(path.to_string()));
        }

        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

//! 账户与凭证

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use super::permission::PermissionsByDomain;

/// 凭证类别，由 `credential_type.title` 归类得到
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Password,
    /// 基于时间的一次性口令密钥
    TotpKey,
    Other(String),
}

impl CredentialKind {
    /// 特权凭证会让认证信息附带手机号
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::TotpKey)
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => f.write_str("password"),
            Self::TotpKey => f.write_str("totp_key"),
            Self::Other(title) => f.write_str(title),
        }
    }
}

/// 凭证类型标题到 `CredentialKind` 的映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialTypeMap {
    pub password: String,
    pub totp_key: String,
}

impl Default for CredentialTypeMap {
    fn default() -> Self {
        Self {
            password: "password".to_string(),
            totp_key: "totp_key".to_string(),
        }
    }
}

impl CredentialTypeMap {
    pub fn classify(&self, title: &str) -> CredentialKind {
        if title == self.password {
            CredentialKind::Password
        } else if title == self.totp_key {
            CredentialKind::TotpKey
        } else {
            CredentialKind::Other(title.to_string())
        }
    }
}

/// 凭证查询返回的原始行，每行附带用户级别的列
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub credential: SecretString,
    pub credential_type: String,
    pub expiration_dt: DateTime<Utc>,
    pub account_lock_millis: Option<i64>,
    pub phone_number: Option<String>,
}

/// 交给凭证解析器的输入
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub kind: CredentialKind,
    pub value: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// 默认的凭证表示
#[derive(Debug, Clone)]
pub struct HashedCredential {
    pub kind: CredentialKind,
    pub value: SecretString,
    /// PHC 字符串中的算法标识，仅密码凭证有值
    pub algorithm: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl HashedCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 认证信息
#[derive(Debug, Clone)]
pub struct AuthenticationInfo<C> {
    pub identifier: String,
    /// 同一类别可能有多条凭证，按存储顺序排列
    pub credentials: HashMap<CredentialKind, Vec<C>>,
    /// `None` 表示未锁定
    pub locked_at: Option<DateTime<Utc>>,
    /// 只有存在特权凭证时才加载
    pub phone_number: Option<String>,
}

impl<C> AuthenticationInfo<C> {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn credentials_of(&self, kind: &CredentialKind) -> &[C] {
        self.credentials.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// 全部凭证条数
    pub fn credential_count(&self) -> usize {
        self.credentials.values().map(Vec::len).sum()
    }
}

/// 完整账户视图
#[derive(Debug, Clone)]
pub struct Account<C, P, R> {
    pub identifier: String,
    pub authentication: Option<AuthenticationInfo<C>>,
    pub permissions: Option<PermissionsByDomain<P>>,
    pub roles: Option<Vec<R>>,
}

impl<C, P, R> Account<C, P, R> {
    /// 三部分都缺失时账户不存在
    pub fn is_empty(&self) -> bool {
        self.authentication.is_none() && self.permissions.is_none() && self.roles.is_none()
    }
}

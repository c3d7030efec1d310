//! 解析器
//!
//! 存储层只产出原始记录，调用方通过解析器把它们转换为自己的领域对象。
//! 每个解析器只有一个 `resolve` 能力，在构造 `AccountStore` 时注入。

use std::marker::PhantomData;

use argon2::password_hash::PasswordHash;
use secrecy::ExposeSecret;
use thiserror::Error;

use super::account::{CredentialKind, HashedCredential, StoredCredential};
use super::authorization::SimpleAuthorizationInfo;
use super::permission::PermissionGroup;
use super::role::SimpleRole;
use super::wildcard::WildcardPermission;

/// 记录转换失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Malformed value: {0}")]
    Malformed(String),
}

/// 凭证解析器
pub trait CredentialResolver: Send + Sync {
    type Credential;

    fn resolve(&self, stored: &StoredCredential) -> Result<Self::Credential, ResolveError>;
}

/// 权限解析器
pub trait PermissionResolver: Send + Sync {
    type Permission;

    fn resolve(&self, group: &PermissionGroup) -> Result<Self::Permission, ResolveError>;
}

/// 角色解析器，输入为角色标题
pub trait RoleResolver: Send + Sync {
    type Role;

    fn resolve(&self, title: &str) -> Result<Self::Role, ResolveError>;
}

/// 授权信息解析器
pub trait AuthorizationInfoResolver: Send + Sync {
    type Role;
    type Permission;
    type Info;

    fn resolve(
        &self,
        roles: Vec<Self::Role>,
        permissions: Vec<Self::Permission>,
    ) -> Result<Self::Info, ResolveError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRoleResolver;

impl RoleResolver for SimpleRoleResolver {
    type Role = SimpleRole;

    fn resolve(&self, title: &str) -> Result<SimpleRole, ResolveError> {
        if title.trim().is_empty() {
            return Err(ResolveError::Malformed("role title is blank".to_string()));
        }
        Ok(SimpleRole::new(title))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardPermissionResolver;

impl PermissionResolver for WildcardPermissionResolver {
    type Permission = WildcardPermission;

    fn resolve(&self, group: &PermissionGroup) -> Result<WildcardPermission, ResolveError> {
        Ok(WildcardPermission::from(group))
    }
}

/// 保存哈希后的凭证；密码凭证必须是合法的 PHC 字符串
#[derive(Debug, Clone, Copy, Default)]
pub struct PhcCredentialResolver;

impl CredentialResolver for PhcCredentialResolver {
    type Credential = HashedCredential;

    fn resolve(&self, stored: &StoredCredential) -> Result<HashedCredential, ResolveError> {
        let algorithm = match stored.kind {
            CredentialKind::Password => {
                let hash = PasswordHash::new(stored.value.expose_secret()).map_err(|e| {
                    ResolveError::Malformed(format!("password credential is not a PHC string: {}", e))
                })?;
                Some(hash.algorithm.as_str().to_string())
            }
            _ => None,
        };

        Ok(HashedCredential {
            kind: stored.kind.clone(),
            value: stored.value.clone(),
            algorithm,
            expires_at: stored.expires_at,
        })
    }
}

/// 把角色和权限原样装入 `SimpleAuthorizationInfo`
pub struct SimpleAuthorizationInfoResolver<R, P> {
    _marker: PhantomData<fn() -> (R, P)>,
}

impl<R, P> SimpleAuthorizationInfoResolver<R, P> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<R, P> Default for SimpleAuthorizationInfoResolver<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> AuthorizationInfoResolver for SimpleAuthorizationInfoResolver<R, P> {
    type Role = R;
    type Permission = P;
    type Info = SimpleAuthorizationInfo<R, P>;

    fn resolve(&self, roles: Vec<R>, permissions: Vec<P>) -> Result<Self::Info, ResolveError> {
        Ok(SimpleAuthorizationInfo { roles, permissions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::Dimension;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;

    const PHC: &str = "$argon2id$v=19$m=65536,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

    fn stored(kind: CredentialKind, value: &str) -> StoredCredential {
        StoredCredential {
            kind,
            value: SecretString::new(value.to_string()),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_phc_password_is_accepted() {
        let credential = PhcCredentialResolver
            .resolve(&stored(CredentialKind::Password, PHC))
            .unwrap();

        assert_eq!(credential.kind, CredentialKind::Password);
        assert_eq!(credential.algorithm.as_deref(), Some("argon2id"));
        assert_eq!(credential.value.expose_secret(), PHC);
    }

    #[test]
    fn test_plaintext_password_is_rejected() {
        let result = PhcCredentialResolver.resolve(&stored(CredentialKind::Password, "letsgobowling"));
        assert!(matches!(result, Err(ResolveError::Malformed(_))));
    }

    #[test]
    fn test_totp_key_is_not_parsed() {
        let credential = PhcCredentialResolver
            .resolve(&stored(CredentialKind::TotpKey, "JBSWY3DPEHPK3PXP"))
            .unwrap();

        assert_eq!(credential.algorithm, None);
        assert_eq!(credential.kind, CredentialKind::TotpKey);
    }

    #[test]
    fn test_blank_role_title_is_rejected() {
        assert_eq!(SimpleRoleResolver.resolve("courier").unwrap().title, "courier");
        assert!(SimpleRoleResolver.resolve("  ").is_err());
    }

    #[test]
    fn test_wildcard_permission_resolver() {
        let group = PermissionGroup::new(
            Dimension::named("money"),
            [Dimension::named("write")],
            [Dimension::Any],
        );
        let permission = WildcardPermissionResolver.resolve(&group).unwrap();
        assert_eq!(permission.to_string(), "money:write:*");
    }

    #[test]
    fn test_simple_authorization_info_resolver() {
        let resolver = SimpleAuthorizationInfoResolver::<SimpleRole, String>::new();
        let info = resolver
            .resolve(vec![SimpleRole::new("tenant")], vec!["money:write:*".to_string()])
            .unwrap();

        assert_eq!(info.roles, vec![SimpleRole::new("tenant")]);
        assert_eq!(info.permissions.len(), 1);
    }
}

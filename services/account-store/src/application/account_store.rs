//! 账户存储门面
//!
//! 每个操作独立开启一个 Unit of Work，查询完成即提交，之后再把原始记录交给解析器。
//! 权限与角色查询中的转换失败会降级为 `None`，凭证转换失败则作为错误返回。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};
use warden_adapter_postgres::AccessMode;
use warden_config::AccountStoreSettings;
use warden_errors::AppResult;

use super::single_flight::SingleFlight;
use crate::domain::{
    Account, AuthenticationInfo, AuthorizationInfoResolver, AuthorizationLookup,
    CredentialKind, CredentialRecord, CredentialResolver, CredentialTypeMap, HashedCredential, PermissionGroup,
    PermissionResolver, PermissionsByDomain, PhcCredentialResolver, RawPermissionGroup,
    ResolveError, RoleRecord, RoleResolver, SimpleAuthorizationInfo,
    SimpleAuthorizationInfoResolver, SimpleRole, SimpleRoleResolver, StoredCredential,
    UnitOfWorkFactory, WildcardPermission, WildcardPermissionResolver,
};
use crate::error::AccountStoreError;

/// 降级计数指标
const FAIL_SOFT_METRIC: &str = "account_store_fail_soft_total";

pub type CredentialResolverRef<C> = Arc<dyn CredentialResolver<Credential = C>>;
pub type PermissionResolverRef<P> = Arc<dyn PermissionResolver<Permission = P>>;
pub type RoleResolverRef<R> = Arc<dyn RoleResolver<Role = R>>;
pub type AuthorizationInfoResolverRef<R, P, A> =
    Arc<dyn AuthorizationInfoResolver<Role = R, Permission = P, Info = A>>;

/// 使用默认解析器的账户存储
pub type DefaultAccountStore = AccountStore<
    HashedCredential,
    WildcardPermission,
    SimpleRole,
    SimpleAuthorizationInfo<SimpleRole, WildcardPermission>,
>;

/// 账户存储
///
/// 类型参数依次为凭证、权限、角色、授权信息的解析结果。
pub struct AccountStore<C, P, R, A> {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    credential_types: CredentialTypeMap,
    credential_resolver: Option<CredentialResolverRef<C>>,
    permission_resolver: Option<PermissionResolverRef<P>>,
    role_resolver: Option<RoleResolverRef<R>>,
    authz_info_resolver: Option<AuthorizationInfoResolverRef<R, P, A>>,
    accounts_in_flight: SingleFlight<Option<Arc<Account<C, P, R>>>>,
}

impl DefaultAccountStore {
    pub fn with_default_resolvers(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self::new(uow_factory)
            .with_credential_resolver(Arc::new(PhcCredentialResolver))
            .with_permission_resolver(Arc::new(WildcardPermissionResolver))
            .with_role_resolver(Arc::new(SimpleRoleResolver))
            .with_authz_info_resolver(Arc::new(SimpleAuthorizationInfoResolver::new()))
    }
}

impl<C, P, R, A> AccountStore<C, P, R, A>
where
    C: Send + Sync + 'static,
    P: Send + Sync + 'static,
    R: Send + Sync + 'static,
    A: Send + 'static,
{
    /// 不带任何解析器的账户存储
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self {
            uow_factory,
            credential_types: CredentialTypeMap::default(),
            credential_resolver: None,
            permission_resolver: None,
            role_resolver: None,
            authz_info_resolver: None,
            accounts_in_flight: SingleFlight::new(),
        }
    }

    /// 按设置识别凭证类型
    pub fn with_settings(mut self, settings: &AccountStoreSettings) -> Self {
        self.credential_types = CredentialTypeMap {
            password: settings.password_credential_type.clone(),
            totp_key: settings.totp_credential_type.clone(),
        };
        self
    }

    pub fn with_credential_resolver(mut self, resolver: CredentialResolverRef<C>) -> Self {
        self.credential_resolver = Some(resolver);
        self
    }

    pub fn with_permission_resolver(mut self, resolver: PermissionResolverRef<P>) -> Self {
        self.permission_resolver = Some(resolver);
        self
    }

    pub fn with_role_resolver(mut self, resolver: RoleResolverRef<R>) -> Self {
        self.role_resolver = Some(resolver);
        self
    }

    pub fn with_authz_info_resolver(
        mut self,
        resolver: AuthorizationInfoResolverRef<R, P, A>,
    ) -> Self {
        self.authz_info_resolver = Some(resolver);
        self
    }

    /// 认证信息；没有任何凭证时返回 `None`
    pub async fn get_authentication_info(
        &self,
        identifier: &str,
    ) -> AppResult<Option<AuthenticationInfo<C>>> {
        validate_identifier(identifier)?;
        let resolver = self.credential_resolver()?;

        let uow = self.uow_factory.begin(AccessMode::ReadOnly).await?;
        let records = uow.accounts().find_credentials(identifier).await?;
        uow.commit().await?;

        self.build_authentication_info(identifier, records, resolver)
    }

    /// 按 domain 分组的权限
    pub async fn get_authorization_permissions(
        &self,
        identifier: &str,
    ) -> AppResult<Option<PermissionsByDomain<P>>> {
        let lookup = self.lookup_authorization_permissions(identifier).await?;
        Ok(fail_soft("get_authorization_permissions", identifier, lookup))
    }

    pub async fn lookup_authorization_permissions(
        &self,
        identifier: &str,
    ) -> AppResult<AuthorizationLookup<PermissionsByDomain<P>>> {
        validate_identifier(identifier)?;
        let resolver = self.permission_resolver()?;

        let uow = self.uow_factory.begin(AccessMode::ReadOnly).await?;
        let groups = uow.accounts().find_permission_groups(identifier).await?;
        uow.commit().await?;

        Ok(resolve_permissions(resolver, groups))
    }

    pub async fn get_authorization_roles(&self, identifier: &str) -> AppResult<Option<Vec<R>>> {
        let lookup = self.lookup_authorization_roles(identifier).await?;
        Ok(fail_soft("get_authorization_roles", identifier, lookup))
    }

    pub async fn lookup_authorization_roles(
        &self,
        identifier: &str,
    ) -> AppResult<AuthorizationLookup<Vec<R>>> {
        validate_identifier(identifier)?;
        let resolver = self.role_resolver()?;

        let uow = self.uow_factory.begin(AccessMode::ReadOnly).await?;
        let roles = uow.accounts().find_roles(identifier).await?;
        uow.commit().await?;

        Ok(resolve_roles(resolver, roles))
    }

    /// 角色与权限合并后的授权信息，两者都缺失时返回 `None`
    pub async fn get_authorization_info(&self, identifier: &str) -> AppResult<Option<A>> {
        validate_identifier(identifier)?;
        let permission_resolver = self.permission_resolver()?;
        let role_resolver = self.role_resolver()?;
        let info_resolver = self.authz_info_resolver()?;

        let uow = self.uow_factory.begin(AccessMode::ReadOnly).await?;
        let groups = uow.accounts().find_permission_groups(identifier).await?;
        let roles = uow.accounts().find_roles(identifier).await?;
        uow.commit().await?;

        const OPERATION: &str = "get_authorization_info";
        let permissions = fail_soft(
            OPERATION,
            identifier,
            resolve_permissions(permission_resolver, groups),
        );
        let roles = fail_soft(OPERATION, identifier, resolve_roles(role_resolver, roles));
        if permissions.is_none() && roles.is_none() {
            return Ok(None);
        }

        let permissions: Vec<P> = permissions
            .unwrap_or_default()
            .into_values()
            .flatten()
            .collect();
        let info = info_resolver.resolve(roles.unwrap_or_default(), permissions);
        Ok(fail_soft(OPERATION, identifier, info.into()))
    }

    /// 锁定账户，重复锁定以最后一次时间为准
    pub async fn lock_account(&self, identifier: &str, locked_at: DateTime<Utc>) -> AppResult<()> {
        validate_identifier(identifier)?;
        self.write_account_lock(identifier, Some(locked_at.timestamp_millis()))
            .await?;

        info!(identifier = %identifier, locked_at = %locked_at, "Account locked");
        Ok(())
    }

    pub async fn unlock_account(&self, identifier: &str) -> AppResult<()> {
        validate_identifier(identifier)?;
        self.write_account_lock(identifier, None).await?;

        info!(identifier = %identifier, "Account unlocked");
        Ok(())
    }

    /// 凭证、权限、角色一次性加载
    ///
    /// 同一 identifier 的并发调用共享一次加载并拿到同一个 `Arc`。
    pub async fn get_account(&self, identifier: &str) -> AppResult<Option<Arc<Account<C, P, R>>>> {
        validate_identifier(identifier)?;
        self.credential_resolver()?;
        self.permission_resolver()?;
        self.role_resolver()?;

        self.accounts_in_flight
            .run(identifier, || self.load_account(identifier))
            .await
    }

    async fn load_account(&self, identifier: &str) -> AppResult<Option<Arc<Account<C, P, R>>>> {
        let credential_resolver = self.credential_resolver()?;
        let permission_resolver = self.permission_resolver()?;
        let role_resolver = self.role_resolver()?;

        let uow = self.uow_factory.begin(AccessMode::ReadOnly).await?;
        let credentials = uow.accounts().find_credentials(identifier).await?;
        let groups = uow.accounts().find_permission_groups(identifier).await?;
        let roles = uow.accounts().find_roles(identifier).await?;
        uow.commit().await?;

        let account = Account {
            identifier: identifier.to_string(),
            authentication: self.build_authentication_info(
                identifier,
                credentials,
                credential_resolver,
            )?,
            permissions: fail_soft(
                "get_account",
                identifier,
                resolve_permissions(permission_resolver, groups),
            ),
            roles: fail_soft("get_account", identifier, resolve_roles(role_resolver, roles)),
        };

        if account.is_empty() {
            debug!(identifier = %identifier, "Account not found");
            return Ok(None);
        }
        Ok(Some(Arc::new(account)))
    }

    async fn write_account_lock(&self, identifier: &str, lock_millis: Option<i64>) -> AppResult<()> {
        let uow = self.uow_factory.begin(AccessMode::ReadWrite).await?;
        let updated = uow
            .accounts()
            .set_account_lock(identifier, lock_millis)
            .await?;
        uow.commit().await?;

        if updated == 0 {
            debug!(identifier = %identifier, "No account matched lock update");
        }
        Ok(())
    }

    fn build_authentication_info(
        &self,
        identifier: &str,
        records: Vec<CredentialRecord>,
        resolver: &dyn CredentialResolver<Credential = C>,
    ) -> AppResult<Option<AuthenticationInfo<C>>> {
        let Some(first) = records.first() else {
            debug!(identifier = %identifier, "No credentials found");
            return Ok(None);
        };
        let locked_at = lock_from_millis(first.account_lock_millis)?;
        let phone_number = first.phone_number.clone();

        let mut credentials: HashMap<CredentialKind, Vec<C>> = HashMap::new();
        let mut privileged = false;
        for record in records {
            let stored = StoredCredential {
                kind: self.credential_types.classify(&record.credential_type),
                value: record.credential,
                expires_at: record.expiration_dt,
            };
            let credential = resolver.resolve(&stored).map_err(|source| {
                AccountStoreError::CredentialUnresolvable {
                    kind: stored.kind.clone(),
                    source,
                }
            })?;

            privileged |= stored.kind.is_privileged();
            credentials.entry(stored.kind).or_default().push(credential);
        }

        Ok(Some(AuthenticationInfo {
            identifier: identifier.to_string(),
            credentials,
            locked_at,
            phone_number: if privileged { phone_number } else { None },
        }))
    }

    fn credential_resolver(&self) -> AppResult<&dyn CredentialResolver<Credential = C>> {
        self.credential_resolver
            .as_deref()
            .ok_or_else(|| AccountStoreError::ResolverNotConfigured("credential").into())
    }

    fn permission_resolver(&self) -> AppResult<&dyn PermissionResolver<Permission = P>> {
        self.permission_resolver
            .as_deref()
            .ok_or_else(|| AccountStoreError::ResolverNotConfigured("permission").into())
    }

    fn role_resolver(&self) -> AppResult<&dyn RoleResolver<Role = R>> {
        self.role_resolver
            .as_deref()
            .ok_or_else(|| AccountStoreError::ResolverNotConfigured("role").into())
    }

    fn authz_info_resolver(
        &self,
    ) -> AppResult<&dyn AuthorizationInfoResolver<Role = R, Permission = P, Info = A>> {
        self.authz_info_resolver
            .as_deref()
            .ok_or_else(|| AccountStoreError::ResolverNotConfigured("authorization info").into())
    }
}

fn validate_identifier(identifier: &str) -> Result<(), AccountStoreError> {
    if identifier.is_empty() {
        return Err(AccountStoreError::EmptyIdentifier);
    }
    Ok(())
}

fn lock_from_millis(millis: Option<i64>) -> Result<Option<DateTime<Utc>>, AccountStoreError> {
    millis
        .map(|ms| DateTime::from_timestamp_millis(ms).ok_or(AccountStoreError::LockOutOfRange(ms)))
        .transpose()
}

fn resolve_permissions<P>(
    resolver: &dyn PermissionResolver<Permission = P>,
    records: Vec<RawPermissionGroup>,
) -> AuthorizationLookup<PermissionsByDomain<P>> {
    if records.is_empty() {
        return AuthorizationLookup::NotFound;
    }

    let resolved: Result<PermissionsByDomain<P>, ResolveError> =
        records
            .into_iter()
            .try_fold(PermissionsByDomain::new(), |mut by_domain, record| {
                let group = PermissionGroup::try_from(record)?;
                let permission = resolver.resolve(&group)?;
                by_domain.entry(group.domain).or_default().push(permission);
                Ok(by_domain)
            });
    resolved.into()
}

fn resolve_roles<R>(
    resolver: &dyn RoleResolver<Role = R>,
    records: Vec<RoleRecord>,
) -> AuthorizationLookup<Vec<R>> {
    if records.is_empty() {
        return AuthorizationLookup::NotFound;
    }

    let resolved: Result<Vec<R>, ResolveError> = records
        .into_iter()
        .map(|record| {
            let title = record.title.ok_or(ResolveError::MissingField("title"))?;
            resolver.resolve(&title)
        })
        .collect();
    resolved.into()
}

/// 把查询结果折叠为 `Option`，转换失败记录日志与指标
fn fail_soft<T>(
    operation: &'static str,
    identifier: &str,
    lookup: AuthorizationLookup<T>,
) -> Option<T> {
    match &lookup {
        AuthorizationLookup::Found(_) => {}
        AuthorizationLookup::NotFound => {
            debug!(identifier = %identifier, operation, "No authorization records found");
        }
        AuthorizationLookup::Unresolvable(e) => {
            warn!(
                identifier = %identifier,
                operation,
                error = %e,
                "Authorization records could not be resolved"
            );
            counter!(FAIL_SOFT_METRIC, "operation" => operation).increment(1);
        }
    }
    lookup.into_option()
}

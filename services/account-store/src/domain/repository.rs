//! 账户仓储接口

use async_trait::async_trait;
use warden_errors::AppResult;

use super::account::CredentialRecord;
use super::permission::RawPermissionGroup;
use super::role::RoleRecord;

/// 账户仓储
///
/// 所有查询都以用户的 `identifier` 为入口，未知用户返回空集合而不是错误。
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// 用户的全部凭证
    async fn find_credentials(&self, identifier: &str) -> AppResult<Vec<CredentialRecord>>;

    /// 按 (domain, resource) 聚合的有效权限
    async fn find_permission_groups(&self, identifier: &str) -> AppResult<Vec<RawPermissionGroup>>;

    /// 用户所属角色
    async fn find_roles(&self, identifier: &str) -> AppResult<Vec<RoleRecord>>;

    /// 设置或清除锁定时间（毫秒时间戳），返回受影响行数
    async fn set_account_lock(&self, identifier: &str, lock_millis: Option<i64>) -> AppResult<u64>;
}

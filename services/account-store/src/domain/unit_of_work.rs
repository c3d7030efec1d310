//! Unit of Work 模式
//!
//! 每次账户查询都在自己的事务中完成。提交之前被丢弃的 Unit of Work 会回滚。

use async_trait::async_trait;
use warden_adapter_postgres::AccessMode;
use warden_errors::AppResult;

use super::repository::AccountRepository;

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取账户 Repository
    fn accounts(&self) -> &dyn AccountRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 以指定访问模式开始新的事务
    async fn begin(&self, mode: AccessMode) -> AppResult<Box<dyn UnitOfWork>>;
}

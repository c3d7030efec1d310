//! PostgreSQL Unit of Work 实现

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;
use warden_adapter_postgres::{AccessMode, TransactionManager, TransactionOptions};
use warden_errors::{AppError, AppResult};

use super::account_repository::{SharedTx, TxAccountRepository};
use crate::domain::{AccountRepository, UnitOfWork, UnitOfWorkFactory};

/// Postgres Unit of Work 工厂，每次 `begin` 从连接池取一个新事务
#[derive(Clone)]
pub struct PostgresUnitOfWorkFactory {
    manager: TransactionManager,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            manager: TransactionManager::new(pool),
        }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    async fn begin(&self, mode: AccessMode) -> AppResult<Box<dyn UnitOfWork>> {
        let options = TransactionOptions::new().with_access_mode(mode);
        let tx = self.manager.begin_with_options(&options).await?;

        Ok(Box::new(PostgresUnitOfWork::new(tx)))
    }
}

/// Postgres Unit of Work
///
/// 未提交即被丢弃时，内部事务随之回滚并归还连接。
pub struct PostgresUnitOfWork {
    tx: SharedTx,
    account_repo: TxAccountRepository,
}

impl PostgresUnitOfWork {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        let tx = Arc::new(Mutex::new(Some(tx)));

        Self {
            account_repo: TxAccountRepository::new(tx.clone()),
            tx,
        }
    }

    async fn take(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed"))
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    fn accounts(&self) -> &dyn AccountRepository {
        &self.account_repo
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let tx = self.take().await?;
        TransactionManager::commit(tx).await?;
        debug!("Unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let tx = self.take().await?;
        TransactionManager::rollback(tx).await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}

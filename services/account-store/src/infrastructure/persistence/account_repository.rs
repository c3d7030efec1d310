//! 事务内的账户仓储
//!
//! 所有查询共享 Unit of Work 持有的同一个事务。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;
use warden_errors::{AppError, AppResult};

use super::db_metrics::QueryTimer;
use super::error_mapper::map_sqlx_error;
use super::queries;
use crate::domain::{AccountRepository, CredentialRecord, RawPermissionGroup, RoleRecord};

/// 共享事务
pub type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

pub struct TxAccountRepository {
    tx: SharedTx,
}

impl TxAccountRepository {
    pub fn new(tx: SharedTx) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AccountRepository for TxAccountRepository {
    async fn find_credentials(&self, identifier: &str) -> AppResult<Vec<CredentialRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let timer = QueryTimer::new("credential", "find_credentials");
        let rows = timer
            .observe(
                sqlx::query_as::<_, CredentialRow>(queries::CREDENTIALS)
                    .bind(identifier)
                    .fetch_all(&mut **tx)
                    .await,
            )
            .map_err(map_sqlx_error)?;

        debug!(identifier = %identifier, rows = rows.len(), "Loaded credentials");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_permission_groups(&self, identifier: &str) -> AppResult<Vec<RawPermissionGroup>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let timer = QueryTimer::new("permission", "find_permission_groups");
        let rows = timer
            .observe(
                sqlx::query_as::<_, PermissionGroupRow>(queries::PERMISSION_GROUPS)
                    .bind(identifier)
                    .fetch_all(&mut **tx)
                    .await,
            )
            .map_err(map_sqlx_error)?;

        debug!(identifier = %identifier, groups = rows.len(), "Loaded permission groups");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_roles(&self, identifier: &str) -> AppResult<Vec<RoleRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let timer = QueryTimer::new("role", "find_roles");
        let rows = timer
            .observe(
                sqlx::query_as::<_, RoleRow>(queries::ROLES)
                    .bind(identifier)
                    .fetch_all(&mut **tx)
                    .await,
            )
            .map_err(map_sqlx_error)?;

        debug!(identifier = %identifier, roles = rows.len(), "Loaded roles");
        Ok(rows
            .into_iter()
            .map(|row| RoleRecord { title: row.title })
            .collect())
    }

    async fn set_account_lock(&self, identifier: &str, lock_millis: Option<i64>) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?;

        let timer = QueryTimer::new("user", "set_account_lock");
        let result = timer
            .observe(
                sqlx::query(queries::SET_ACCOUNT_LOCK)
                    .bind(identifier)
                    .bind(lock_millis)
                    .execute(&mut **tx)
                    .await,
            )
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    credential: String,
    credential_type: String,
    expiration_dt: DateTime<Utc>,
    account_lock_millis: Option<i64>,
    phone_number: Option<String>,
}

impl From<CredentialRow> for CredentialRecord {
    fn from(row: CredentialRow) -> Self {
        Self {
            credential: SecretString::new(row.credential),
            credential_type: row.credential_type,
            expiration_dt: row.expiration_dt,
            account_lock_millis: row.account_lock_millis,
            phone_number: row.phone_number,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PermissionGroupRow {
    domain_id: Option<i32>,
    resource_id: Option<i32>,
    domain_name: Option<String>,
    action_names: Option<Vec<Option<String>>>,
    resource_names: Option<Vec<Option<String>>>,
}

impl From<PermissionGroupRow> for RawPermissionGroup {
    fn from(row: PermissionGroupRow) -> Self {
        Self {
            domain_id: row.domain_id,
            resource_id: row.resource_id,
            domain: row.domain_name,
            actions: row.action_names,
            resources: row.resource_names,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    title: Option<String>,
}

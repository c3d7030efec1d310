//! 持久化层模块

pub mod account_repository;
pub mod db_metrics;
pub mod error_mapper;
pub mod queries;
pub mod unit_of_work;

pub use account_repository::{SharedTx, TxAccountRepository};
pub use unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkFactory};

/// 账户表结构迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

//! account-store - RBAC 账户存储
//!
//! 从扁平 RBAC 表结构中读取用户的凭证、角色与有效权限，并维护账户锁定状态。

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{AccountStore, DefaultAccountStore};
pub use error::AccountStoreError;
pub use infrastructure::persistence::{MIGRATOR, PostgresUnitOfWorkFactory};

use thiserror::Error;
use warden_errors::AppError;

use crate::domain::{CredentialKind, ResolveError};

#[derive(Debug, Error)]
pub enum AccountStoreError {
    #[error("Identifier must not be empty")]
    EmptyIdentifier,

    #[error("{0} resolver is not configured")]
    ResolverNotConfigured(&'static str),

    #[error("Credential '{kind}' could not be resolved: {source}")]
    CredentialUnresolvable {
        kind: CredentialKind,
        source: ResolveError,
    },

    #[error("Account lock timestamp out of range: {0}")]
    LockOutOfRange(i64),
}

impl From<AccountStoreError> for AppError {
    fn from(error: AccountStoreError) -> Self {
        match error {
            AccountStoreError::EmptyIdentifier => AppError::validation(error.to_string()),
            AccountStoreError::ResolverNotConfigured(_) => {
                AppError::configuration(error.to_string())
            }
            AccountStoreError::CredentialUnresolvable { .. }
            | AccountStoreError::LockOutOfRange(_) => AppError::internal(error.to_string()),
        }
    }
}

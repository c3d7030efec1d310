//! 数据库错误映射
//!
//! 账户存储只读写少量列，约束冲突通常意味着外部管理流程写入了非法数据。

use warden_errors::AppError;

/// 将 SQLx 错误转换为 AppError，按 SQLSTATE 区分
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => AppError::conflict("Duplicate entry violates unique constraint"),
            Some("23503") => AppError::validation("Foreign key constraint violation"),
            Some("23502") => AppError::validation("Not null constraint violation"),
            Some("22003") => AppError::validation("Numeric value out of range"),
            // 只读事务中尝试写入
            Some("25006") => AppError::internal("Write attempted in a read-only transaction"),
            Some("40001") => AppError::conflict("Serialization failure, retry the operation"),
            Some(code) => AppError::database(format!("Database error ({}): {}", code, db_err)),
            None => AppError::database(db_err.to_string()),
        },
        sqlx::Error::ColumnDecode { index, source } => {
            AppError::internal(format!("Failed to decode column {}: {}", index, source))
        }
        sqlx::Error::ColumnNotFound(column) => {
            AppError::internal(format!("Column not found: {}", column))
        }
        sqlx::Error::PoolTimedOut => AppError::internal("Database connection pool timeout"),
        sqlx::Error::PoolClosed => AppError::internal("Database connection pool is closed"),
        sqlx::Error::Protocol(msg) => AppError::internal(format!("Database protocol error: {}", msg)),
        _ => AppError::database(e.to_string()),
    }
}

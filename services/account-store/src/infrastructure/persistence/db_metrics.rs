//! 查询监控

use metrics::{counter, histogram};
use std::time::Instant;

/// 慢查询阈值（毫秒）
const SLOW_QUERY_MS: u128 = 100;

pub struct DbMetrics;

impl DbMetrics {
    /// 记录查询耗时与次数
    pub fn record_query(start: Instant, table: &'static str, operation: &'static str) {
        histogram!(
            "db_query_duration_ms",
            "table" => table,
            "operation" => operation
        )
        .record(start.elapsed().as_millis() as f64);

        counter!("db_queries_total", "table" => table, "operation" => operation).increment(1);
    }

    pub fn record_error(table: &'static str, operation: &'static str) {
        counter!("db_query_errors_total", "table" => table, "operation" => operation).increment(1);
    }
}

/// 查询计时器
pub struct QueryTimer {
    start: Instant,
    table: &'static str,
    operation: &'static str,
}

impl QueryTimer {
    pub fn new(table: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            table,
            operation,
        }
    }

    /// 按查询结果记录，原样返回结果
    pub fn observe<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.finish(),
            Err(_) => self.finish_with_error(),
        }
        result
    }

    pub fn finish(self) {
        DbMetrics::record_query(self.start, self.table, self.operation);
        self.warn_if_slow();
    }

    pub fn finish_with_error(self) {
        DbMetrics::record_query(self.start, self.table, self.operation);
        DbMetrics::record_error(self.table, self.operation);
        self.warn_if_slow();
    }

    fn warn_if_slow(&self) {
        let duration_ms = self.start.elapsed().as_millis();
        if duration_ms > SLOW_QUERY_MS {
            tracing::warn!(
                table = self.table,
                operation = self.operation,
                duration_ms = %duration_ms,
                "Slow query detected"
            );
        }
    }
}

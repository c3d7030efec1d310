//! 进行中请求合并
//!
//! 同一个 key 的并发调用只执行一次，其余调用者等待并共享结果。
//! 调用结束即移除记录，不缓存结果。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use warden_errors::AppResult;

type Outcome<T> = AppResult<T>;
type Calls<T> = Mutex<HashMap<String, broadcast::Sender<Outcome<T>>>>;

pub struct SingleFlight<T> {
    calls: Calls<T>,
}

enum Turn<T> {
    Leader,
    Follower(broadcast::Receiver<Outcome<T>>),
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// 执行 `f`，若同一 key 已有调用在进行中则等待其结果
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        loop {
            match self.join(key) {
                Turn::Follower(mut rx) => match rx.recv().await {
                    Ok(outcome) => return outcome,
                    // 领头调用被取消，重新竞争
                    Err(_) => continue,
                },
                Turn::Leader => {
                    let flight = Flight {
                        calls: &self.calls,
                        key,
                        landed: false,
                    };
                    let result = f().await;
                    flight.land(result.clone());
                    return result;
                }
            }
        }
    }

    /// 进行中的 key 数量
    pub fn in_flight(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // 检查与登记在同一把锁内完成
    fn join(&self, key: &str) -> Turn<T> {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        match calls.get(key) {
            Some(tx) => Turn::Follower(tx.subscribe()),
            None => {
                let (tx, _) = broadcast::channel(1);
                calls.insert(key.to_string(), tx);
                Turn::Leader
            }
        }
    }
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 领头调用的登记，被丢弃时注销
struct Flight<'a, T> {
    calls: &'a Calls<T>,
    key: &'a str,
    landed: bool,
}

impl<T> Flight<'_, T> {
    fn land(mut self, outcome: Outcome<T>) {
        self.landed = true;
        let tx = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
        if let Some(tx) = tx {
            let _ = tx.send(outcome);
        }
    }
}

impl<T> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        if !self.landed {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..10 {
            let flight = flight.clone();
            let executions = executions.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("thedude", || {
                        let executions = executions.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(executions.fetch_add(1, Ordering::SeqCst))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_results_are_not_cached() {
        let flight = SingleFlight::<usize>::new();
        let counter = AtomicUsize::new(0);
        let executions = &counter;

        for expected in 0..2 {
            let value = flight
                .run("walter", || async move { Ok(executions.fetch_add(1, Ordering::SeqCst)) })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn test_error_is_shared_with_waiters() {
        let flight = Arc::new(SingleFlight::<usize>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("donny", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(AppError::database("connection reset"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower = flight.run("donny", || async { Ok(1) }).await;

        assert!(matches!(leader.await.unwrap(), Err(AppError::Database(_))));
        assert!(matches!(follower, Err(AppError::Database(msg)) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let call = |flight: Arc<SingleFlight<usize>>, executions: Arc<AtomicUsize>| async move {
            flight
                .run("bunny", || {
                    let executions = executions.clone();
                    async move {
                        let n = executions.fetch_add(1, Ordering::SeqCst);
                        if n == 0 {
                            tokio::time::sleep(Duration::from_secs(3600)).await;
                        }
                        Ok(n)
                    }
                })
                .await
        };

        let leader = tokio::spawn(call(flight.clone(), executions.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower = tokio::spawn(call(flight.clone(), executions.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert_eq!(follower.await.unwrap().unwrap(), 1);
        assert_eq!(flight.in_flight(), 0);
    }
}

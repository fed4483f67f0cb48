//! 指数退避重试策略
//!
//! 仅用于 Agent 侧的发布路径（心跳、事件上报）。
//! 派发协议本身从不重试。

use backoff::{future::retry, Error as BackoffError, ExponentialBackoff};
use std::time::Duration;

/// 心跳发布的重试策略
pub fn heartbeat_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_millis(30000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(300)),
        randomization_factor: 0.1,
        ..Default::default()
    }
}

/// 一般网络发布的重试策略
pub fn network_publish_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(2000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(30)),
        randomization_factor: 0.15,
        ..Default::default()
    }
}

/// 便捷方法：执行重试操作
pub async fn execute_with_backoff<F, Fut, T, E>(
    operation: F,
    backoff: ExponentialBackoff,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display + Send + 'static,
{
    let mut op = operation;
    let wrapped_operation = move || {
        let fut = op();
        async move { fut.await.map_err(BackoffError::transient) }
    };

    // backoff::future::retry 在失败时返回底层错误类型 E
    retry(backoff, wrapped_operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = execute_with_backoff(
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            },
            ExponentialBackoff {
                initial_interval: Duration::from_millis(1),
                max_elapsed_time: Some(Duration::from_secs(1)),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}

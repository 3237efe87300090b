//! 埋め込み呼び出しのリトライ
//!
//! 1回ごとにタイムアウトをかけ、失敗したら一定時間待って再試行する。

use crate::config::Config;
use crate::error::{BoqMatchError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 試行回数（初回を含む）
    pub attempts: u32,
    pub delay: Duration,
    /// 1回あたりのタイムアウト
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            timeout: config.timeout(),
        }
    }
}

/// `op` をポリシーに従って実行する。最後のエラーを返す。
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        tracing::debug!("{}: attempt {} of {}", label, attempt, attempts);

        let error = match timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => BoqMatchError::Timeout(policy.timeout.as_secs()),
        };

        if attempt < attempts {
            tracing::warn!(
                "{} failed (attempt {}/{}): {}. retrying in {:?}",
                label,
                attempt,
                attempts,
                error,
                policy.delay
            );
            sleep(policy.delay).await;
        }
        last_error = Some(error);
    }

    Err(last_error
        .unwrap_or_else(|| BoqMatchError::EmbeddingApi(format!("{}: no attempt made", label))))
}

//! 重试策略执行（RetryPolicy）
//!
//! 瞬时故障且策略允许时：通知、等待、以全新调用重试；否则原样传播。
//! 取消信号在每次新尝试前（以及等待期间）检查，取消从不视为瞬时。
//!
use super::detection::{TransientErrorCatchAll, TransientErrorDetection};
use super::strategy::RetryStrategy;
use crate::error::{Canceled, FilterContractViolation, MediatorError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 一次被允许的重试
#[derive(Debug)]
pub struct Retrying<'a> {
    /// 第几次重试（从 1 开始）
    pub attempt: u32,
    pub cause: &'a anyhow::Error,
    pub delay: Duration,
}

type RetryingCallback = Arc<dyn Fn(&Retrying<'_>) + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    detection: Arc<dyn TransientErrorDetection>,
    strategy: RetryStrategy,
    on_retrying: Option<RetryingCallback>,
}

impl RetryPolicy {
    pub fn new(detection: impl TransientErrorDetection + 'static, strategy: RetryStrategy) -> Self {
        Self {
            detection: Arc::new(detection),
            strategy,
            on_retrying: None,
        }
    }

    /// 任意故障都重试
    pub fn catch_all(strategy: RetryStrategy) -> Self {
        Self::new(TransientErrorCatchAll, strategy)
    }

    /// 不重试
    pub fn no_retry() -> Self {
        Self::catch_all(RetryStrategy::none())
    }

    /// 每次被允许的重试前回调（仅观察）
    pub fn on_retrying(mut self, callback: impl Fn(&Retrying<'_>) + Send + Sync + 'static) -> Self {
        self.on_retrying = Some(Arc::new(callback));
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// 取消与过滤器契约违规从不视为瞬时
    pub fn is_transient(&self, error: &anyhow::Error) -> bool {
        if error.is::<Canceled>() || error.is::<FilterContractViolation>() {
            return false;
        }
        if let Some(
            MediatorError::Canceled { .. } | MediatorError::FilterContract(_),
        ) = error.downcast_ref::<MediatorError>()
        {
            return false;
        }
        self.detection.is_transient(error)
    }

    /// 同步执行（等待期间阻塞当前线程）
    pub fn execute<T, F>(&self, mut work: F) -> anyhow::Result<T>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        let mut retries = 0u32;
        loop {
            let error = match work() {
                Ok(value) => {
                    if retries > 0 {
                        debug!(attempts = retries + 1, "operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let Some(delay) = self.authorize(retries, &error) else {
                return Err(error);
            };
            retries += 1;
            self.notify(retries, &error, delay);

            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }

    /// 异步执行；取消后不再发起新的尝试
    ///
    /// 尚未执行任何尝试即被取消时返回 [`Canceled`]，否则返回最后一次故障。
    pub async fn execute_async<T, F, Fut>(&self, mut work: F, cancellation: &CancellationToken) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut retries = 0u32;
        let mut last: Option<anyhow::Error> = None;
        loop {
            if cancellation.is_cancelled() {
                return Err(last.unwrap_or_else(|| anyhow::Error::new(Canceled)));
            }

            let error = match work().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(attempts = retries + 1, "operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let Some(delay) = self.authorize(retries, &error) else {
                return Err(error);
            };
            retries += 1;
            self.notify(retries, &error, delay);

            if !delay.is_zero() {
                tokio::select! {
                    _ = cancellation.cancelled() => return Err(error),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            last = Some(error);
        }
    }

    /// 已重试 `retries` 次后是否允许再试；首次重试在启用快速重试时不等待
    fn authorize(&self, retries: u32, error: &anyhow::Error) -> Option<Duration> {
        if !self.is_transient(error) {
            debug!(error = %error, "non-transient fault, not retrying");
            return None;
        }
        let Some(delay) = self.strategy.should_retry(retries) else {
            warn!(
                retries,
                error = %error,
                "retry limit reached"
            );
            return None;
        };
        if retries == 0 && self.strategy.fast_first_retry() {
            return Some(Duration::ZERO);
        }
        Some(delay)
    }

    fn notify(&self, attempt: u32, cause: &anyhow::Error, delay: Duration) {
        warn!(attempt, ?delay, error = %cause, "transient fault, retrying");
        if let Some(callback) = &self.on_retrying {
            callback(&Retrying { attempt, cause, delay });
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::catch_all(RetryStrategy::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("on_retrying", &self.on_retrying.is_some())
            .finish()
    }
}

//! 重试策略：已重试次数 → 是否允许再试及其延迟
//!
use rand::Rng;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RetryStrategy {
    /// 从不重试
    None,
    /// 固定间隔
    FixedInterval {
        retry_count: u32,
        interval: Duration,
        fast_first_retry: bool,
    },
    /// 线性递增：`initial + increment × 已重试次数`
    Incremental {
        retry_count: u32,
        initial: Duration,
        increment: Duration,
        fast_first_retry: bool,
    },
    /// 指数退避（带 ±20% 抖动），上限 `max_backoff`
    ExponentialBackoff {
        retry_count: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        delta_backoff: Duration,
        fast_first_retry: bool,
    },
}

impl RetryStrategy {
    pub const DEFAULT_RETRY_COUNT: u32 = 10;
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
    pub const DEFAULT_DELTA_BACKOFF: Duration = Duration::from_secs(10);

    pub fn none() -> Self {
        RetryStrategy::None
    }

    pub fn fixed(retry_count: u32, interval: Duration) -> Self {
        RetryStrategy::FixedInterval {
            retry_count,
            interval,
            fast_first_retry: true,
        }
    }

    pub fn incremental(retry_count: u32, initial: Duration, increment: Duration) -> Self {
        RetryStrategy::Incremental {
            retry_count,
            initial,
            increment,
            fast_first_retry: true,
        }
    }

    pub fn exponential(
        retry_count: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        delta_backoff: Duration,
    ) -> Self {
        RetryStrategy::ExponentialBackoff {
            retry_count,
            min_backoff,
            max_backoff,
            delta_backoff,
            fast_first_retry: true,
        }
    }

    pub fn with_fast_first_retry(mut self, enabled: bool) -> Self {
        match &mut self {
            RetryStrategy::None => {}
            RetryStrategy::FixedInterval { fast_first_retry, .. }
            | RetryStrategy::Incremental { fast_first_retry, .. }
            | RetryStrategy::ExponentialBackoff { fast_first_retry, .. } => *fast_first_retry = enabled,
        }
        self
    }

    /// 首次重试是否立即执行（不等待）
    pub fn fast_first_retry(&self) -> bool {
        match self {
            RetryStrategy::None => false,
            RetryStrategy::FixedInterval { fast_first_retry, .. }
            | RetryStrategy::Incremental { fast_first_retry, .. }
            | RetryStrategy::ExponentialBackoff { fast_first_retry, .. } => *fast_first_retry,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            RetryStrategy::None => 0,
            RetryStrategy::FixedInterval { retry_count, .. }
            | RetryStrategy::Incremental { retry_count, .. }
            | RetryStrategy::ExponentialBackoff { retry_count, .. } => *retry_count,
        }
    }

    /// 已重试 `attempt` 次后是否允许再试；允许时给出延迟
    pub fn should_retry(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.retry_count() {
            return None;
        }
        let delay = match *self {
            RetryStrategy::None => return None,
            RetryStrategy::FixedInterval { interval, .. } => interval,
            RetryStrategy::Incremental {
                initial, increment, ..
            } => initial.saturating_add(increment.saturating_mul(attempt)),
            RetryStrategy::ExponentialBackoff {
                min_backoff,
                max_backoff,
                delta_backoff,
                ..
            } => {
                let jitter = rand::thread_rng().gen_range(0.8..1.2);
                exponential_delay(attempt, min_backoff, max_backoff, delta_backoff, jitter)
            }
        };
        Some(delay)
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::fixed(Self::DEFAULT_RETRY_COUNT, Self::DEFAULT_RETRY_INTERVAL)
    }
}

fn exponential_delay(
    attempt: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    delta_backoff: Duration,
    jitter: f64,
) -> Duration {
    let growth = 2f64.powi(attempt.min(i32::MAX as u32) as i32) - 1.0;
    let secs = min_backoff.as_secs_f64() + jitter * delta_backoff.as_secs_f64() * growth;
    let capped = secs.min(max_backoff.as_secs_f64()).max(0.0);
    Duration::try_from_secs_f64(capped).unwrap_or(max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn fixed_authorizes_exactly_n_retries() {
        let s = RetryStrategy::fixed(3, 10 * MS);
        assert_eq!(s.should_retry(0), Some(10 * MS));
        assert_eq!(s.should_retry(2), Some(10 * MS));
        assert_eq!(s.should_retry(3), None);
    }

    #[test]
    fn incremental_grows_linearly() {
        let s = RetryStrategy::incremental(5, 100 * MS, 50 * MS);
        assert_eq!(s.should_retry(0), Some(100 * MS));
        assert_eq!(s.should_retry(1), Some(150 * MS));
        assert_eq!(s.should_retry(4), Some(300 * MS));
        assert_eq!(s.should_retry(5), None);
    }

    #[test]
    fn exponential_formula_and_cap() {
        let min = 100 * MS;
        let max = 1000 * MS;
        let delta = 100 * MS;
        assert_eq!(exponential_delay(0, min, max, delta, 1.0), min);
        assert_eq!(exponential_delay(1, min, max, delta, 1.0), 200 * MS);
        assert_eq!(exponential_delay(2, min, max, delta, 1.0), 400 * MS);
        assert_eq!(exponential_delay(10, min, max, delta, 1.0), max);
        assert_eq!(exponential_delay(u32::MAX, min, max, delta, 1.2), max);
    }

    #[test]
    fn exponential_jitter_stays_in_band() {
        let s = RetryStrategy::exponential(4, 100 * MS, 10_000 * MS, 100 * MS);
        for _ in 0..50 {
            let d = s.should_retry(3).unwrap();
            // 100ms + [0.8, 1.2) × 100ms × 7
            assert!(d >= 660 * MS && d <= 940 * MS, "{d:?}");
        }
    }

    #[test]
    fn none_never_retries() {
        assert_eq!(RetryStrategy::none().should_retry(0), None);
        assert!(!RetryStrategy::none().with_fast_first_retry(true).fast_first_retry());
    }
}

//! 重试退避策略
//!
//! 指数退避 + 随机抖动，失败次数用尽后进入死信队列。

use rand::RngExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl BackoffPolicy {
    /// 第 `attempt` 次尝试失败后，是否还有重试机会
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 第 `attempt` 次失败后的等待时间（毫秒）
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        calculate_backoff(attempt.max(1), self.base_delay_ms, self.max_delay_ms)
    }
}

/// 计算指数退避延迟（带 0-25% 抖动）
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exp_delay = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp_delay.min(max_ms);
    let jitter = rand::rng().random_range(0..=capped / 4);
    capped.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_exponential() {
        let delay1 = calculate_backoff(1, 100, 2000);
        assert!((100..=125).contains(&delay1));

        let delay2 = calculate_backoff(2, 100, 2000);
        assert!((200..=250).contains(&delay2));

        let delay3 = calculate_backoff(3, 100, 2000);
        assert!((400..=500).contains(&delay3));
    }

    #[test]
    fn test_calculate_backoff_capped_at_max() {
        let delay = calculate_backoff(10, 100, 2000);
        assert!((2000..=2500).contains(&delay));
    }

    #[test]
    fn test_should_retry_counts_first_attempt() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_zero_base_delay() {
        let policy = BackoffPolicy {
            max_attempts: 2,
            base_delay_ms: 0,
            max_delay_ms: 0,
        };
        assert_eq!(policy.delay_ms(1), 0);
    }
}

use std::time::Duration;

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use aipsync_fetch::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(1, Duration::from_millis(100)), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_basic() {
        let base = Duration::from_millis(100);

        assert_eq!(retry_delay(0, base), Duration::from_millis(100));
        assert_eq!(retry_delay(1, base), Duration::from_millis(200));
        assert_eq!(retry_delay(2, base), Duration::from_millis(400));
        assert_eq!(retry_delay(3, base), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_delay_zero_base() {
        let base = Duration::ZERO;

        assert_eq!(retry_delay(0, base), Duration::ZERO);
        assert_eq!(retry_delay(10, base), Duration::ZERO);
    }

    #[test]
    fn test_retry_delay_overflow_protection() {
        let base = Duration::from_secs(u64::MAX / 2);
        assert!(retry_delay(40, base) > Duration::ZERO);
    }
}

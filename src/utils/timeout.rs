//! Timeout validation for page-load tuning values

use std::time::Duration;

/// Maximum timeout for navigation (5 minutes)
/// Covers slow-loading storefronts, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum settle wait after navigation (1 minute)
pub const MAX_SETTLE_WAIT_MS: u64 = 60_000;

/// Validate a navigation timeout
///
/// # Arguments
/// * `timeout_ms` - Optional timeout in milliseconds
/// * `default_ms` - Default timeout if None provided
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(String)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
///
/// # Example
/// ```rust
/// use kodegen_tools_product_scraper::utils::validate_navigation_timeout;
/// let timeout = validate_navigation_timeout(Some(45000), 30000).unwrap();
/// assert_eq!(timeout.as_millis(), 45000);
/// ```
pub fn validate_navigation_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, String> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms == 0 {
        return Err("Navigation timeout must be greater than 0ms".to_string());
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(format!(
            "Timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        ));
    }

    Ok(Duration::from_millis(ms))
}

/// Validate the settle wait applied after navigation
pub fn validate_settle_wait(wait_ms: Option<u64>, default_ms: u64) -> Result<Duration, String> {
    let ms = wait_ms.unwrap_or(default_ms);

    if ms > MAX_SETTLE_WAIT_MS {
        return Err(format!(
            "Settle wait cannot exceed {}ms ({} seconds). Received: {}ms ({} seconds)",
            MAX_SETTLE_WAIT_MS,
            MAX_SETTLE_WAIT_MS / 1000,
            ms,
            ms / 1000
        ));
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_timeout_uses_default_and_bounds() {
        assert_eq!(
            validate_navigation_timeout(None, 30_000).unwrap(),
            Duration::from_secs(30)
        );
        assert!(validate_navigation_timeout(Some(0), 30_000).is_err());
        assert!(validate_navigation_timeout(Some(MAX_NAVIGATION_TIMEOUT_MS + 1), 30_000).is_err());
    }

    #[test]
    fn settle_wait_allows_zero() {
        assert_eq!(validate_settle_wait(Some(0), 3000).unwrap(), Duration::ZERO);
        assert!(validate_settle_wait(Some(MAX_SETTLE_WAIT_MS + 1), 3000).is_err());
    }
}

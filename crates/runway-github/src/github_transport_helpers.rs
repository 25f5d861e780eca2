use std::time::Duration;

const RETRY_DELAY_CAP_MS: u64 = 30_000;
const RETRY_AFTER_CAP_SECONDS: u64 = 120;

/// Returns true for statuses worth retrying: rate limiting and server errors.
pub fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Parses a `retry-after` header expressed in whole seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    let seconds = raw.parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds.min(RETRY_AFTER_CAP_SECONDS)))
}

/// Exponential backoff from `base_delay_ms`, never shorter than `retry_after`.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
    let backoff_ms = base_delay_ms
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(RETRY_DELAY_CAP_MS);
    let backoff = Duration::from_millis(backoff_ms);
    match retry_after {
        Some(retry_after) if retry_after > backoff => retry_after,
        _ => backoff,
    }
}

pub fn truncate_for_error(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let mut truncated = raw.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

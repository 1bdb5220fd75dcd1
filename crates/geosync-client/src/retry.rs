//! Bounded exponential backoff for repository and GeoServer traffic.
//!
//! Only transient transport failures are retried. Any HTTP response,
//! including 4xx and 5xx, is returned to the caller immediately for status
//! inspection. [`retry_transient`] is public so that multi-step transfers
//! outside this crate (streamed downloads) follow the same policy as
//! single requests.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Maximum number of retry attempts after the initial try.
pub const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Delay before retry number `attempt` (zero-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt))
}

/// Run `f` until it succeeds, fails with an error `is_transient` rejects,
/// or `MAX_RETRIES` retries are spent. The last error is returned.
///
/// `f` is called afresh for every attempt, so it must rebuild whatever a
/// failed attempt consumed (a sent request, a half-written file).
pub async fn retry_transient<T, E, F, Fut>(
    operation: &str,
    is_transient: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                let delay = backoff_delay(attempt);
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = MAX_RETRIES,
                    "transient failure, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Send an HTTP request, retrying connection-level failures.
pub(crate) async fn retry_send<F, Fut>(
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    retry_transient(endpoint, |_| true, f).await
}

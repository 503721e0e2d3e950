//! Fixed-schedule retry for idempotent node queries.
//!
//! Reads against a node (account lookups, simulations, tx polls) are retried
//! on a fixed schedule; state-changing calls such as broadcast never go
//! through here.
use std::future::Future;

use tokio::time::{sleep, Duration};

const ATTEMPTS: u32 = 5;
const DELAY: Duration = Duration::from_secs(1);

/// Runs an idempotent async operation up to five times with a one second
/// pause between attempts, returning the first success or the last error.
pub async fn with_retry<F, Fut, T, E>(mut op: F, what: &str) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!("{what} failed (attempt {attempt}/{ATTEMPTS}): {err}");
                sleep(DELAY).await;
            }
        }
    }

    op().await
}

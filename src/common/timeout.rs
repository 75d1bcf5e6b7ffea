//! Time budget for collaborator calls

use std::future::Future;
use std::time::Duration;

use super::errors::{RepricerError, Result};

/// Run a collaborator call with a deadline
///
/// An elapsed deadline becomes `RepricerError::Timeout` naming the call.
pub async fn with_timeout<T, F>(call: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepricerError::Timeout(format!(
            "{} exceeded {} ms",
            call,
            limit.as_millis()
        ))),
    }
}

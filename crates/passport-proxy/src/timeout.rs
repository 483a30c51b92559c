//! Optional deadlines around blocking network steps.

use crate::error::{ProxyError, Result};
use std::future::Future;
use std::time::Duration;

/// Await `fut`, failing with [`ProxyError::Timeout`] if `limit` elapses.
///
/// With `limit == None` the future is awaited without a deadline.
pub(crate) async fn within<T, F>(limit: Option<Duration>, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout {
                operation: operation.to_string(),
                secs: limit.as_secs_f64(),
            }),
        },
    }
}

//! Global shutdown signal for graceful termination.

use std::future::Future;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

/// Global cancellation token for Ctrl+C handling.
pub static SHUTDOWN: Lazy<CancellationToken> = Lazy::new(CancellationToken::new);

/// Runs `fut` unless `token` is cancelled first, in which case `fut` is
/// dropped and `None` is returned.
pub async fn until_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

//! Access-token refresh and single retry around protected calls.
//!
//! A protected call that fails authentication triggers one token refresh.
//! If the refresh succeeds the call is replayed once and its outcome is
//! final. If the refresh fails, the caller gets the original outcome back.
//! Login and refresh calls are never retried, since refreshing cannot fix
//! them and retrying a refresh would loop.

use crate::error::ClientResult;
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

/// What kind of request is being gated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Login,
    Refresh,
    Protected,
}

impl CallKind {
    fn refreshable(self) -> bool {
        self == CallKind::Protected
    }
}

/// Obtains a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> ClientResult<()>;
}

/// Runs calls under the refresh-and-retry-once contract.
pub struct TokenRefreshGate<'a, R: ?Sized> {
    refresher: &'a R,
}

impl<'a, R: TokenRefresher + ?Sized> TokenRefreshGate<'a, R> {
    pub fn new(refresher: &'a R) -> Self {
        Self { refresher }
    }

    /// Runs `op`, replaying it at most once after a successful refresh.
    ///
    /// `op` must build a fresh request on each invocation so the replay
    /// picks up the new token.
    pub async fn call<T, F, Fut>(&self, kind: CallKind, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let first = op().await;

        let auth_failed = matches!(&first, Err(e) if e.is_auth_failure());
        if !auth_failed || !kind.refreshable() {
            return first;
        }

        debug!("authentication failed, refreshing token");
        match self.refresher.refresh().await {
            Ok(()) => {
                debug!("token refreshed, retrying once");
                op().await
            }
            Err(e) => {
                warn!("token refresh failed: {e}");
                first
            }
        }
    }
}

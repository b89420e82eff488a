//! Request context
//!
//! Carries the caller's cancellation signal and optional deadline down to
//! backend calls. Cancellation is best-effort: the backend future is raced
//! against the signal and dropped when the signal wins.

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` until it completes, the token is cancelled, or the deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                res = fut => res,
                _ = self.token.cancelled() => Err(AppError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(AppError::Cancelled),
            },
            None => tokio::select! {
                res = fut => res,
                _ = self.token.cancelled() => Err(AppError::Cancelled),
            },
        }
    }
}

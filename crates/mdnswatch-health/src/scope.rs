//! Cancellation scopes with optional deadlines.
//!
//! A [`Scope`] is passed down every call in the engine: scheduler run →
//! cycle → probe → discovery query. Cancelling a scope cancels all of its
//! children; a child's deadline is never later than its parent's.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    /// The scope (or an ancestor) was cancelled explicitly.
    Cancelled,
    /// The scope's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for ScopeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeEnd::Cancelled => f.write_str("cancelled"),
            ScopeEnd::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

impl std::error::Error for ScopeEnd {}

/// Cancellation token plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Create a root scope with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Child scope sharing this scope's deadline.
    ///
    /// Cancelling the child leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child scope that ends at `deadline` or at this scope's deadline,
    /// whichever comes first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Child scope bounded to `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancel this scope and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the scope has ended, and why.
    ///
    /// Explicit cancellation wins over an elapsed deadline.
    pub fn end(&self) -> Option<ScopeEnd> {
        if self.token.is_cancelled() {
            return Some(ScopeEnd::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScopeEnd::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the scope has ended for any reason.
    pub fn is_done(&self) -> bool {
        self.end().is_some()
    }

    /// Wait until the scope ends.
    pub async fn done(&self) -> ScopeEnd {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ScopeEnd::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ScopeEnd::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ScopeEnd::Cancelled
            }
        }
    }
}

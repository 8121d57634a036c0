//! Per-call cancellation context.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::RavenError;

/// Carries an optional deadline and a cancellation token into a send.
///
/// Clones share the token, so cancelling any clone cancels all of them.
/// `child` derives a context that is cancelled with its parent but can be
/// cancelled on its own. `with_timeout` / `with_deadline` can only move the
/// deadline earlier.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Context {
    /// A context with no deadline that is never cancelled unless asked to.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one shared with a shutdown signal.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// A derived context: cancelling the parent cancels it, not the reverse.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails once the context is cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), RavenError> {
        if self.is_cancelled() {
            return Err(RavenError::Cancelled);
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(RavenError::Timeout);
        }
        Ok(())
    }
}

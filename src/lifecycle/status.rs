//! Embedding status and its guarded transitions.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Exactly one status holds at any time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Status {
    #[default]
    NoResource,
    Loading,
    Connecting,
    Ready,
    Failed(String),
}

impl Status {
    /// Forward transitions within one setup attempt.
    ///
    /// `Ready` is only reachable from `Connecting`; `Failed` is terminal.
    pub fn can_advance_to(&self, next: &Status) -> bool {
        matches!(
            (self, next),
            (Status::Loading, Status::Connecting)
                | (Status::Loading, Status::Failed(_))
                | (Status::Connecting, Status::Ready)
                | (Status::Connecting, Status::Failed(_))
                | (Status::Ready, Status::Failed(_))
        )
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Status::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Status::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NoResource => write!(f, "no resource"),
            Status::Loading => write!(f, "loading"),
            Status::Connecting => write!(f, "connecting"),
            Status::Ready => write!(f, "ready"),
            Status::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Shared status cell with a setup generation.
///
/// Every new setup attempt starts a new generation through `reset`;
/// transitions requested with an older generation are ignored, so callbacks
/// of a discarded bridge can never touch the current attempt.
#[derive(Clone, Debug)]
pub struct StatusTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    generation: Mutex<u64>,
    status: watch::Sender<Status>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (status, _) = watch::channel(Status::NoResource);
        Self {
            inner: Arc::new(TrackerInner {
                generation: Mutex::new(0),
                status,
            }),
        }
    }

    pub fn current(&self) -> Status {
        self.inner.status.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.inner.status.subscribe()
    }

    /// Start a new generation in `status`, returning the generation.
    pub(crate) fn reset(&self, status: Status) -> u64 {
        let mut generation = self.lock_generation();
        *generation += 1;
        debug!(generation = *generation, status = %status, "status reset");
        self.inner.status.send_replace(status);
        *generation
    }

    /// Apply `next` if `generation` is current and the transition is allowed.
    pub fn advance(&self, generation: u64, next: Status) -> bool {
        let current_generation = self.lock_generation();
        if *current_generation != generation {
            trace!(generation, current = *current_generation, "ignoring stale transition");
            return false;
        }

        let current = self.inner.status.borrow().clone();
        if !current.can_advance_to(&next) {
            trace!(from = %current, to = %next, "transition not allowed");
            return false;
        }

        debug!(generation, from = %current, to = %next, "status advanced");
        self.inner.status.send_replace(next);
        true
    }

    fn lock_generation(&self) -> std::sync::MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(Status::Loading.can_advance_to(&Status::Connecting));
        assert!(Status::Connecting.can_advance_to(&Status::Ready));
        assert!(Status::Ready.can_advance_to(&Status::Failed("x".into())));
        assert!(!Status::Loading.can_advance_to(&Status::Ready));
        assert!(!Status::NoResource.can_advance_to(&Status::Loading));
        assert!(!Status::Failed("x".into()).can_advance_to(&Status::Ready));
    }

    #[test]
    fn test_ready_only_from_connecting() {
        let tracker = StatusTracker::new();
        let generation = tracker.reset(Status::Loading);

        assert!(!tracker.advance(generation, Status::Ready));
        assert!(tracker.advance(generation, Status::Connecting));
        assert!(tracker.advance(generation, Status::Ready));
        assert_eq!(tracker.current(), Status::Ready);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let tracker = StatusTracker::new();
        let old = tracker.reset(Status::Loading);
        tracker.advance(old, Status::Connecting);

        let new = tracker.reset(Status::Loading);
        assert_ne!(old, new);
        assert!(!tracker.advance(old, Status::Failed("late".into())));
        assert_eq!(tracker.current(), Status::Loading);
    }

    #[test]
    fn test_failed_is_terminal() {
        let tracker = StatusTracker::new();
        let generation = tracker.reset(Status::Loading);
        assert!(tracker.advance(generation, Status::Failed("read failed".into())));
        assert!(!tracker.advance(generation, Status::Connecting));
        assert_eq!(tracker.current().failure_reason(), Some("read failed"));
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let tracker = StatusTracker::new();
        let mut rx = tracker.subscribe();
        tracker.reset(Status::Loading);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Status::Loading);
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Failed("widget crashed".into()).to_string(), "failed: widget crashed");
        assert_eq!(Status::NoResource.to_string(), "no resource");
    }
}

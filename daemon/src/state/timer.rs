//! Idle auto-return timer
//!
//! The timer holds no task or callback of its own. It records when the
//! pending expiry is due and a generation that changes on every rearm or
//! disarm; the dispatcher sleeps until `due_at` and hands the generation
//! back, so an expiry scheduled before a rearm is recognised as stale.

use std::time::Duration;

use tokio::time::Instant;

/// The single pending expiry, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDeadline {
    pub generation: u64,
    pub due_at: Instant,
}

#[derive(Debug)]
pub struct IdleTimer {
    timeout: Duration,
    due_at: Option<Instant>,
    generation: u64,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            due_at: None,
            generation: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arm (or rearm) so the timer expires `timeout` after `now`.
    /// Any previously issued deadline becomes stale.
    pub fn arm(&mut self, now: Instant) -> IdleDeadline {
        self.generation = self.generation.wrapping_add(1);
        let due_at = now + self.timeout;
        self.due_at = Some(due_at);
        IdleDeadline {
            generation: self.generation,
            due_at,
        }
    }

    pub fn disarm(&mut self) {
        if self.due_at.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
    }

    pub fn is_active(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn deadline(&self) -> Option<IdleDeadline> {
        self.due_at.map(|due_at| IdleDeadline {
            generation: self.generation,
            due_at,
        })
    }

    /// An expiry is honoured only if it belongs to the current generation
    /// and the current deadline has actually passed.
    pub fn is_expired(&self, generation: u64, now: Instant) -> bool {
        match self.due_at {
            Some(due_at) => generation == self.generation && now >= due_at,
            None => false,
        }
    }
}

//! Countdown timer shared by the items of one batch.
//!
//! A batch read or write gets one budget. Each item consumes what it actually
//! spends, so the batch as a whole never runs much past the caller's timeout
//! even when individual connector calls are slow.

use crate::{GantryError, GantryResult};
use std::time::{Duration, Instant};

/// Tracks the time remaining from a single budget
#[derive(Debug, Clone, Copy)]
pub struct CountdownTimer {
    started: Instant,
    budget: Duration,
    /// `None` when the budget cannot be represented as an instant (effectively infinite)
    deadline: Option<Instant>,
}

impl CountdownTimer {
    /// Start counting down from `budget`
    #[must_use]
    pub fn start(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            budget,
            deadline: started.checked_add(budget),
        }
    }

    /// The budget this timer was started with
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time spent since the timer started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the budget is exhausted, zero once it is
    #[must_use]
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    /// Whether the whole budget has been consumed
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Remaining time, or a [`GantryError::Timeout`] naming `what` once exhausted
    pub fn ensure_remaining(&self, what: &str) -> GantryResult<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            Err(GantryError::timeout(format!(
                "{what}: budget of {}ms exhausted",
                self.budget.as_millis()
            )))
        } else {
            Ok(remaining)
        }
    }
}

//! Busy-wait loops.
//!
//! Machine mode has nothing to yield to, so every cross-hart wait spins on a
//! condition. How long it may spin is a [`PollPolicy`].

use core::hint;

use snafu::Snafu;

/// How long a busy-wait may spin before giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollPolicy {
    /// Spin until the condition holds, however long that takes.
    #[default]
    Forever,
    /// Give up after evaluating the condition `max_polls` times.
    Bounded { max_polls: usize },
}

#[derive(Debug, Snafu)]
#[snafu(display("condition still false after {polls} polls"))]
pub struct PollTimeout {
    pub polls: usize,
    #[snafu(implicit)]
    location: snafu::Location,
}

impl PollPolicy {
    /// Spins until `ready` returns `true`.
    #[track_caller]
    pub fn wait_until<F>(self, ready: F) -> Result<(), PollTimeout>
    where
        F: FnMut() -> bool,
    {
        self.wait_until_with(ready, || {})
    }

    /// Spins until `ready` returns `true`, calling `idle` between polls.
    #[track_caller]
    pub fn wait_until_with<F, G>(self, mut ready: F, mut idle: G) -> Result<(), PollTimeout>
    where
        F: FnMut() -> bool,
        G: FnMut(),
    {
        let mut polls = 0_usize;
        loop {
            if ready() {
                return Ok(());
            }
            polls = polls.saturating_add(1);
            if let Self::Bounded { max_polls } = self
                && polls >= max_polls
            {
                return PollTimeoutSnafu { polls }.fail();
            }
            idle();
            hint::spin_loop();
        }
    }
}

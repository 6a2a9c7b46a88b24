//! Host-side stand-ins for output hardware.

use crate::output::{
    Delay, RunOutput, TransmitOutcome, TransmitWait, WaitPolicy, WaitTimeout, wait_done_with_retry,
};
use embassy_time::Duration;

/// A [`TransmitWait`] that fails a scripted number of attempts before succeeding.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedWait {
    remaining_failures: u32,
    attempts: u32,
}

impl ScriptedWait {
    /// Time out the first `failures` attempts, then complete.
    #[must_use]
    pub const fn failing(failures: u32) -> Self {
        Self {
            remaining_failures: failures,
            attempts: 0,
        }
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl TransmitWait for ScriptedWait {
    async fn wait_done(&mut self, _timeout: Duration) -> Result<(), WaitTimeout> {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(remaining) = self.remaining_failures.checked_sub(1) {
            self.remaining_failures = remaining;
            Err(WaitTimeout)
        } else {
            Ok(())
        }
    }
}

/// A [`Delay`] that returns immediately and counts its calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountingDelay {
    delays: u32,
    total_ms: u32,
}

impl CountingDelay {
    /// Number of delays requested.
    #[must_use]
    pub const fn delays(&self) -> u32 {
        self.delays
    }

    /// Sum of all requested delays.
    #[must_use]
    pub const fn total_ms(&self) -> u32 {
        self.total_ms
    }
}

impl Delay for CountingDelay {
    async fn delay_ms(&mut self, ms: u32) {
        self.delays = self.delays.saturating_add(1);
        self.total_ms = self.total_ms.saturating_add(ms);
    }
}

/// A [`RunOutput`] that records every transmission.
///
/// Waits complete immediately unless failures were scripted with
/// [`fail_next_waits`](Self::fail_next_waits); retries go through the same
/// [`wait_done_with_retry`] as real hardware.
#[derive(Clone, Debug)]
pub struct RecordingOutput<S> {
    transmissions: Vec<Vec<S>>,
    outcomes: Vec<TransmitOutcome>,
    wait: ScriptedWait,
    delay: CountingDelay,
}

impl<S> Default for RecordingOutput<S> {
    fn default() -> Self {
        Self {
            transmissions: Vec::new(),
            outcomes: Vec::new(),
            wait: ScriptedWait::default(),
            delay: CountingDelay::default(),
        }
    }
}

impl<S> RecordingOutput<S> {
    /// An output with no transmissions and no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` wait attempts (across transmissions) time out.
    pub const fn fail_next_waits(&mut self, count: u32) {
        self.wait.remaining_failures = self.wait.remaining_failures.saturating_add(count);
    }

    /// Every transmission, oldest first.
    #[must_use]
    pub fn transmissions(&self) -> &[Vec<S>] {
        &self.transmissions
    }

    /// The most recent transmission.
    #[must_use]
    pub fn last(&self) -> Option<&[S]> {
        self.transmissions.last().map(Vec::as_slice)
    }

    /// Outcome of every transmission, oldest first.
    #[must_use]
    pub fn outcomes(&self) -> &[TransmitOutcome] {
        &self.outcomes
    }

    /// Retry delays taken so far.
    #[must_use]
    pub const fn retry_delays(&self) -> u32 {
        self.delay.delays()
    }
}

impl<S: Clone> RunOutput<S> for RecordingOutput<S> {
    async fn transmit(&mut self, symbols: &[S]) -> TransmitOutcome {
        self.transmissions.push(symbols.to_vec());
        let outcome =
            wait_done_with_retry(&mut self.wait, &mut self.delay, WaitPolicy::DEFAULT).await;
        self.outcomes.push(outcome);
        outcome
    }
}

//! Output channels and the bounded wait for a transmission to finish.
//!
//! A [`RunOutput`] drives one channel's data line. An [`OutputBank`] drives every channel of a
//! deployment and starts all transmissions before waiting on any of them, so runs update together.
//! Every wait is bounded by [`wait_done_with_retry`]; a transmission that never finishes is
//! reported as [`TransmitOutcome::TimedOut`] and the caller carries on.

use core::future::Future;
use core::pin::Pin;

use embassy_futures::join::{join, join_array, join3, join4};
use embassy_time::{Duration, Timer, with_timeout};

use crate::fmt::{debug, warn};

#[cfg(not(feature = "host"))]
pub mod pio;
#[cfg(feature = "host")]
pub mod recording;

/// Wait attempts before a transmission is abandoned.
pub const WAIT_ATTEMPTS: u32 = 5;

/// Time allowed for each wait attempt.
pub const WAIT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1);

/// Pause after each failed wait attempt.
pub const WAIT_RETRY_DELAY_MS: u32 = 1;

// ============================================================================
// Outcomes and waiting
// ============================================================================

/// Result of one transmission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum TransmitOutcome {
    /// The hardware reported completion.
    Done,
    /// Every wait attempt timed out; the run may show a partial frame until the next transmit.
    TimedOut,
}

impl TransmitOutcome {
    /// `true` for [`TransmitOutcome::Done`].
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// A single wait attempt elapsed before completion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitTimeout;

/// Something whose completion can be awaited with a timeout.
pub trait TransmitWait {
    /// Wait up to `timeout` for completion.
    ///
    /// # Errors
    ///
    /// Returns [`WaitTimeout`] if `timeout` elapses first. Waiting again continues the same
    /// transmission.
    async fn wait_done(&mut self, timeout: Duration) -> Result<(), WaitTimeout>;
}

/// A pinned transfer future (for example a DMA transfer) is waited on directly.
impl<F: Future<Output = ()>> TransmitWait for Pin<&mut F> {
    async fn wait_done(&mut self, timeout: Duration) -> Result<(), WaitTimeout> {
        with_timeout(timeout, self.as_mut())
            .await
            .map_err(|_| WaitTimeout)
    }
}

/// Millisecond sleep, injectable for tests.
pub trait Delay {
    /// Sleep for `ms` milliseconds.
    async fn delay_ms(&mut self, ms: u32);
}

/// [`Delay`] backed by `embassy_time::Timer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimerDelay;

impl Delay for TimerDelay {
    async fn delay_ms(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await;
    }
}

/// How long [`wait_done_with_retry`] keeps waiting.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Number of wait attempts.
    pub attempts: u32,
    /// Timeout of each attempt.
    pub attempt_timeout: Duration,
    /// Sleep after each failed attempt.
    pub retry_delay_ms: u32,
}

impl WaitPolicy {
    /// Five attempts of 1 ms with 1 ms between them.
    pub const DEFAULT: Self = Self {
        attempts: WAIT_ATTEMPTS,
        attempt_timeout: WAIT_ATTEMPT_TIMEOUT,
        retry_delay_ms: WAIT_RETRY_DELAY_MS,
    };

    /// Lengthen each attempt by `transfer_time`, for hardware that only reports completion once
    /// the whole frame has been shifted out.
    #[must_use]
    pub const fn with_transfer_time(self, transfer_time: Duration) -> Self {
        Self {
            attempt_timeout: Duration::from_ticks(
                self.attempt_timeout
                    .as_ticks()
                    .saturating_add(transfer_time.as_ticks()),
            ),
            ..self
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wait for completion, retrying timed-out attempts up to `policy.attempts` times.
///
/// Sleeps `policy.retry_delay_ms` after each failed attempt (including the last) and logs a warning
/// when every attempt failed. Always returns.
pub async fn wait_done_with_retry(
    wait: &mut impl TransmitWait,
    delay: &mut impl Delay,
    policy: WaitPolicy,
) -> TransmitOutcome {
    for attempt in 1..=policy.attempts {
        if wait.wait_done(policy.attempt_timeout).await.is_ok() {
            return TransmitOutcome::Done;
        }
        debug!("transmit wait attempt {} timed out", attempt);
        delay.delay_ms(policy.retry_delay_ms).await;
    }
    warn!(
        "transmit did not complete after {} attempts; continuing",
        policy.attempts
    );
    TransmitOutcome::TimedOut
}

// ============================================================================
// Outputs
// ============================================================================

/// One channel's output hardware.
pub trait RunOutput<S> {
    /// Send `symbols` and wait (boundedly) for the hardware to finish.
    async fn transmit(&mut self, symbols: &[S]) -> TransmitOutcome;
}

/// Every channel's output, transmitted together.
///
/// Implemented for arrays of one output type and for tuples of up to four different output types.
pub trait OutputBank<S, const CHANNELS: usize> {
    /// Start every channel's transmission, then wait for all of them.
    ///
    /// `symbols[n]` goes to channel `n`; outcomes are returned in the same order.
    async fn transmit_all(&mut self, symbols: [&[S]; CHANNELS]) -> [TransmitOutcome; CHANNELS];
}

impl<S, O: RunOutput<S>, const CHANNELS: usize> OutputBank<S, CHANNELS> for [O; CHANNELS] {
    async fn transmit_all(&mut self, symbols: [&[S]; CHANNELS]) -> [TransmitOutcome; CHANNELS] {
        let mut runs = symbols.into_iter();
        let transmissions = self
            .each_mut()
            .map(|output| output.transmit(runs.next().unwrap_or_default()));
        join_array(transmissions).await
    }
}

impl<S, A: RunOutput<S>> OutputBank<S, 1> for (A,) {
    async fn transmit_all(&mut self, [a]: [&[S]; 1]) -> [TransmitOutcome; 1] {
        [self.0.transmit(a).await]
    }
}

impl<S, A: RunOutput<S>, B: RunOutput<S>> OutputBank<S, 2> for (A, B) {
    async fn transmit_all(&mut self, [a, b]: [&[S]; 2]) -> [TransmitOutcome; 2] {
        let (a, b) = join(self.0.transmit(a), self.1.transmit(b)).await;
        [a, b]
    }
}

impl<S, A: RunOutput<S>, B: RunOutput<S>, C: RunOutput<S>> OutputBank<S, 3> for (A, B, C) {
    async fn transmit_all(&mut self, [a, b, c]: [&[S]; 3]) -> [TransmitOutcome; 3] {
        let (a, b, c) = join3(
            self.0.transmit(a),
            self.1.transmit(b),
            self.2.transmit(c),
        )
        .await;
        [a, b, c]
    }
}

impl<S, A: RunOutput<S>, B: RunOutput<S>, C: RunOutput<S>, D: RunOutput<S>> OutputBank<S, 4>
    for (A, B, C, D)
{
    async fn transmit_all(&mut self, [a, b, c, d]: [&[S]; 4]) -> [TransmitOutcome; 4] {
        let (a, b, c, d) = join4(
            self.0.transmit(a),
            self.1.transmit(b),
            self.2.transmit(c),
            self.3.transmit(d),
        )
        .await;
        [a, b, c, d]
    }
}

//! The consumer side: pick the newest complete frame, encode it and send it to every channel.
//!
//! Each [`OutputScheduler::step`] makes one pass:
//!
//! 1. **Select**: under one lock, copy the newest complete frame newer than the last one applied
//!    into a private buffer ([`FrameAssembly::copy_newest_complete`]).
//! 2. **Encode**: outside the lock, encode every channel into its scratch buffer.
//! 3. **Transmit**: start every channel, then wait on each with bounded retries
//!    ([`OutputBank::transmit_all`]).
//!
//! Until `blackout_grace` has passed since the loop started nothing is transmitted. After it, black
//! is re-sent on every idle pass until the first frame has been applied, so strips never show
//! stale power-on garbage.

use embassy_time::{Duration, Instant, Timer};
use smart_leds::RGB8;

use crate::channel_config::{Channel, ChannelConfig};
use crate::encoder::Encoder;
use crate::fmt::{debug, info};
use crate::frame_assembly::{FrameAssembly, FrameId, FramePixels};
use crate::output::{Delay, OutputBank, TransmitOutcome};
use crate::startup::StartupCapabilities;

/// Tunables of the transmit loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SchedulerConfig {
    /// Sleep between passes that transmitted no frame.
    pub poll_interval: Duration,
    /// Time after start before any frame is shown.
    pub blackout_grace: Duration,
}

impl SchedulerConfig {
    /// 1 ms polling and a 1 s blackout grace.
    pub const DEFAULT: Self = Self {
        poll_interval: Duration::from_millis(1),
        blackout_grace: Duration::from_millis(1000),
    };
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What one [`OutputScheduler::step`] did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum StepOutcome {
    /// Still inside the blackout grace window; nothing sent.
    Holding,
    /// This frame was transmitted (possibly with timeouts) and is now the last applied.
    Applied(FrameId),
    /// No frame has ever been applied; black was sent.
    Blanked,
    /// Nothing new to show.
    Idle,
}

/// Owns the output bank and drives it from a shared [`FrameAssembly`].
///
/// `SYMBOLS` is the scratch capacity per channel and must be at least
/// `MAX_PIXELS * E::SYMBOLS_PER_PIXEL` (checked at compile time).
pub struct OutputScheduler<
    'a,
    E: Encoder,
    B,
    D,
    const CHANNELS: usize,
    const MAX_PIXELS: usize,
    const SYMBOLS: usize,
> {
    assembly: &'a FrameAssembly<CHANNELS, MAX_PIXELS>,
    encoder: E,
    outputs: B,
    delay: D,
    config: SchedulerConfig,
    pixels: FramePixels<CHANNELS, MAX_PIXELS>,
    scratch: [[E::Symbol; SYMBOLS]; CHANNELS],
    last_applied: Option<FrameId>,
    first_frame_sent: bool,
}

impl<'a, E, B, D, const CHANNELS: usize, const MAX_PIXELS: usize, const SYMBOLS: usize>
    OutputScheduler<'a, E, B, D, CHANNELS, MAX_PIXELS, SYMBOLS>
where
    E: Encoder,
    B: OutputBank<E::Symbol, CHANNELS>,
    D: Delay,
{
    /// A scheduler that has applied no frame yet.
    pub fn new(
        assembly: &'a FrameAssembly<CHANNELS, MAX_PIXELS>,
        encoder: E,
        outputs: B,
        delay: D,
        config: SchedulerConfig,
    ) -> Self {
        const {
            assert!(
                SYMBOLS >= MAX_PIXELS * E::SYMBOLS_PER_PIXEL,
                "scratch too small for one channel"
            );
        }
        Self {
            assembly,
            encoder,
            outputs,
            delay,
            config,
            pixels: [[[0; 3]; MAX_PIXELS]; CHANNELS],
            scratch: [[E::Symbol::default(); SYMBOLS]; CHANNELS],
            last_applied: None,
            first_frame_sent: false,
        }
    }

    /// Id of the last frame transmitted.
    #[must_use]
    pub const fn last_applied(&self) -> Option<FrameId> {
        self.last_applied
    }

    /// The output bank.
    #[must_use]
    pub const fn outputs(&self) -> &B {
        &self.outputs
    }

    /// Transmit and wait loop. Never returns.
    ///
    /// Sends black once, then calls [`step`](Self::step) forever, sleeping `poll_interval` after
    /// every pass that did not apply a frame.
    pub async fn run(&mut self) -> ! {
        info!("output scheduler running over {} channels", CHANNELS);
        self.blank_all().await;
        let started = Instant::now();
        loop {
            if !matches!(self.step(started.elapsed()).await, StepOutcome::Applied(_)) {
                Timer::after(self.config.poll_interval).await;
            }
        }
    }

    /// One pass of the loop; `since_start` is the time since the loop started.
    pub async fn step(&mut self, since_start: Duration) -> StepOutcome {
        if since_start < self.config.blackout_grace {
            return StepOutcome::Holding;
        }

        let Some(frame_id) = self
            .assembly
            .copy_newest_complete(self.last_applied, &mut self.pixels)
        else {
            if self.first_frame_sent {
                return StepOutcome::Idle;
            }
            self.blank_all().await;
            return StepOutcome::Blanked;
        };

        let pixels = &self.pixels;
        let encoder = &self.encoder;
        let lengths = encode_channels::<E, CHANNELS, SYMBOLS>(
            self.assembly.config(),
            &mut self.scratch,
            |channel, out| {
                pixels
                    .get(channel.index())
                    .and_then(|buffer| buffer.get(..channel.pixel_count()))
                    .map_or(0, |buffer| encoder.encode(buffer.as_flattened(), out))
            },
        );
        let outcomes = self.transmit(lengths).await;

        if !self.first_frame_sent {
            info!("first frame {} applied", frame_id.get());
            self.first_frame_sent = true;
        }
        let timed_out = outcomes
            .iter()
            .filter(|outcome| **outcome == TransmitOutcome::TimedOut)
            .count();
        if timed_out > 0 {
            debug!("frame {}: {} channels timed out", frame_id.get(), timed_out);
        }
        self.last_applied = Some(frame_id);
        self.assembly.telemetry().record_applied();
        StepOutcome::Applied(frame_id)
    }

    /// Send black to every channel.
    pub async fn blank_all(&mut self) {
        let encoder = &self.encoder;
        let lengths = encode_channels::<E, CHANNELS, SYMBOLS>(
            self.assembly.config(),
            &mut self.scratch,
            |channel, out| encoder.blank(channel.pixel_count(), out),
        );
        self.transmit(lengths).await;
    }

    /// Send `color` to every pixel of `channel` and black to all other channels.
    pub async fn flash_channel(&mut self, channel: usize, color: RGB8) {
        let encoder = &self.encoder;
        let lengths = encode_channels::<E, CHANNELS, SYMBOLS>(
            self.assembly.config(),
            &mut self.scratch,
            |candidate, out| {
                if candidate.index() == channel {
                    encoder.encode_solid(color, candidate.pixel_count(), out)
                } else {
                    encoder.blank(candidate.pixel_count(), out)
                }
            },
        );
        self.transmit(lengths).await;
    }

    async fn transmit(&mut self, lengths: [usize; CHANNELS]) -> [TransmitOutcome; CHANNELS] {
        let mut lengths = lengths.into_iter();
        let runs = self.scratch.each_ref().map(|scratch| {
            scratch
                .get(..lengths.next().unwrap_or(0))
                .unwrap_or_default()
        });
        self.outputs.transmit_all(runs).await
    }
}

/// Encode every channel into its scratch buffer, returning the symbols written per channel.
fn encode_channels<E: Encoder, const CHANNELS: usize, const SYMBOLS: usize>(
    config: &ChannelConfig<CHANNELS>,
    scratch: &mut [[E::Symbol; SYMBOLS]; CHANNELS],
    mut encode: impl FnMut(&Channel, &mut [E::Symbol]) -> usize,
) -> [usize; CHANNELS] {
    let mut lengths = [0; CHANNELS];
    for ((channel, out), length) in config
        .channels()
        .iter()
        .zip(scratch.iter_mut())
        .zip(lengths.iter_mut())
    {
        *length = encode(channel, out);
    }
    lengths
}

impl<E, B, D, const CHANNELS: usize, const MAX_PIXELS: usize, const SYMBOLS: usize>
    StartupCapabilities for OutputScheduler<'_, E, B, D, CHANNELS, MAX_PIXELS, SYMBOLS>
where
    E: Encoder,
    B: OutputBank<E::Symbol, CHANNELS>,
    D: Delay,
{
    async fn flash_channel(&mut self, channel: usize, color: RGB8) {
        Self::flash_channel(self, channel, color).await;
    }

    async fn blank_all(&mut self) {
        Self::blank_all(self).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms).await;
    }
}

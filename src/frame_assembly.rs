//! Two-slot assembly of frames from per-channel packets.
//!
//! Each channel's packets arrive independently, so one frame is "assembled" once every configured
//! channel has delivered its packet for that frame id. [`FrameAssembly`] keeps two slots:
//!
//! - **current**: the frame being displayed or about to be, or the first frame seen after boot.
//! - **next**: the single newer frame being filled in while current is held.
//!
//! When the next slot completes it is promoted to current and the old current is cleared. A packet
//! for a frame between current and next replaces next. A packet for a frame newer than both slots
//! is rejected while next is still incomplete. An assembly built
//! [`with_stall_limit`](FrameAssembly::with_stall_limit) instead evicts the stalled next frame
//! after that many such rejections in a row, so one lost packet cannot freeze the output.
//!
//! Producers call [`FrameAssembly::submit`] from any task. The consumer reads through
//! [`FrameAssembly::with_frames`] or [`FrameAssembly::copy_newest_complete`]; both hold the slot
//! lock for their whole duration, so a reader never sees a slot change part way through.
//!
//! See the [crate-level documentation](crate) for the complete pipeline.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

use crate::channel_config::{BYTES_PER_PIXEL, ChannelConfig, MAX_CHANNELS};
use crate::fmt::debug;
use crate::telemetry::Telemetry;

mod frame_id;

pub use frame_id::FrameId;

/// Bytes of big-endian frame id in front of every packet's pixel data.
pub const FRAME_HEADER_LEN: usize = 4;

/// Pixel storage for one channel of one slot.
pub type PixelBuffer<const MAX_PIXELS: usize> = [[u8; BYTES_PER_PIXEL]; MAX_PIXELS];

/// Pixel storage for every channel of one frame.
pub type FramePixels<const CHANNELS: usize, const MAX_PIXELS: usize> =
    [PixelBuffer<MAX_PIXELS>; CHANNELS];

// ============================================================================
// Admission results
// ============================================================================

/// What [`FrameAssembly::submit`] did with a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Admission {
    /// The packet's pixels were stored.
    Accepted {
        /// Frame the packet belongs to.
        frame_id: FrameId,
        /// `true` if this packet was the last channel the frame was missing.
        completed: bool,
    },
    /// The packet was dropped.
    Rejected(RejectReason),
}

/// Why a packet was dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum RejectReason {
    /// Channel index outside the configuration.
    UnknownChannel,
    /// Packet length is not `4 + 3 * pixel_count` for its channel.
    BadLength {
        /// Required length.
        expected: usize,
        /// Received length.
        actual: usize,
    },
    /// Frame id `0`.
    ReservedFrameId,
    /// Frame is older than the current slot.
    Stale,
    /// Frame is newer than both slots and the next slot is still being filled.
    WindowFull,
    /// `submit` was re-entered while the slots were being written.
    Busy,
}

/// Frame ids held by the two slots.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct SlotFrameIds {
    /// The current slot.
    pub current: Option<FrameId>,
    /// The next slot.
    pub next: Option<FrameId>,
}

// ============================================================================
// Slots
// ============================================================================

struct FrameSlot<const CHANNELS: usize, const MAX_PIXELS: usize> {
    frame_id: Option<FrameId>,
    received: u32,
    pixels: FramePixels<CHANNELS, MAX_PIXELS>,
}

impl<const CHANNELS: usize, const MAX_PIXELS: usize> FrameSlot<CHANNELS, MAX_PIXELS> {
    const EMPTY: Self = Self {
        frame_id: None,
        received: 0,
        pixels: [[[0; BYTES_PER_PIXEL]; MAX_PIXELS]; CHANNELS],
    };

    // Pixel bytes are left in place; `received` gates every read.
    const fn clear(&mut self) {
        self.frame_id = None;
        self.received = 0;
    }

    const fn is_complete(&self, complete_mask: u32) -> bool {
        self.frame_id.is_some() && self.received & complete_mask == complete_mask
    }

    fn holds(&self, frame_id: FrameId) -> bool {
        self.frame_id == Some(frame_id)
    }
}

/// Which of the two slots a packet goes into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Target {
    Current,
    Next,
}

struct Slots<const CHANNELS: usize, const MAX_PIXELS: usize> {
    first: FrameSlot<CHANNELS, MAX_PIXELS>,
    second: FrameSlot<CHANNELS, MAX_PIXELS>,
    // `false` while `first` is the current slot.
    swapped: bool,
    window_full_streak: u16,
}

impl<const CHANNELS: usize, const MAX_PIXELS: usize> Slots<CHANNELS, MAX_PIXELS> {
    const EMPTY: Self = Self {
        first: FrameSlot::EMPTY,
        second: FrameSlot::EMPTY,
        swapped: false,
        window_full_streak: 0,
    };

    const fn current(&self) -> &FrameSlot<CHANNELS, MAX_PIXELS> {
        if self.swapped { &self.second } else { &self.first }
    }

    const fn next(&self) -> &FrameSlot<CHANNELS, MAX_PIXELS> {
        if self.swapped { &self.first } else { &self.second }
    }

    const fn slot_mut(&mut self, target: Target) -> &mut FrameSlot<CHANNELS, MAX_PIXELS> {
        match (target, self.swapped) {
            (Target::Current, false) | (Target::Next, true) => &mut self.first,
            (Target::Current, true) | (Target::Next, false) => &mut self.second,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &FrameSlot<CHANNELS, MAX_PIXELS>> {
        [&self.first, &self.second].into_iter()
    }

    /// Pick the slot a packet for `frame_id` goes into, claiming an empty slot if needed.
    ///
    /// On success also returns the id of a partially filled next frame that was evicted to
    /// make room.
    fn resolve(
        &mut self,
        frame_id: FrameId,
        stall_limit: Option<u16>,
    ) -> Result<(Target, Option<FrameId>), RejectReason> {
        let Some(current_id) = self.current().frame_id else {
            self.slot_mut(Target::Current).frame_id = Some(frame_id);
            return Ok((Target::Current, None));
        };
        if current_id == frame_id {
            return Ok((Target::Current, None));
        }
        if self.next().holds(frame_id) {
            self.window_full_streak = 0;
            return Ok((Target::Next, None));
        }
        if !frame_id.is_newer_than(current_id) {
            return Err(RejectReason::Stale);
        }

        // An id between current and next displaces next.
        let next_id = self.next().frame_id;
        let next_is_claimable = next_id.is_none_or(|next_id| next_id.is_newer_than(frame_id));
        let stalled = stall_limit.is_some_and(|limit| self.window_full_streak >= limit);
        if next_is_claimable || stalled {
            self.window_full_streak = 0;
            let next = self.slot_mut(Target::Next);
            next.clear();
            next.frame_id = Some(frame_id);
            return Ok((Target::Next, next_id));
        }

        self.window_full_streak = self.window_full_streak.saturating_add(1);
        Err(RejectReason::WindowFull)
    }

    fn admit(
        &mut self,
        channel: usize,
        frame_id: FrameId,
        payload: &[u8],
        complete_mask: u32,
        stall_limit: Option<u16>,
    ) -> (Admission, Option<FrameId>) {
        let (target, evicted) = match self.resolve(frame_id, stall_limit) {
            Ok(resolved) => resolved,
            Err(reason) => return (Admission::Rejected(reason), None),
        };

        let slot = self.slot_mut(target);
        let Some(buffer) = slot.pixels.get_mut(channel) else {
            return (Admission::Rejected(RejectReason::UnknownChannel), evicted);
        };
        for (pixel, bytes) in buffer.iter_mut().zip(payload.chunks_exact(BYTES_PER_PIXEL)) {
            pixel.copy_from_slice(bytes);
        }

        let was_complete = slot.is_complete(complete_mask);
        slot.received |= channel_bit(channel);
        let completed = !was_complete && slot.is_complete(complete_mask);

        if completed && target == Target::Next {
            self.slot_mut(Target::Current).clear();
            self.swapped = !self.swapped;
        }

        let admission = Admission::Accepted {
            frame_id,
            completed,
        };
        (admission, evicted)
    }
}

/// Bit for `channel` in a slot's `received` mask; `0` past the last representable channel.
fn channel_bit(channel: usize) -> u32 {
    u32::try_from(channel)
        .ok()
        .and_then(|shift| 1_u32.checked_shl(shift))
        .unwrap_or(0)
}

// ============================================================================
// FrameAssembly
// ============================================================================

/// Double-buffered frame assembly shared between producers and one consumer.
///
/// `CHANNELS` is the number of configured channels; `MAX_PIXELS` is the storage reserved per
/// channel and must be at least the largest channel's pixel count.
///
/// Usually placed in a `static`:
///
/// ```
/// use pixel_envoy::channel_config::{Channel, ChannelConfig};
/// use pixel_envoy::frame_assembly::{Admission, FrameAssembly};
///
/// static ASSEMBLY: FrameAssembly<2, 4> =
///     FrameAssembly::new(ChannelConfig::new([Channel::new(4, 12), Channel::new(2, 13)]));
///
/// let mut packet = [0_u8; 4 + 2 * 3];
/// packet[..4].copy_from_slice(&7_u32.to_be_bytes());
/// assert!(matches!(ASSEMBLY.submit(1, &packet), Admission::Accepted { completed: false, .. }));
/// assert_eq!(ASSEMBLY.newest_complete_frame_id(), None);
/// ```
pub struct FrameAssembly<const CHANNELS: usize, const MAX_PIXELS: usize> {
    config: ChannelConfig<CHANNELS>,
    complete_mask: u32,
    stall_limit: Option<u16>,
    telemetry: Telemetry,
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots<CHANNELS, MAX_PIXELS>>>,
}

impl<const CHANNELS: usize, const MAX_PIXELS: usize> FrameAssembly<CHANNELS, MAX_PIXELS> {
    /// Empty slots for `config`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in a `static`) if a channel has more than `MAX_PIXELS` pixels
    /// or if there are more than [`MAX_CHANNELS`] channels.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "CHANNELS <= MAX_CHANNELS asserted")]
    pub const fn new(config: ChannelConfig<CHANNELS>) -> Self {
        assert!(CHANNELS <= MAX_CHANNELS, "too many channels");
        assert!(
            config.max_pixel_count() <= MAX_PIXELS,
            "MAX_PIXELS is smaller than the largest channel"
        );
        let complete_mask = match 1_u32.checked_shl(CHANNELS as u32) {
            Some(bit) => bit.wrapping_sub(1),
            None => u32::MAX,
        };
        Self {
            config,
            complete_mask,
            stall_limit: None,
            telemetry: Telemetry::new(),
            slots: Mutex::new(RefCell::new(Slots::EMPTY)),
        }
    }

    /// Evict a partially filled next frame after `stall_limit` window-full rejections in a row.
    ///
    /// Without this, a frame newer than both slots is always rejected while next is incomplete.
    /// `0` evicts next as soon as any newer frame arrives.
    #[must_use]
    pub const fn with_stall_limit(mut self, stall_limit: u16) -> Self {
        self.stall_limit = Some(stall_limit);
        self
    }

    /// The channel layout this buffer was built for.
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig<CHANNELS> {
        &self.config
    }

    /// Counters updated by `submit` and by the output scheduler.
    #[must_use]
    pub const fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Store one channel's packet: a 4-byte big-endian frame id followed by `3 * pixel_count`
    /// bytes of pixel data in R, G, B order.
    ///
    /// Never blocks beyond the brief slot lock and never fails; rejections are reported in the
    /// returned [`Admission`] and counted as dropped.
    pub fn submit(&self, channel: usize, packet: &[u8]) -> Admission {
        let (admission, evicted) = self.admit(channel, packet);
        if let Some(evicted) = evicted {
            debug!("evicted frame {} for channel {}", evicted.get(), channel);
        }
        match admission {
            Admission::Accepted { completed, .. } => {
                self.telemetry.record_received();
                if completed {
                    self.telemetry.record_completed();
                }
            }
            Admission::Rejected(_) => self.telemetry.record_dropped(),
        }
        admission
    }

    fn admit(&self, channel: usize, packet: &[u8]) -> (Admission, Option<FrameId>) {
        let Some(channel_config) = self.config.channel(channel) else {
            return (Admission::Rejected(RejectReason::UnknownChannel), None);
        };
        let expected = FRAME_HEADER_LEN.saturating_add(channel_config.pixel_bytes());
        let bad_length = RejectReason::BadLength {
            expected,
            actual: packet.len(),
        };
        if packet.len() != expected {
            return (Admission::Rejected(bad_length), None);
        }
        let Some((header, payload)) = packet.split_first_chunk::<FRAME_HEADER_LEN>() else {
            return (Admission::Rejected(bad_length), None);
        };
        let Some(frame_id) = FrameId::new(u32::from_be_bytes(*header)) else {
            return (Admission::Rejected(RejectReason::ReservedFrameId), None);
        };

        self.slots.lock(|cell| {
            let Ok(mut slots) = cell.try_borrow_mut() else {
                return (Admission::Rejected(RejectReason::Busy), None);
            };
            slots.admit(
                channel,
                frame_id,
                payload,
                self.complete_mask,
                self.stall_limit,
            )
        })
    }

    /// Run `f` with a consistent view of both slots.
    ///
    /// No packet can be admitted while `f` runs. `f` may call the other read methods of this
    /// buffer but must not call [`submit`](Self::submit), which would return
    /// [`RejectReason::Busy`].
    pub fn with_frames<R>(&self, f: impl FnOnce(&FrameView<'_, CHANNELS, MAX_PIXELS>) -> R) -> R {
        self.slots.lock(|cell| {
            let slots = cell.borrow();
            f(&FrameView {
                slots: &slots,
                config: &self.config,
                complete_mask: self.complete_mask,
            })
        })
    }

    /// Id of the newest frame whose every channel has arrived.
    #[must_use]
    pub fn newest_complete_frame_id(&self) -> Option<FrameId> {
        self.with_frames(|frames| frames.newest_complete_frame_id())
    }

    /// Whether `channel`'s packet for `frame_id` has arrived.
    #[must_use]
    pub fn is_channel_received(&self, frame_id: FrameId, channel: usize) -> bool {
        self.with_frames(|frames| frames.is_channel_received(frame_id, channel))
    }

    /// Frame ids currently held by the two slots.
    #[must_use]
    pub fn slot_frame_ids(&self) -> SlotFrameIds {
        self.with_frames(|frames| frames.slot_frame_ids())
    }

    /// Copy the newest complete frame newer than `after` into `out`, under one lock.
    ///
    /// Returns the copied frame's id, or `None` (leaving `out` untouched) if there is no such
    /// frame. Bytes beyond each channel's pixel count are left untouched.
    pub fn copy_newest_complete(
        &self,
        after: Option<FrameId>,
        out: &mut FramePixels<CHANNELS, MAX_PIXELS>,
    ) -> Option<FrameId> {
        self.with_frames(|frames| {
            let ids = frames.slot_frame_ids();
            let frame_id = [ids.current, ids.next]
                .into_iter()
                .flatten()
                .filter(|&candidate| after.is_none_or(|last| candidate.is_newer_than(last)))
                .filter(|&candidate| {
                    (0..CHANNELS).all(|channel| self.is_channel_received(candidate, channel))
                })
                .reduce(FrameId::newest)?;

            for (channel, buffer) in out.iter_mut().enumerate() {
                let pixels = frames.snapshot(frame_id, channel)?;
                if let Some(destination) = buffer.as_flattened_mut().get_mut(..pixels.len()) {
                    destination.copy_from_slice(pixels);
                }
            }
            Some(frame_id)
        })
    }
}

// ============================================================================
// FrameView
// ============================================================================

/// Read-only view of both slots, valid inside [`FrameAssembly::with_frames`].
pub struct FrameView<'a, const CHANNELS: usize, const MAX_PIXELS: usize> {
    slots: &'a Slots<CHANNELS, MAX_PIXELS>,
    config: &'a ChannelConfig<CHANNELS>,
    complete_mask: u32,
}

impl<'a, const CHANNELS: usize, const MAX_PIXELS: usize> FrameView<'a, CHANNELS, MAX_PIXELS> {
    fn slot(&self, frame_id: FrameId) -> Option<&'a FrameSlot<CHANNELS, MAX_PIXELS>> {
        self.slots.iter().find(|slot| slot.holds(frame_id))
    }

    /// See [`FrameAssembly::slot_frame_ids`].
    #[must_use]
    pub fn slot_frame_ids(&self) -> SlotFrameIds {
        SlotFrameIds {
            current: self.slots.current().frame_id,
            next: self.slots.next().frame_id,
        }
    }

    /// See [`FrameAssembly::newest_complete_frame_id`].
    #[must_use]
    pub fn newest_complete_frame_id(&self) -> Option<FrameId> {
        self.slots
            .iter()
            .filter(|slot| slot.is_complete(self.complete_mask))
            .filter_map(|slot| slot.frame_id)
            .reduce(FrameId::newest)
    }

    /// See [`FrameAssembly::is_channel_received`].
    #[must_use]
    pub fn is_channel_received(&self, frame_id: FrameId, channel: usize) -> bool {
        channel < CHANNELS
            && self
                .slot(frame_id)
                .is_some_and(|slot| slot.received & channel_bit(channel) != 0)
    }

    /// Raw `R, G, B` bytes of `channel` in `frame_id`, exactly `3 * pixel_count` long.
    ///
    /// `None` if neither slot holds `frame_id` or the channel is unknown. The bytes of a channel
    /// whose packet has not arrived are unspecified.
    #[must_use]
    pub fn snapshot(&self, frame_id: FrameId, channel: usize) -> Option<&'a [u8]> {
        let pixel_count = self.config.channel(channel)?.pixel_count();
        let buffer = self.slot(frame_id)?.pixels.get(channel)?;
        buffer
            .get(..pixel_count)
            .map(<[[u8; BYTES_PER_PIXEL]]>::as_flattened)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Frame counters and the periodic status record.
//!
//! The pipeline only ever increments counters; a status task reads and resets them with
//! [`Telemetry::take`] and renders a [`StatusRecord`].

use core::fmt::Write;

use heapless::String;
use portable_atomic::{AtomicU32, Ordering};
use serde::{Serialize, Serializer};
use serde_json_core::ser::Error as JsonError;

use crate::channel_config::{Channel, ChannelConfig, NetworkConfig};

/// Capacity of a rendered status record.
pub const STATUS_RECORD_CAPACITY: usize = 512;

/// Lock-free frame counters shared by receivers, the assembly buffer and the scheduler.
#[derive(Debug, Default)]
pub struct Telemetry {
    received: AtomicU32,
    completed: AtomicU32,
    applied: AtomicU32,
    dropped: AtomicU32,
}

/// A point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct Counters {
    /// Packets admitted into a frame slot.
    pub received: u32,
    /// Frames whose every channel arrived.
    pub completed: u32,
    /// Frames transmitted to the outputs.
    pub applied: u32,
    /// Packets rejected for any reason.
    pub dropped: u32,
}

impl Telemetry {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            received: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            applied: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Count a packet admitted into a slot.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame that became complete.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame handed to the outputs.
    pub fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped packet.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values without resetting.
    #[must_use]
    pub fn peek(&self) -> Counters {
        Counters {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Read every counter and reset it to zero.
    pub fn take(&self) -> Counters {
        Counters {
            received: self.received.swap(0, Ordering::Relaxed),
            completed: self.completed.swap(0, Ordering::Relaxed),
            applied: self.applied.swap(0, Ordering::Relaxed),
            dropped: self.dropped.swap(0, Ordering::Relaxed),
        }
    }
}

/// One status report, serialized as a single-line JSON object by [`render`](Self::render).
#[derive(Clone, Copy, Debug)]
pub struct StatusRecord<'a, const CHANNELS: usize> {
    /// Addressing and side of this controller.
    pub network: &'a NetworkConfig,
    /// Channel layout (reported as `runs` and `leds`).
    pub channels: &'a ChannelConfig<CHANNELS>,
    /// Milliseconds since boot.
    pub uptime_ms: u64,
    /// Whether the network link is up.
    pub link_up: bool,
    /// Counters for the interval being reported.
    pub counters: Counters,
}

/// Field order is the wire order.
#[derive(Serialize)]
struct StatusJson<'a, const CHANNELS: usize> {
    id: &'a str,
    ip: String<15>,
    uptime_ms: u64,
    link: bool,
    runs: usize,
    #[serde(serialize_with = "pixel_counts")]
    leds: &'a ChannelConfig<CHANNELS>,
    rx_frames: u32,
    complete: u32,
    applied: u32,
    dropped_frames: u32,
    errors: &'a [&'a str],
}

fn pixel_counts<S: Serializer, const CHANNELS: usize>(
    channels: &&ChannelConfig<CHANNELS>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(channels.channels().iter().map(Channel::pixel_count))
}

impl<const CHANNELS: usize> StatusRecord<'_, CHANNELS> {
    /// Serialize into a fixed-capacity string.
    ///
    /// # Errors
    ///
    /// Returns [`JsonError::BufferFull`] if the record does not fit in
    /// [`STATUS_RECORD_CAPACITY`] bytes.
    pub fn render(&self) -> Result<String<STATUS_RECORD_CAPACITY>, JsonError> {
        let [a, b, c, d] = self.network.address;
        let mut ip = String::new();
        write!(ip, "{a}.{b}.{c}.{d}").map_err(|_| JsonError::BufferFull)?;

        serde_json_core::to_string(&StatusJson {
            id: self.network.side.as_str(),
            ip,
            uptime_ms: self.uptime_ms,
            link: self.link_up,
            runs: CHANNELS,
            leds: self.channels,
            rx_frames: self.counters.received,
            complete: self.counters.completed,
            applied: self.counters.applied,
            dropped_frames: self.counters.dropped,
            errors: &[],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_config::{MAX_CHANNELS, MAX_PIXELS_PER_CHANNEL, Side};

    #[test]
    fn take_resets_counters() {
        let telemetry = Telemetry::new();
        telemetry.record_received();
        telemetry.record_received();
        telemetry.record_dropped();
        assert_eq!(
            telemetry.take(),
            Counters {
                received: 2,
                completed: 0,
                applied: 0,
                dropped: 1,
            }
        );
        assert_eq!(telemetry.peek(), Counters::default());
    }

    #[test]
    fn status_record_matches_wire_format() {
        let telemetry = Telemetry::new();
        telemetry.record_received();
        telemetry.record_completed();
        telemetry.record_applied();
        telemetry.record_dropped();
        let channels = ChannelConfig::new([Channel::new(20, 12)]);
        let network = NetworkConfig::DEFAULT;
        let record = StatusRecord {
            network: &network,
            channels: &channels,
            uptime_ms: 123,
            link_up: true,
            counters: telemetry.take(),
        };
        let text = record.render().unwrap();
        assert_eq!(
            text.as_str(),
            r#"{"id":"LEFT","ip":"10.10.0.2","uptime_ms":123,"link":true,"runs":1,"leds":[20],"rx_frames":1,"complete":1,"applied":1,"dropped_frames":1,"errors":[]}"#
        );
    }

    #[test]
    fn largest_status_record_fits_capacity() {
        let channels = ChannelConfig::new([Channel::new(MAX_PIXELS_PER_CHANNEL, 12); MAX_CHANNELS]);
        let network = NetworkConfig {
            side: Side::Right,
            address: [255, 255, 255, 255],
            ..NetworkConfig::DEFAULT
        };
        let record = StatusRecord {
            network: &network,
            channels: &channels,
            uptime_ms: u64::MAX,
            link_up: false,
            counters: Counters {
                received: u32::MAX,
                completed: u32::MAX,
                applied: u32::MAX,
                dropped: u32::MAX,
            },
        };
        let text = record.render().unwrap();
        assert!(text.contains(r#""ip":"255.255.255.255","uptime_ms":18446744073709551615,"#));
        assert!(text.contains(r#""runs":32,"leds":[400,400,"#));
        assert!(text.ends_with(r#""dropped_frames":4294967295,"errors":[]}"#));
    }

    #[test]
    fn status_record_lists_every_run() {
        let channels = ChannelConfig::new([
            Channel::new(20, 12),
            Channel::new(35, 13),
            Channel::new(7, 14),
        ]);
        let network = NetworkConfig {
            side: Side::Right,
            address: [192, 168, 1, 40],
            ..NetworkConfig::DEFAULT
        };
        let record = StatusRecord {
            network: &network,
            channels: &channels,
            uptime_ms: 0,
            link_up: false,
            counters: Counters::default(),
        };
        let text = record.render().unwrap();
        assert!(text.starts_with(r#"{"id":"RIGHT","ip":"192.168.1.40","uptime_ms":0,"link":false,"runs":3,"leds":[20,35,7],"#));
    }
}

//! Static, per-deployment description of the output channels ("runs") and network addressing.
//!
//! Everything here is `const`-constructible. Building a [`ChannelConfig`] with
//! [`ChannelConfig::new`] inside a `const` or `static` turns a misconfiguration into a build
//! failure; [`ChannelConfig::try_new`] reports the same problems as [`Error`] values.
//!
//! ```
//! use pixel_envoy::channel_config::{Channel, ChannelConfig};
//!
//! const CHANNELS: ChannelConfig<2> =
//!     ChannelConfig::new([Channel::new(20, 12), Channel::new(150, 13)]);
//!
//! assert_eq!(CHANNELS.channel(1).map(|channel| channel.pixel_count()), Some(150));
//! assert_eq!(CHANNELS.total_pixels(), 170);
//! ```

use embassy_time::Duration;

use crate::{Error, Result};

/// Largest channel count the frame assembly can track (width of its received-channel bitset).
pub const MAX_CHANNELS: usize = 32;

/// Largest pixel count allowed on a single channel.
pub const MAX_PIXELS_PER_CHANNEL: usize = 400;

/// Raw bytes per pixel in packets and pixel buffers (R, G, B).
pub const BYTES_PER_PIXEL: usize = 3;

/// Highest GPIO number on the selected board.
#[cfg(feature = "pico2")]
pub const MAX_GPIO: u8 = 47;

/// Highest GPIO number on the selected board.
#[cfg(not(feature = "pico2"))]
pub const MAX_GPIO: u8 = 29;

/// One output channel: its position, pixel count and GPIO pin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Channel {
    index: usize,
    pixel_count: usize,
    output_pin: u8,
}

impl Channel {
    /// Describe a channel with `pixel_count` pixels driven from GPIO `output_pin`.
    ///
    /// The index is assigned by position when the channel is placed in a [`ChannelConfig`].
    #[must_use]
    pub const fn new(pixel_count: usize, output_pin: u8) -> Self {
        Self {
            index: 0,
            pixel_count,
            output_pin,
        }
    }

    /// Position of this channel in its configuration.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of pixels on this channel.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// GPIO pin carrying this channel's data line.
    #[must_use]
    pub const fn output_pin(&self) -> u8 {
        self.output_pin
    }

    /// Length of this channel's raw pixel buffer.
    #[must_use]
    pub const fn pixel_bytes(&self) -> usize {
        self.pixel_count.saturating_mul(BYTES_PER_PIXEL)
    }
}

/// The fixed set of channels for one deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelConfig<const CHANNELS: usize> {
    channels: [Channel; CHANNELS],
}

impl<const CHANNELS: usize> ChannelConfig<CHANNELS> {
    /// Build a configuration, panicking on invalid input.
    ///
    /// Use it in a `const` so the panic becomes a compile error.
    #[must_use]
    pub const fn new(channels: [Channel; CHANNELS]) -> Self {
        match Self::try_new(channels) {
            Ok(config) => config,
            Err(Error::NoChannels) => panic!("channel configuration has no channels"),
            Err(Error::TooManyChannels { .. }) => panic!("too many channels"),
            Err(Error::PixelCountOutOfRange { .. }) => panic!("channel pixel count out of range"),
            Err(Error::OutputPinOutOfRange { .. }) => panic!("channel output pin out of range"),
            Err(_) => panic!("invalid channel configuration"),
        }
    }

    /// Build a configuration, reporting the first invalid channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoChannels`], [`Error::TooManyChannels`],
    /// [`Error::PixelCountOutOfRange`] or [`Error::OutputPinOutOfRange`].
    #[expect(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "const loop with index < CHANNELS"
    )]
    pub const fn try_new(mut channels: [Channel; CHANNELS]) -> Result<Self> {
        if CHANNELS == 0 {
            return Err(Error::NoChannels);
        }
        if CHANNELS > MAX_CHANNELS {
            return Err(Error::TooManyChannels {
                count: CHANNELS,
                max: MAX_CHANNELS,
            });
        }
        let mut index = 0;
        while index < CHANNELS {
            let channel = &mut channels[index];
            channel.index = index;
            if channel.pixel_count == 0 || channel.pixel_count > MAX_PIXELS_PER_CHANNEL {
                return Err(Error::PixelCountOutOfRange {
                    channel: index,
                    pixel_count: channel.pixel_count,
                    max: MAX_PIXELS_PER_CHANNEL,
                });
            }
            if channel.output_pin > MAX_GPIO {
                return Err(Error::OutputPinOutOfRange {
                    channel: index,
                    pin: channel.output_pin,
                });
            }
            index += 1;
        }
        Ok(Self { channels })
    }

    /// Number of channels.
    #[must_use]
    pub const fn len(&self) -> usize {
        CHANNELS
    }

    /// Always `false`; a configuration holds at least one channel.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Channel at `index`, if any.
    #[must_use]
    #[expect(clippy::indexing_slicing, reason = "index checked against CHANNELS")]
    pub const fn channel(&self, index: usize) -> Option<&Channel> {
        if index < CHANNELS {
            Some(&self.channels[index])
        } else {
            None
        }
    }

    /// All channels in index order.
    #[must_use]
    pub const fn channels(&self) -> &[Channel; CHANNELS] {
        &self.channels
    }

    /// Pixel count of channel `index`, or 0 when out of range.
    #[must_use]
    pub const fn pixel_count(&self, index: usize) -> usize {
        match self.channel(index) {
            Some(channel) => channel.pixel_count,
            None => 0,
        }
    }

    /// Largest pixel count among all channels.
    #[must_use]
    #[expect(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "const loop with index < CHANNELS"
    )]
    pub const fn max_pixel_count(&self) -> usize {
        let mut max = 0;
        let mut index = 0;
        while index < CHANNELS {
            if self.channels[index].pixel_count > max {
                max = self.channels[index].pixel_count;
            }
            index += 1;
        }
        max
    }

    /// Sum of all channels' pixel counts.
    #[must_use]
    #[expect(
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "const loop with index < CHANNELS"
    )]
    pub const fn total_pixels(&self) -> usize {
        let mut total: usize = 0;
        let mut index = 0;
        while index < CHANNELS {
            total = total.saturating_add(self.channels[index].pixel_count);
            index += 1;
        }
        total
    }
}

// ============================================================================
// Network addressing
// ============================================================================

/// Which half of the installation this controller drives. Reported in status records.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Side {
    /// Left-hand controller.
    Left,
    /// Right-hand controller.
    Right,
}

impl Side {
    /// Upper-case name used in status records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// Default UDP port of channel 0.
pub const PORT_BASE_DEFAULT: u16 = 49_600;

/// Default UDP port that receives status records on the sender.
pub const STATUS_PORT_DEFAULT: u16 = 49_700;

/// Default offset of the control (restart) port above the port base.
pub const CONTROL_PORT_OFFSET_DEFAULT: u16 = 100;

/// Ports and addresses used by the network collaborators.
///
/// Link bring-up itself belongs to the application; `address` is only reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkConfig {
    /// Side reported in status records.
    pub side: Side,
    /// This controller's static IPv4 address.
    pub address: [u8; 4],
    /// UDP port of channel 0; channel `n` listens on `port_base + n`.
    pub port_base: u16,
    /// Control port is `port_base + control_port_offset`.
    pub control_port_offset: u16,
    /// Where status records are sent.
    pub status_destination: [u8; 4],
    /// Destination port for status records.
    pub status_port: u16,
    /// Time between status records.
    pub status_interval: Duration,
}

impl NetworkConfig {
    /// Defaults of the reference deployment (left side, `10.10.0.2`, sender at `10.10.0.1`).
    pub const DEFAULT: Self = Self {
        side: Side::Left,
        address: [10, 10, 0, 2],
        port_base: PORT_BASE_DEFAULT,
        control_port_offset: CONTROL_PORT_OFFSET_DEFAULT,
        status_destination: [10, 10, 0, 1],
        status_port: STATUS_PORT_DEFAULT,
        status_interval: Duration::from_secs(1),
    };

    /// UDP port for `channel`, or `None` if it overflows.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    pub const fn channel_port(&self, channel: usize) -> Option<u16> {
        if channel > u16::MAX as usize {
            return None;
        }
        self.port_base.checked_add(channel as u16)
    }

    /// UDP port of the control listener, or `None` if it overflows.
    #[must_use]
    pub const fn control_port(&self) -> Option<u16> {
        self.port_base.checked_add(self.control_port_offset)
    }

    /// Check that every channel of `channels` has a port that does not collide with the control
    /// port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortOutOfRange`] for the first channel without a valid port.
    pub fn validate<const CHANNELS: usize>(&self, channels: &ChannelConfig<CHANNELS>) -> Result<()> {
        let control_port = self.control_port();
        for channel in channels.channels() {
            let port = self.channel_port(channel.index());
            if port.is_none() || port == control_port {
                return Err(Error::PortOutOfRange {
                    channel: channel.index(),
                });
            }
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

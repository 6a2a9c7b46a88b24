//! Crate-wide error type.
//!
//! Only construction-time problems are errors. Malformed packets and slow outputs are reported as
//! values ([`Admission`](crate::frame_assembly::Admission),
//! [`TransmitOutcome`](crate::output::TransmitOutcome)) because they never stop the system.

/// Result type used throughout `pixel-envoy`.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while configuring or starting the pipeline.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum Error {
    /// A deployment must drive at least one channel.
    #[display("channel configuration has no channels")]
    NoChannels,

    /// More channels than the received-channel bitset (or the output hardware) can track.
    #[display("{count} channels configured but at most {max} are supported")]
    TooManyChannels {
        /// Configured channel count.
        count: usize,
        /// Largest supported channel count.
        max: usize,
    },

    /// A channel with zero pixels or more than the per-channel maximum.
    #[display("channel {channel} has {pixel_count} pixels; expected 1..={max}")]
    PixelCountOutOfRange {
        /// Channel index.
        channel: usize,
        /// Configured pixel count.
        pixel_count: usize,
        /// Per-channel maximum.
        max: usize,
    },

    /// Output pin not present on the selected board.
    #[display("channel {channel} uses GPIO {pin}, which the board does not have")]
    OutputPinOutOfRange {
        /// Channel index.
        channel: usize,
        /// Configured GPIO number.
        pin: u8,
    },

    /// `port_base + channel` does not fit in a UDP port number.
    #[display("channel {channel} has no valid UDP port above the port base")]
    PortOutOfRange {
        /// Channel index.
        channel: usize,
    },

    /// Spawning an embassy task failed (task pool exhausted).
    #[cfg(not(feature = "host"))]
    #[display("failed to spawn task: {_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),

    /// A UDP socket could not be bound.
    #[cfg(feature = "net")]
    #[display("failed to bind UDP port {port}")]
    Network {
        /// Port that could not be bound.
        port: u16,
    },
}

#[cfg(not(feature = "host"))]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}

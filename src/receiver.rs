//! UDP input: one socket per channel, each datagram handed to [`FrameAssembly::submit`].
//!
//! Channel `n` listens on [`NetworkConfig::channel_port`](crate::channel_config::NetworkConfig::channel_port)`(n)`.
//! The network stack itself (link, address) is brought up by the application.

#![cfg(all(feature = "net", not(feature = "host")))]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use embassy_net::Stack;
use embassy_net::udp::{PacketMetadata, UdpSocket};

use crate::channel_config::{BYTES_PER_PIXEL, MAX_PIXELS_PER_CHANNEL};
use crate::fmt::{debug, info, warn};
use crate::frame_assembly::{Admission, FRAME_HEADER_LEN, FrameAssembly};
use crate::{Error, Result};

/// Largest datagram a channel can legitimately receive.
pub const MAX_PACKET_LEN: usize = FRAME_HEADER_LEN + MAX_PIXELS_PER_CHANNEL * BYTES_PER_PIXEL;

// Datagrams buffered per socket while the task is busy.
const RX_PACKETS: usize = 4;

/// Receive `channel`'s packets on UDP `port` forever.
///
/// Datagrams larger than [`MAX_PACKET_LEN`] are truncated by the stack and counted as dropped.
///
/// # Errors
///
/// Returns [`Error::Network`] if `port` cannot be bound.
pub async fn receiver_loop<const CHANNELS: usize, const MAX_PIXELS: usize>(
    stack: &'static Stack<'static>,
    assembly: &'static FrameAssembly<CHANNELS, MAX_PIXELS>,
    channel: usize,
    port: u16,
) -> Result<Infallible> {
    let mut rx_meta = [PacketMetadata::EMPTY; RX_PACKETS];
    let mut rx_buffer = [0_u8; RX_PACKETS * MAX_PACKET_LEN];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0_u8; 16];
    let mut socket = UdpSocket::new(
        *stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(port).map_err(|_| Error::Network { port })?;
    info!("channel {} listening on UDP port {}", channel, port);

    let mut datagram = [0_u8; MAX_PACKET_LEN];
    loop {
        match socket.recv_from(&mut datagram).await {
            Ok((len, _)) => {
                let packet = datagram.get(..len).unwrap_or_default();
                if let Admission::Rejected(reason) = assembly.submit(channel, packet) {
                    debug!("channel {} dropped packet: {:?}", channel, reason);
                }
            }
            Err(err) => {
                warn!("channel {} receive failed: {:?}", channel, err);
                assembly.telemetry().record_dropped();
            }
        }
    }
}

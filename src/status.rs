//! Periodic status reports over UDP.

#![cfg(all(feature = "net", not(feature = "host")))]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Ipv4Address, Stack};
use embassy_time::{Instant, Ticker};

use crate::channel_config::NetworkConfig;
use crate::fmt::warn;
use crate::frame_assembly::FrameAssembly;
use crate::telemetry::{STATUS_RECORD_CAPACITY, StatusRecord};
use crate::{Error, Result};

/// Every `network.status_interval`, read and reset the counters and send one [`StatusRecord`] to
/// `network.status_destination`.
///
/// Send failures are logged and the loop carries on.
///
/// # Errors
///
/// Returns [`Error::Network`] if no local port can be bound.
pub async fn status_loop<const CHANNELS: usize, const MAX_PIXELS: usize>(
    stack: &'static Stack<'static>,
    assembly: &'static FrameAssembly<CHANNELS, MAX_PIXELS>,
    network: &'static NetworkConfig,
) -> Result<Infallible> {
    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0_u8; 16];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0_u8; 2 * STATUS_RECORD_CAPACITY];
    let mut socket = UdpSocket::new(
        *stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| Error::Network { port: 0 })?;

    let [a, b, c, d] = network.status_destination;
    let destination = IpEndpoint::new(
        IpAddress::Ipv4(Ipv4Address::new(a, b, c, d)),
        network.status_port,
    );

    let mut ticker = Ticker::every(network.status_interval);
    loop {
        ticker.next().await;
        let record = StatusRecord {
            network,
            channels: assembly.config(),
            uptime_ms: Instant::now().as_millis(),
            link_up: stack.is_link_up(),
            counters: assembly.telemetry().take(),
        };
        let Ok(text) = record.render() else {
            warn!("status record exceeds {} bytes", STATUS_RECORD_CAPACITY);
            continue;
        };
        if let Err(err) = socket.send_to(text.as_bytes(), destination).await {
            warn!("status send failed: {:?}", err);
        }
    }
}

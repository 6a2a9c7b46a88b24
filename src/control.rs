//! Remote restart: any non-empty datagram on the control port resets the controller.

/// Whether a datagram of `len` bytes on the control port asks for a restart.
///
/// Any payload does, including one truncated by the receive buffer; an empty datagram does not.
#[must_use]
pub const fn is_restart_request(len: usize) -> bool {
    len > 0
}

#[cfg(all(feature = "net", feature = "arm", not(feature = "host")))]
mod socket {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use core::convert::Infallible;

    use embassy_net::Stack;
    use embassy_net::udp::{PacketMetadata, RecvError, UdpSocket};
    use embassy_time::Timer;

    use super::is_restart_request;
    use crate::fmt::{debug, info, warn};
    use crate::{Error, Result};

    /// Wait for a restart request on `port`, then reset the chip.
    ///
    /// The payload is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if `port` cannot be bound.
    pub async fn control_loop(stack: &'static Stack<'static>, port: u16) -> Result<Infallible> {
        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0_u8; 64];
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
        info!("control listening on UDP port {}", port);

        let mut datagram = [0_u8; 64];
        loop {
            let len = match socket.recv_from(&mut datagram).await {
                Ok((len, _)) => len,
                Err(RecvError::Truncated) => datagram.len(),
            };
            if is_restart_request(len) {
                break;
            }
            debug!("ignoring empty datagram on port {}", port);
        }

        warn!("restart requested on port {}", port);
        // Let the log drain.
        Timer::after_millis(10).await;
        cortex_m::peripheral::SCB::sys_reset()
    }
}

#[cfg(all(feature = "net", feature = "arm", not(feature = "host")))]
pub use socket::control_loop;

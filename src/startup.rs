//! Power-on self test: light each channel in turn so miswired runs are obvious.

use smart_leds::RGB8;

use crate::fmt::info;

/// Wait before the first flash, letting LED power settle.
pub const STARTUP_SETTLE_MS: u32 = 1000;

/// How long each channel stays lit.
pub const STARTUP_FLASH_MS: u32 = 1000;

/// Flash color (a warm amber).
pub const STARTUP_COLOR: RGB8 = RGB8::new(218, 170, 52);

/// What the startup sequence needs from the outputs.
///
/// Implemented by [`OutputScheduler`](crate::scheduler::OutputScheduler); tests supply a fake.
pub trait StartupCapabilities {
    /// Show `color` on every pixel of `channel` and black on all other channels.
    async fn flash_channel(&mut self, channel: usize, color: RGB8);

    /// Show black on every channel.
    async fn blank_all(&mut self);

    /// Sleep for `ms` milliseconds.
    async fn delay_ms(&mut self, ms: u32);
}

/// Settle, then flash each of `channel_count` channels for [`STARTUP_FLASH_MS`], blanking after
/// each.
pub async fn run_startup_sequence(
    channel_count: usize,
    capabilities: &mut impl StartupCapabilities,
) {
    info!("startup sequence over {} channels", channel_count);
    capabilities.delay_ms(STARTUP_SETTLE_MS).await;
    for channel in 0..channel_count {
        capabilities.flash_channel(channel, STARTUP_COLOR).await;
        capabilities.delay_ms(STARTUP_FLASH_MS).await;
        capabilities.blank_all().await;
    }
}

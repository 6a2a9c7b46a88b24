//! Pixel-to-symbol encoders for WS2812-class LEDs.
//!
//! Pixel buffers hold `R, G, B` bytes; the LEDs expect `G, R, B`, most significant bit first. An
//! [`Encoder`] turns raw pixels into whatever unit its output hardware consumes:
//!
//! | Encoder | Symbol | Symbols per pixel | Hardware |
//! |---|---|---|---|
//! | [`PulseEncoder`] | [`PulseCode`] | 24 | tick-timed pulse generators |
//! | [`GrbByteEncoder`] | `u8` | 3 | SPI-style byte shifters |
//! | [`PioWordEncoder`] | `u32` | 1 | the RP2040/RP2350 PIO program in [`crate::output`] |
//!
//! ```
//! use pixel_envoy::encoder::{Encoder, GrbByteEncoder};
//!
//! let mut out = [0_u8; 6];
//! let written = GrbByteEncoder.encode(&[1, 2, 3, 4, 5, 6], &mut out);
//! assert_eq!(written, 6);
//! assert_eq!(out, [2, 1, 3, 5, 4, 6]);
//! ```

use smart_leds::RGB8;

use crate::channel_config::BYTES_PER_PIXEL;

// ============================================================================
// Pulse timing
// ============================================================================

/// Source clock of the pulse generator.
pub const TRANSMIT_CLOCK_HZ: u32 = 80_000_000;

/// Divider applied to [`TRANSMIT_CLOCK_HZ`]; one tick is 25 ns.
pub const CLOCK_DIVIDER: u32 = 2;

/// WS2812 data rate.
pub const BIT_RATE_HZ: u32 = 800_000;

/// Ticks in one 1.25 µs bit period.
pub const TICKS_PER_BIT: u16 = 50;

/// High time of a `0` bit (0.4 µs).
pub const T0H_TICKS: u16 = 16;

/// Low time of a `0` bit (0.85 µs).
pub const T0L_TICKS: u16 = TICKS_PER_BIT - T0H_TICKS;

/// High time of a `1` bit (0.8 µs).
pub const T1H_TICKS: u16 = 32;

/// Low time of a `1` bit (0.45 µs).
pub const T1L_TICKS: u16 = TICKS_PER_BIT - T1H_TICKS;

/// Data bits per pixel.
pub const BITS_PER_PIXEL: usize = 24;

// Most significant bit first.
const BIT_MASKS: [u8; 8] = [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01];

const _: () = assert!(TRANSMIT_CLOCK_HZ / CLOCK_DIVIDER / BIT_RATE_HZ == TICKS_PER_BIT as u32);
const _: () = assert!(T0H_TICKS + T0L_TICKS == TICKS_PER_BIT);
const _: () = assert!(T1H_TICKS + T1L_TICKS == TICKS_PER_BIT);
const _: () = assert!(T0H_TICKS < T1H_TICKS);

/// One bit on the wire: high for `high_ticks`, then low for `low_ticks`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct PulseCode {
    /// Ticks the line is held high.
    pub high_ticks: u16,
    /// Ticks the line is held low.
    pub low_ticks: u16,
}

impl PulseCode {
    /// Encoding of a `0` bit.
    pub const ZERO: Self = Self {
        high_ticks: T0H_TICKS,
        low_ticks: T0L_TICKS,
    };

    /// Encoding of a `1` bit.
    pub const ONE: Self = Self {
        high_ticks: T1H_TICKS,
        low_ticks: T1L_TICKS,
    };

    /// Encoding of `bit`.
    #[must_use]
    pub const fn for_bit(bit: bool) -> Self {
        if bit { Self::ONE } else { Self::ZERO }
    }
}

// ============================================================================
// Encoder trait
// ============================================================================

/// Converts `R, G, B` pixel bytes into output symbols.
pub trait Encoder {
    /// Unit consumed by the output hardware.
    type Symbol: Copy + Default;

    /// Symbols produced for every pixel.
    const SYMBOLS_PER_PIXEL: usize;

    /// Encode one pixel into exactly [`SYMBOLS_PER_PIXEL`](Self::SYMBOLS_PER_PIXEL) symbols.
    fn encode_pixel(&self, rgb: [u8; BYTES_PER_PIXEL], out: &mut [Self::Symbol]);

    /// Encode every whole pixel of `pixels` that fits in `out`.
    ///
    /// Returns the number of symbols written.
    fn encode(&self, pixels: &[u8], out: &mut [Self::Symbol]) -> usize {
        let mut written: usize = 0;
        for (rgb, symbols) in pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(out.chunks_exact_mut(Self::SYMBOLS_PER_PIXEL))
        {
            if let &[red, green, blue] = rgb {
                self.encode_pixel([red, green, blue], symbols);
                written = written.saturating_add(Self::SYMBOLS_PER_PIXEL);
            }
        }
        written
    }

    /// Encode `pixel_count` pixels of one color.
    ///
    /// Returns the number of symbols written.
    fn encode_solid(&self, color: RGB8, pixel_count: usize, out: &mut [Self::Symbol]) -> usize {
        let mut written: usize = 0;
        for symbols in out
            .chunks_exact_mut(Self::SYMBOLS_PER_PIXEL)
            .take(pixel_count)
        {
            self.encode_pixel([color.r, color.g, color.b], symbols);
            written = written.saturating_add(Self::SYMBOLS_PER_PIXEL);
        }
        written
    }

    /// Encode `pixel_count` black pixels, identical to encoding a zero-filled buffer.
    fn blank(&self, pixel_count: usize, out: &mut [Self::Symbol]) -> usize {
        self.encode_solid(RGB8::default(), pixel_count, out)
    }
}

/// Wire byte order of one pixel.
const fn grb([red, green, blue]: [u8; BYTES_PER_PIXEL]) -> [u8; BYTES_PER_PIXEL] {
    [green, red, blue]
}

// ============================================================================
// Backends
// ============================================================================

/// One [`PulseCode`] per bit, most significant bit first, in `G, R, B` order.
#[derive(Clone, Copy, Debug, Default)]
pub struct PulseEncoder;

impl Encoder for PulseEncoder {
    type Symbol = PulseCode;
    const SYMBOLS_PER_PIXEL: usize = BITS_PER_PIXEL;

    fn encode_pixel(&self, rgb: [u8; BYTES_PER_PIXEL], out: &mut [PulseCode]) {
        let bits = grb(rgb)
            .into_iter()
            .flat_map(|byte| BIT_MASKS.into_iter().map(move |mask| byte & mask != 0));
        for (code, bit) in out.iter_mut().zip(bits) {
            *code = PulseCode::for_bit(bit);
        }
    }
}

/// Three bytes per pixel in `G, R, B` order.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrbByteEncoder;

impl Encoder for GrbByteEncoder {
    type Symbol = u8;
    const SYMBOLS_PER_PIXEL: usize = BYTES_PER_PIXEL;

    fn encode_pixel(&self, rgb: [u8; BYTES_PER_PIXEL], out: &mut [u8]) {
        for (byte, wire) in out.iter_mut().zip(grb(rgb)) {
            *byte = wire;
        }
    }
}

/// One left-aligned word per pixel, `G << 24 | R << 16 | B << 8`, for a PIO state machine that
/// shifts out 24 bits per pull.
#[derive(Clone, Copy, Debug, Default)]
pub struct PioWordEncoder;

impl Encoder for PioWordEncoder {
    type Symbol = u32;
    const SYMBOLS_PER_PIXEL: usize = 1;

    fn encode_pixel(&self, rgb: [u8; BYTES_PER_PIXEL], out: &mut [u32]) {
        let [green, red, blue] = grb(rgb);
        if let Some(word) = out.first_mut() {
            *word = u32::from_be_bytes([green, red, blue, 0]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_leds::colors;

    #[test]
    fn pulse_encoder_is_grb_msb_first() {
        let mut out = [PulseCode::default(); BITS_PER_PIXEL];
        assert_eq!(PulseEncoder.encode(&[0x00, 0x80, 0x01], &mut out), 24);
        // Green 0x80 leads with its high bit set.
        assert_eq!(out[0], PulseCode::ONE);
        assert!(out[1..8].iter().all(|code| *code == PulseCode::ZERO));
        // Red 0x00.
        assert!(out[8..16].iter().all(|code| *code == PulseCode::ZERO));
        // Blue 0x01 ends with its low bit set.
        assert!(out[16..23].iter().all(|code| *code == PulseCode::ZERO));
        assert_eq!(out[23], PulseCode::ONE);
    }

    #[test]
    fn pulse_codes_fill_the_bit_period() {
        assert_eq!(PulseCode::ZERO.high_ticks, 16);
        assert_eq!(PulseCode::ZERO.low_ticks, 34);
        assert_eq!(PulseCode::ONE.high_ticks, 32);
        assert_eq!(PulseCode::ONE.low_ticks, 18);
    }

    #[test]
    fn blank_matches_encoding_zeros() {
        let zeros = [0_u8; 5 * BYTES_PER_PIXEL];

        let mut encoded = [PulseCode::default(); 5 * BITS_PER_PIXEL];
        let mut blanked = [PulseCode::ONE; 5 * BITS_PER_PIXEL];
        assert_eq!(PulseEncoder.encode(&zeros, &mut encoded), 120);
        assert_eq!(PulseEncoder.blank(5, &mut blanked), 120);
        assert_eq!(encoded, blanked);

        let mut encoded = [0xFF_u32; 5];
        let mut blanked = [0xAA_u32; 5];
        PioWordEncoder.encode(&zeros, &mut encoded);
        PioWordEncoder.blank(5, &mut blanked);
        assert_eq!(encoded, blanked);
    }

    #[test]
    fn byte_and_word_encoders_reorder_to_grb() {
        let pixels = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        let mut bytes = [0_u8; 6];
        GrbByteEncoder.encode(&pixels, &mut bytes);
        assert_eq!(bytes, [0x22, 0x11, 0x33, 0x55, 0x44, 0x66]);

        let mut words = [0_u32; 2];
        assert_eq!(PioWordEncoder.encode(&pixels, &mut words), 2);
        assert_eq!(words, [0x2211_3300, 0x5544_6600]);
    }

    #[test]
    fn solid_color_fills_only_the_requested_pixels() {
        let mut words = [0_u32; 4];
        assert_eq!(PioWordEncoder.encode_solid(colors::RED, 3, &mut words), 3);
        assert_eq!(words, [0x00FF_0000, 0x00FF_0000, 0x00FF_0000, 0]);
    }

    #[test]
    fn output_shorter_than_input_is_not_overrun() {
        let mut bytes = [0_u8; 4];
        assert_eq!(GrbByteEncoder.encode(&[1, 2, 3, 4, 5, 6], &mut bytes), 3);
        assert_eq!(bytes, [2, 1, 3, 0]);
    }
}

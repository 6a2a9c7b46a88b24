//! Sender-assigned frame identifiers with wraparound-safe ordering.

use core::fmt;
use core::num::NonZeroU32;

/// A non-zero 32-bit frame identifier.
///
/// Identifier `0` is reserved for "no frame", so it cannot be represented; use
/// `Option<FrameId>` for slots that may be empty.
///
/// Ordering wraps around: `a` is newer than `b` when `a - b`, read as a two's-complement `i32`,
/// is positive. That is not a total order, so `FrameId` has no `Ord` impl.
///
/// ```
/// use pixel_envoy::frame_assembly::FrameId;
///
/// let before_wrap = FrameId::new(0xFFFF_FFFE).unwrap();
/// let after_wrap = FrameId::new(1).unwrap();
/// assert!(after_wrap.is_newer_than(before_wrap));
/// assert!(!before_wrap.is_newer_than(after_wrap));
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct FrameId(NonZeroU32);

impl FrameId {
    /// Wrap a raw identifier; `None` for the reserved value `0`.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// `true` if `self` was assigned after `other`.
    #[must_use]
    #[expect(
        clippy::cast_possible_wrap,
        reason = "the signed reinterpretation is the wraparound comparison"
    )]
    pub const fn is_newer_than(self, other: Self) -> bool {
        (self.get().wrapping_sub(other.get()) as i32) > 0
    }

    /// The newer of two identifiers (`self` on a tie).
    #[must_use]
    pub const fn newest(self, other: Self) -> Self {
        if other.is_newer_than(self) { other } else { self }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> FrameId {
        FrameId::new(raw).unwrap()
    }

    #[test]
    fn zero_is_reserved() {
        assert_eq!(FrameId::new(0), None);
    }

    #[test]
    fn plain_ordering() {
        assert!(id(2).is_newer_than(id(1)));
        assert!(!id(1).is_newer_than(id(2)));
        assert!(!id(7).is_newer_than(id(7)));
    }

    #[test]
    fn wraparound_ordering() {
        assert!(id(1).is_newer_than(id(0xFFFF_FFFE)));
        assert!(id(0x8000_0000).is_newer_than(id(1)));
        assert_eq!(id(0xFFFF_FFFF).newest(id(3)), id(3));
    }
}

//! Wrapping 16-bit frame identifiers
//!
//! Frame ids are a sender-side counter that wraps at 2^16. Ordering is only
//! meaningful inside a window of less than half the id space, so all
//! comparisons go through the signed 16-bit difference rather than `<` on
//! the raw value.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameId(u16);

impl FrameId {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn prev(self) -> Self {
        Self(self.0.wrapping_sub(1))
    }

    /// Signed distance from `origin` to `self`.
    ///
    /// Positive when `self` comes after `origin` in serial order.
    #[inline]
    pub fn distance_from(self, origin: FrameId) -> i16 {
        self.0.wrapping_sub(origin.0) as i16
    }

    /// Unsigned offset of `self` past `origin`, for sorting ids that are
    /// known to lie at or after `origin`.
    #[inline]
    pub fn offset_from(self, origin: FrameId) -> u16 {
        self.0.wrapping_sub(origin.0)
    }

    /// Serial-number comparison.
    pub fn serial_cmp(self, other: FrameId) -> Ordering {
        self.distance_from(other).cmp(&0)
    }

    pub fn is_after(self, other: FrameId) -> bool {
        self.distance_from(other) > 0
    }

    pub fn is_at_or_before(self, other: FrameId) -> bool {
        self.distance_from(other) <= 0
    }
}

impl From<u16> for FrameId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

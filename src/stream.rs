//! Back-pressured streaming interface shared by all transmit stages
//!
//! Every stage of the transmit chain accepts items one at a time through [`Stage::push`] and
//! yields items one at a time through [`Stage::pop`]. A stage that cannot take another item
//! reports this through [`Stage::is_ready`], and an upstream stage must hold its item until the
//! downstream stage is ready again. Nothing is ever dropped or duplicated across a stall.

use crate::Bit;

/// Streaming stage with ready/valid handshakes on both sides
pub trait Stage {
    /// Type of item accepted from upstream
    type Input;
    /// Type of item handed downstream
    type Output;

    /// Returns `true` if the stage can accept an input item right now.
    fn is_ready(&self) -> bool;

    /// Offers an input item to the stage, and returns `true` if it was accepted.
    ///
    /// Offering an item while [`Stage::is_ready`] is `false` is a protocol violation: it panics
    /// in debug builds, and leaves the stage untouched (returning `false`) in release builds.
    fn push(&mut self, item: Self::Input) -> bool;

    /// Returns the next output item, if one is available.
    fn pop(&mut self) -> Option<Self::Output>;

    /// Restores the stage to its power-on state.
    fn reset(&mut self);
}

/// Checks the ready handshake before an item is accepted by a stage.
pub(crate) fn accept_guard(ready: bool, stage_name: &str) -> bool {
    debug_assert!(ready, "{stage_name} was offered an input while not ready");
    ready
}

/// Moves items from `upstream` to `downstream` while both sides allow it, up to `max_items`.
///
/// Each moved item is also recorded in `tap`. Returns the number of items moved.
pub(crate) fn transfer<U, D>(
    upstream: &mut U,
    downstream: &mut D,
    max_items: usize,
    tap: &mut Tap,
) -> usize
where
    U: Stage<Output = Bit>,
    D: Stage<Input = Bit>,
{
    let mut num_moved = 0;
    while num_moved < max_items && downstream.is_ready() {
        let Some(bit) = upstream.pop() else {
            break;
        };
        downstream.push(bit);
        tap.record(bit);
        num_moved += 1;
    }
    num_moved
}

/// Maximum number of bits crossing a link between two stages in one tick
pub const TAP_CAPACITY: usize = 2;

/// Debug tap: the bits that crossed one inter-stage link during a single tick
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
pub struct Tap {
    /// Bits seen on the link, in order
    bits: [Bit; TAP_CAPACITY],
    /// Number of valid entries in `bits`
    len: usize,
}

impl Tap {
    /// Records a bit seen on the link.
    pub(crate) fn record(&mut self, bit: Bit) {
        debug_assert!(self.len < TAP_CAPACITY, "tap overflow");
        if self.len < TAP_CAPACITY {
            self.bits[self.len] = bit;
            self.len += 1;
        }
    }

    /// Returns the bits seen on the link during the tick.
    #[must_use]
    pub fn bits(&self) -> &[Bit] {
        &self.bits[.. self.len]
    }

    /// Returns `true` if no bit crossed the link during the tick.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

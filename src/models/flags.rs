//! Packed boolean flags.
//!
//! [`FlagSet`] stores up to 32 named booleans in one `u32`. Each flag type
//! implements [`Flag`] to map its variants to bit positions, so callers read
//! and write by name (`flags.contains(ActivityFlag::Paused)`) and never see a
//! bit index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A named flag stored in a [`FlagSet`].
pub trait Flag: Copy + fmt::Debug + 'static {
    /// Every variant, in bit order.
    const ALL: &'static [Self];

    /// Bit position (0..32).
    fn bit(self) -> u32;
}

/// A fixed-width set of named flags packed into a `u32`.
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct FlagSet<F: Flag> {
    bits: u32,
    #[serde(skip)]
    _flag: PhantomData<F>,
}

impl<F: Flag> FlagSet<F> {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            bits: 0,
            _flag: PhantomData,
        }
    }

    /// Restores a set from its packed form.
    ///
    /// Bits with no named flag are kept so that values written by newer
    /// versions survive a read/write cycle.
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _flag: PhantomData,
        }
    }

    /// The packed form.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Whether `flag` is set.
    #[inline]
    pub fn contains(&self, flag: F) -> bool {
        self.bits & (1 << flag.bit()) != 0
    }

    /// Sets or clears `flag`. Returns `true` if the value changed.
    pub fn set(&mut self, flag: F, value: bool) -> bool {
        let before = self.bits;
        if value {
            self.bits |= 1 << flag.bit();
        } else {
            self.bits &= !(1 << flag.bit());
        }
        before != self.bits
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, flag: F) -> Self {
        self.set(flag, true);
        self
    }

    /// Whether no flag is set.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterates the named flags that are set.
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(move |f| self.contains(*f))
    }
}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Flag> Clone for FlagSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Flag> Copy for FlagSet<F> {}

impl<F: Flag> PartialEq for FlagSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F: Flag> Eq for FlagSet<F> {}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Per-activity scheduling and tracking flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityFlag {
    /// The last scheduling pass found a feasible placement.
    Feasible,
    /// The scheduler may move this activity ahead of others.
    Jumpable,
    /// Start is pinned to the anchor date.
    Anchored,
    /// A batch currently holds this activity.
    Scheduled,
    /// A transfer/connection constraint with a neighbour is violated.
    ConnectionViolated,
    /// Scheduled capacity covers post-processing only.
    ScheduledOnlyForPostProcessingTime,
    /// Scheduled capacity covers cleaning only.
    ScheduledOnlyForCleanTime,
    /// Production is on hold.
    Paused,
    /// Progress was reported internally; external updates are gated.
    ManualUpdateOnly,
    /// The activity was in process when the last status update arrived.
    InProcessBeforeStatusUpdate,
}

impl Flag for ActivityFlag {
    const ALL: &'static [Self] = &[
        Self::Feasible,
        Self::Jumpable,
        Self::Anchored,
        Self::Scheduled,
        Self::ConnectionViolated,
        Self::ScheduledOnlyForPostProcessingTime,
        Self::ScheduledOnlyForCleanTime,
        Self::Paused,
        Self::ManualUpdateOnly,
        Self::InProcessBeforeStatusUpdate,
    ];

    fn bit(self) -> u32 {
        self as u32
    }
}

/// Flags of an [`InternalActivity`](super::InternalActivity).
pub type ActivityFlags = FlagSet<ActivityFlag>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut flags = ActivityFlags::new();
        assert!(flags.is_empty());

        assert!(flags.set(ActivityFlag::Paused, true));
        assert!(flags.contains(ActivityFlag::Paused));
        assert!(!flags.contains(ActivityFlag::Scheduled));

        // Unchanged value reports no change.
        assert!(!flags.set(ActivityFlag::Paused, true));
        assert!(flags.set(ActivityFlag::Paused, false));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_flags_are_independent() {
        let mut flags = ActivityFlags::new();
        for f in ActivityFlag::ALL {
            flags.set(*f, true);
        }
        assert_eq!(flags.bits(), (1u32 << ActivityFlag::ALL.len()) - 1);

        flags.set(ActivityFlag::Anchored, false);
        for f in ActivityFlag::ALL {
            assert_eq!(flags.contains(*f), *f != ActivityFlag::Anchored);
        }
    }

    #[test]
    fn test_unknown_bits_survive() {
        let flags = ActivityFlags::from_bits(1u32 << 31 | 1);
        assert!(flags.contains(ActivityFlag::Feasible));
        assert_eq!(flags.iter().count(), 1);
        assert_eq!(flags.bits(), 1u32 << 31 | 1);
    }

    #[test]
    fn test_serde_as_bits() {
        let flags = ActivityFlags::new()
            .with(ActivityFlag::Scheduled)
            .with(ActivityFlag::Jumpable);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, flags.bits().to_string());
        let back: ActivityFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Transactional event flags carried by every indexed event.
///
/// The bit assignments are part of the upstream wire contract and must not change:
///
/// | bit | flag             | meaning                                                    |
/// |-----|------------------|------------------------------------------------------------|
/// | 0   | `TX_PENDING`     | event is mid-transaction, do not emit downstream yet       |
/// | 1   | `REMOVE_EVENT`   | interpret this event as a deletion of its index            |
/// | 2   | `SNAPSHOT_BEGIN` | first event of a snapshot                                  |
/// | 3   | `SNAPSHOT_END`   | last event of a snapshot                                   |
/// | 4   | `SNAPSHOT_MODE`  | legacy full-snapshot marker                                |
/// | 5   | `REMOVE_SYMBOL`  | unsubscribe-side marker, not normally seen by listeners    |
///
/// `SNAPSHOT_BEGIN` implies `TX_PENDING` until the snapshot closes.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct EventFlags(pub u32);

impl EventFlags {
    /// Event is part of a transaction that has not completed yet.
    pub const TX_PENDING: EventFlags = EventFlags(0x01);
    /// Event is a signal to remove the entry with this index.
    pub const REMOVE_EVENT: EventFlags = EventFlags(0x02);
    /// First event of a snapshot for its (symbol, source) pair.
    pub const SNAPSHOT_BEGIN: EventFlags = EventFlags(0x04);
    /// Last event of a snapshot for its (symbol, source) pair.
    pub const SNAPSHOT_END: EventFlags = EventFlags(0x08);
    /// Legacy marker set on every event of a full snapshot.
    pub const SNAPSHOT_MODE: EventFlags = EventFlags(0x10);
    /// Unsubscribe-side marker, filtered before listener delivery.
    pub const REMOVE_SYMBOL: EventFlags = EventFlags(0x20);

    /// Empty flag set.
    pub const EMPTY: EventFlags = EventFlags(0);

    /// Union of all bits with a defined meaning.
    pub const ALL: EventFlags = EventFlags(0x3F);

    /// Construct a flag set from a raw bit mask, keeping only defined bits.
    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bit mask.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(&self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bits are set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Return `self` with the bits of `other` set.
    pub fn with(self, other: EventFlags) -> Self {
        Self(self.0 | other.0)
    }

    /// Return `self` with the bits of `other` cleared.
    pub fn without(self, other: EventFlags) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether this event terminates its transaction: `TX_PENDING` is set on every
    /// event of a transaction but the last.
    pub fn completes_transaction(&self) -> bool {
        !self.contains(Self::TX_PENDING)
    }

    /// Whether this event closes a snapshot that is in progress.
    ///
    /// A snapshot closes on an explicit `SNAPSHOT_END`, or - for legacy feeds that never
    /// send one - on the first event after `SNAPSHOT_BEGIN` with `TX_PENDING` clear.
    pub fn closes_snapshot(&self) -> bool {
        self.contains(Self::SNAPSHOT_END) || self.completes_transaction()
    }
}

impl BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventFlags {
    type Output = EventFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        EventFlags(self.0 & rhs.0)
    }
}

impl Display for EventFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const NAMES: [(EventFlags, &str); 6] = [
            (EventFlags::TX_PENDING, "TX_PENDING"),
            (EventFlags::REMOVE_EVENT, "REMOVE_EVENT"),
            (EventFlags::SNAPSHOT_BEGIN, "SNAPSHOT_BEGIN"),
            (EventFlags::SNAPSHOT_END, "SNAPSHOT_END"),
            (EventFlags::SNAPSHOT_MODE, "SNAPSHOT_MODE"),
            (EventFlags::REMOVE_SYMBOL, "REMOVE_SYMBOL"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }

        if first {
            write!(f, "0")?;
        }

        Ok(())
    }
}

impl fmt::Debug for EventFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EventFlags({self})")
    }
}

//! Message filters
//!
//! Filters are stored in the message RAM and evaluated by the controller in
//! list order. Initialization disables every element, so nothing is accepted
//! until filters are installed with [`Mcan::set_standard_filter`] or
//! [`Mcan::set_extended_filter`].
//!
//! [`Mcan::set_standard_filter`]: crate::bus::Mcan::set_standard_filter
//! [`Mcan::set_extended_filter`]: crate::bus::Mcan::set_extended_filter

use embedded_can::{ExtendedId, StandardId};

/// Acceptance filter for 11-bit identifiers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Element is skipped during acceptance filtering
    Disabled,
    /// Matches `low..=high`
    Range {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        low: StandardId,
        #[allow(missing_docs)]
        high: StandardId,
    },
    /// Matches either of two identifiers
    Dual {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        id1: StandardId,
        #[allow(missing_docs)]
        id2: StandardId,
    },
    /// Matches when `id & mask == filter & mask`
    Classic {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        filter: StandardId,
        #[allow(missing_docs)]
        mask: StandardId,
    },
}

/// Acceptance filter for 29-bit identifiers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtFilter {
    /// Element is skipped during acceptance filtering
    Disabled,
    /// Matches `low..=high` after the identifier is ANDed with XIDAM
    MaskedRange {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        low: ExtendedId,
        #[allow(missing_docs)]
        high: ExtendedId,
    },
    /// Matches either of two identifiers
    Dual {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        id1: ExtendedId,
        #[allow(missing_docs)]
        id2: ExtendedId,
    },
    /// Matches when `id & mask == filter & mask`
    Classic {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        filter: ExtendedId,
        #[allow(missing_docs)]
        mask: ExtendedId,
    },
    /// Matches `low..=high`, XIDAM not applied
    Range {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        low: ExtendedId,
        #[allow(missing_docs)]
        high: ExtendedId,
    },
}

/// What the controller does with a frame that matched
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Store into RX FIFO 0
    StoreFifo0,
    /// Store into RX FIFO 1
    StoreFifo1,
    /// Discard the frame
    Reject,
    /// Flag a high priority message, don't store
    Priority,
    /// Flag a high priority message and store into RX FIFO 0
    PriorityFifo0,
    /// Flag a high priority message and store into RX FIFO 1
    PriorityFifo1,
}

impl Action {
    /// SFEC/EFEC field value
    const fn code(self) -> u32 {
        match self {
            Action::StoreFifo0 => 1,
            Action::StoreFifo1 => 2,
            Action::Reject => 3,
            Action::Priority => 4,
            Action::PriorityFifo0 => 5,
            Action::PriorityFifo1 => 6,
        }
    }
}

/// SFT/EFT field values
mod kind {
    pub const RANGE: u32 = 0;
    pub const DUAL: u32 = 1;
    pub const CLASSIC: u32 = 2;
    pub const RANGE_NO_XIDAM: u32 = 3;
}

impl Filter {
    /// Standard filter element word. [`Filter::Disabled`] encodes as 0.
    pub fn encode(self) -> u32 {
        let (kind, action, first, second) = match self {
            Filter::Disabled => return 0,
            Filter::Range { action, low, high } => (kind::RANGE, action, low, high),
            Filter::Dual { action, id1, id2 } => (kind::DUAL, action, id1, id2),
            Filter::Classic {
                action,
                filter,
                mask,
            } => (kind::CLASSIC, action, filter, mask),
        };
        kind << 30
            | action.code() << 27
            | u32::from(first.as_raw()) << 16
            | u32::from(second.as_raw())
    }
}

impl ExtFilter {
    /// Extended filter element words F0 and F1. [`ExtFilter::Disabled`]
    /// encodes as two zero words.
    pub fn encode(self) -> [u32; 2] {
        let (kind, action, first, second) = match self {
            ExtFilter::Disabled => return [0, 0],
            ExtFilter::MaskedRange { action, low, high } => (kind::RANGE, action, low, high),
            ExtFilter::Dual { action, id1, id2 } => (kind::DUAL, action, id1, id2),
            ExtFilter::Classic {
                action,
                filter,
                mask,
            } => (kind::CLASSIC, action, filter, mask),
            ExtFilter::Range { action, low, high } => (kind::RANGE_NO_XIDAM, action, low, high),
        };
        [
            action.code() << 29 | first.as_raw(),
            kind << 30 | second.as_raw(),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn std_id(raw: u16) -> StandardId {
        StandardId::new(raw).unwrap()
    }

    fn ext_id(raw: u32) -> ExtendedId {
        ExtendedId::new(raw).unwrap()
    }

    #[test]
    fn disabled_is_zero() {
        assert_eq!(Filter::Disabled.encode(), 0);
        assert_eq!(ExtFilter::Disabled.encode(), [0, 0]);
    }

    #[test]
    fn standard_encodings() {
        let range = Filter::Range {
            action: Action::StoreFifo1,
            low: std_id(0x100),
            high: std_id(0x1ff),
        };
        assert_eq!(range.encode(), 0x1ff | 0x100 << 16 | 2 << 27);

        let classic = Filter::Classic {
            action: Action::StoreFifo0,
            filter: std_id(0x123),
            mask: std_id(0x7ff),
        };
        assert_eq!(classic.encode(), 0x8923_07ff);

        let dual = Filter::Dual {
            action: Action::Reject,
            id1: std_id(1),
            id2: std_id(2),
        };
        assert_eq!(dual.encode(), 2 | 1 << 16 | 3 << 27 | 1 << 30);
    }

    #[test]
    fn extended_encodings() {
        let classic = ExtFilter::Classic {
            action: Action::PriorityFifo1,
            filter: ext_id(0x1abc_def),
            mask: ext_id(0x1fff_ffff),
        };
        assert_eq!(classic.encode(), [0xc000_0000 | 0x1abc_def, 0x9fff_ffff]);

        let range = ExtFilter::Range {
            action: Action::StoreFifo0,
            low: ext_id(0),
            high: ext_id(0x10),
        };
        assert_eq!(range.encode(), [1 << 29, 0xc000_0010]);

        let masked = ExtFilter::MaskedRange {
            action: Action::Reject,
            low: ext_id(5),
            high: ext_id(6),
        };
        assert_eq!(masked.encode(), [3 << 29 | 5, 6]);
    }
}

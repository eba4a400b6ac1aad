//! Interrupt flags and their grouping
//!
//! The controller raises one flag per event in IR; IE selects which flags
//! assert the interrupt line. The driver routes everything to line 0 and
//! handles the flags by category in [`Mcan::on_interrupt`].
//!
//! [`Mcan::on_interrupt`]: crate::bus::Mcan::on_interrupt

pub(crate) mod dispatch;

use core::ops::{BitAnd, BitOr, Not, Sub};

/// A set of CAN interrupts, laid out as IR and IE.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct InterruptSet(u32);

const fn bits(interrupts: &[Interrupt]) -> u32 {
    let mut set = 0;
    let mut i = 0;
    while i < interrupts.len() {
        set |= 1 << interrupts[i] as u32;
        i += 1;
    }
    set
}

impl InterruptSet {
    /// No interrupts
    pub const EMPTY: Self = Self(0);
    /// Every implemented interrupt; bits 20 and 21 are reserved
    pub const ALL: Self = Self(0xffcf_ffff);

    /// Faults not tied to a direction: RAM access failure, timeout, error
    /// passive, bus off, watchdog
    pub const COMMON_ERRORS: Self = Self(bits(&[
        Interrupt::MessageRamAccessFailure,
        Interrupt::TimeoutOccured,
        Interrupt::ErrorPassive,
        Interrupt::BusOff,
        Interrupt::Watchdog,
    ]));
    /// Protocol errors detected on reception
    pub const RX_COMMON: Self = Self(bits(&[
        Interrupt::CrcError,
        Interrupt::FormatError,
        Interrupt::StuffError,
    ]));
    #[allow(missing_docs)]
    pub const RX_FIFO_0: Self = Self(bits(&[
        Interrupt::RxFifo0NewMessage,
        Interrupt::RxFifo0WatermarkReached,
        Interrupt::RxFifo0Full,
        Interrupt::RxFifo0MessageLost,
    ]));
    #[allow(missing_docs)]
    pub const RX_FIFO_1: Self = Self(bits(&[
        Interrupt::RxFifo1NewMessage,
        Interrupt::RxFifo1WatermarkReached,
        Interrupt::RxFifo1Full,
        Interrupt::RxFifo1MessageLost,
    ]));
    /// Everything signalled when receiving through the FIFOs
    pub const RX_FIFO: Self = Self(
        Self::RX_FIFO_0.0
            | Self::RX_FIFO_1.0
            | bits(&[Interrupt::HighPriorityMessage])
            | Self::RX_COMMON.0,
    );
    /// Receive faults
    pub const RX_ERRORS: Self = Self(
        bits(&[
            Interrupt::RxFifo0MessageLost,
            Interrupt::RxFifo1MessageLost,
        ]) | Self::RX_COMMON.0,
    );
    /// Completion and errors of any transmission
    pub const TX_COMMON: Self = Self(bits(&[
        Interrupt::TransmissionCompleted,
        Interrupt::TransmissionCancellationFinished,
        Interrupt::BitError,
        Interrupt::AcknowledgeError,
    ]));
    /// Everything signalled when transmitting through the FIFO/queue
    pub const TX_FIFO_QUEUE: Self =
        Self(bits(&[Interrupt::TxFifoEmpty]) | Self::TX_COMMON.0);
    /// Transmit faults
    pub const TX_ERRORS: Self = Self(bits(&[
        Interrupt::TxEventFifoElementLost,
        Interrupt::BitError,
        Interrupt::AcknowledgeError,
    ]));

    /// Wrap a raw IR/IE value. Reserved bits are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw IR/IE value
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` if no interrupt is in the set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` if `self` and `other` share an interrupt
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// `true` if every interrupt of `other` is in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// An iterator visiting all elements in ascending bit order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

impl BitOr for InterruptSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for InterruptSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Sub for InterruptSet {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl Not for InterruptSet {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl From<Interrupt> for InterruptSet {
    fn from(int: Interrupt) -> Self {
        Self(int.into())
    }
}

impl FromIterator<Interrupt> for InterruptSet {
    fn from_iter<T: IntoIterator<Item = Interrupt>>(iter: T) -> Self {
        let mut set = 0_u32;
        for int in iter.into_iter() {
            set |= u32::from(int);
        }
        InterruptSet(set)
    }
}

impl core::fmt::Debug for InterruptSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InterruptSet {{ ")?;
        for int in self.iter() {
            write!(f, "{} ", int.name())?;
        }
        write!(f, "}}")
    }
}

/// A single interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// RF0N
    RxFifo0NewMessage = 0,
    /// RF0W
    RxFifo0WatermarkReached = 1,
    /// RF0F
    RxFifo0Full = 2,
    /// RF0L
    RxFifo0MessageLost = 3,
    /// RF1N
    RxFifo1NewMessage = 4,
    /// RF1W
    RxFifo1WatermarkReached = 5,
    /// RF1F
    RxFifo1Full = 6,
    /// RF1L
    RxFifo1MessageLost = 7,
    /// HPM
    HighPriorityMessage = 8,
    /// TC
    TransmissionCompleted = 9,
    /// TCF
    TransmissionCancellationFinished = 10,
    /// TFE
    TxFifoEmpty = 11,
    /// TEFN
    TxEventFifoNewEntry = 12,
    /// TEFW
    TxEventFifoWatermarkReached = 13,
    /// TEFF
    TxEventFifoFull = 14,
    /// TEFL
    TxEventFifoElementLost = 15,
    /// TSW
    TimestampWraparound = 16,
    /// MRAF
    MessageRamAccessFailure = 17,
    /// TOO
    TimeoutOccured = 18,
    /// DRX
    MessageStoredToDedicatedRxBuffer = 19,
    /// ELO
    ErrorLoggingOverflow = 22,
    /// EP
    ErrorPassive = 23,
    /// EW
    WarningStatusChanged = 24,
    /// BO
    BusOff = 25,
    /// WDI
    Watchdog = 26,
    /// CRCE
    CrcError = 27,
    /// BE
    BitError = 28,
    /// ACKE
    AcknowledgeError = 29,
    /// FOE
    FormatError = 30,
    /// STE
    StuffError = 31,
}

impl Interrupt {
    /// Datasheet abbreviation
    pub const fn name(self) -> &'static str {
        use Interrupt::*;
        match self {
            RxFifo0NewMessage => "RF0N",
            RxFifo0WatermarkReached => "RF0W",
            RxFifo0Full => "RF0F",
            RxFifo0MessageLost => "RF0L",
            RxFifo1NewMessage => "RF1N",
            RxFifo1WatermarkReached => "RF1W",
            RxFifo1Full => "RF1F",
            RxFifo1MessageLost => "RF1L",
            HighPriorityMessage => "HPM",
            TransmissionCompleted => "TC",
            TransmissionCancellationFinished => "TCF",
            TxFifoEmpty => "TFE",
            TxEventFifoNewEntry => "TEFN",
            TxEventFifoWatermarkReached => "TEFW",
            TxEventFifoFull => "TEFF",
            TxEventFifoElementLost => "TEFL",
            TimestampWraparound => "TSW",
            MessageRamAccessFailure => "MRAF",
            TimeoutOccured => "TOO",
            MessageStoredToDedicatedRxBuffer => "DRX",
            ErrorLoggingOverflow => "ELO",
            ErrorPassive => "EP",
            WarningStatusChanged => "EW",
            BusOff => "BO",
            Watchdog => "WDI",
            CrcError => "CRCE",
            BitError => "BE",
            AcknowledgeError => "ACKE",
            FormatError => "FOE",
            StuffError => "STE",
        }
    }
}

impl From<Interrupt> for u32 {
    fn from(x: Interrupt) -> Self {
        1 << x as u32
    }
}

/// The bit number is reserved or beyond the register width
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidInterruptNumber;

impl TryFrom<u8> for Interrupt {
    type Error = InvalidInterruptNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Interrupt::*;
        let ret = match value {
            0 => RxFifo0NewMessage,
            1 => RxFifo0WatermarkReached,
            2 => RxFifo0Full,
            3 => RxFifo0MessageLost,
            4 => RxFifo1NewMessage,
            5 => RxFifo1WatermarkReached,
            6 => RxFifo1Full,
            7 => RxFifo1MessageLost,
            8 => HighPriorityMessage,
            9 => TransmissionCompleted,
            10 => TransmissionCancellationFinished,
            11 => TxFifoEmpty,
            12 => TxEventFifoNewEntry,
            13 => TxEventFifoWatermarkReached,
            14 => TxEventFifoFull,
            15 => TxEventFifoElementLost,
            16 => TimestampWraparound,
            17 => MessageRamAccessFailure,
            18 => TimeoutOccured,
            19 => MessageStoredToDedicatedRxBuffer,
            22 => ErrorLoggingOverflow,
            23 => ErrorPassive,
            24 => WarningStatusChanged,
            25 => BusOff,
            26 => Watchdog,
            27 => CrcError,
            28 => BitError,
            29 => AcknowledgeError,
            30 => FormatError,
            31 => StuffError,
            20 | 21 | 32.. => Err(InvalidInterruptNumber)?,
        };
        Ok(ret)
    }
}

/// An iterator over the items of an [`InterruptSet`].
///
/// This `struct` is created by [`InterruptSet::iter`].
pub struct Iter {
    flags: InterruptSet,
    index: u8,
}

impl Iterator for Iter {
    type Item = Interrupt;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < 32 {
            let i = self.index;
            self.index += 1;
            if self.flags.0 & (1 << i) == 0 {
                continue;
            }
            // Reserved bits never make it into a set, skip them regardless.
            if let Ok(int) = Interrupt::try_from(i) {
                return Some(int);
            }
        }
        None
    }
}

//! Memory management for the RAM interface between core and peripheral.
//!
//! The message RAM is a flat array of 32-bit words shared with the
//! controller. [`MessageRamLayout::new`] partitions it into eight regions, in
//! this order: standard filters, extended filters, RX FIFO 0, RX FIFO 1,
//! dedicated RX buffers, TX event FIFO, dedicated TX buffers and the TX
//! FIFO/queue. The last two form a single hardware buffer area.

use core::fmt;
use vcell::VolatileCell;

/// Words in a standard filter element
pub const STANDARD_FILTER_WORDS: usize = 1;
/// Words in an extended filter element
pub const EXTENDED_FILTER_WORDS: usize = 2;
/// Words in a TX event FIFO element
pub const TX_EVENT_WORDS: usize = 2;
/// Header words in front of the data field of RX and TX elements
pub const HEADER_WORDS: usize = 2;

/// Hardware ceiling of the standard filter list
pub const MAX_STANDARD_FILTERS: usize = 128;
/// Hardware ceiling of the extended filter list
pub const MAX_EXTENDED_FILTERS: usize = 64;
/// Hardware ceiling of each RX FIFO and of the dedicated RX buffers
pub const MAX_RX_ELEMENTS: usize = 64;
/// Hardware ceiling of the TX event FIFO
pub const MAX_TX_EVENTS: usize = 32;
/// Hardware ceiling of dedicated TX buffers and TX FIFO/queue combined
pub const MAX_TX_BUFFERS: usize = 32;

/// Size of the data field of an RX or TX element
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DataSize {
    /// Classic CAN payload
    #[default]
    Bytes8,
    #[allow(missing_docs)]
    Bytes12,
    #[allow(missing_docs)]
    Bytes16,
    #[allow(missing_docs)]
    Bytes20,
    #[allow(missing_docs)]
    Bytes24,
    #[allow(missing_docs)]
    Bytes32,
    #[allow(missing_docs)]
    Bytes48,
    /// Largest CAN FD payload
    Bytes64,
}

impl DataSize {
    /// Selects the data size holding exactly `bytes` bytes
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        Some(match bytes {
            8 => Self::Bytes8,
            12 => Self::Bytes12,
            16 => Self::Bytes16,
            20 => Self::Bytes20,
            24 => Self::Bytes24,
            32 => Self::Bytes32,
            48 => Self::Bytes48,
            64 => Self::Bytes64,
            _ => return None,
        })
    }

    /// Number of payload bytes
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bytes8 => 8,
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
        }
    }

    /// Value of the element size fields in RXESC and TXESC
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Words occupied by one element, header included
    pub const fn element_words(self) -> usize {
        self.bytes() / 4 + HEADER_WORDS
    }
}

/// Element counts and sizes of every message RAM region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capacities {
    /// Standard ID filters, at most 128
    pub standard_filters: usize,
    /// Extended ID filters, at most 64
    pub extended_filters: usize,
    /// RX FIFO 0 depth, at most 64
    pub rx_fifo_0: usize,
    /// Data size of RX FIFO 0 elements
    pub rx_fifo_0_data: DataSize,
    /// RX FIFO 1 depth, at most 64
    pub rx_fifo_1: usize,
    /// Data size of RX FIFO 1 elements
    pub rx_fifo_1_data: DataSize,
    /// Dedicated RX buffers, at most 64
    pub dedicated_rx_buffers: usize,
    /// Data size of dedicated RX buffers
    pub rx_buffer_data: DataSize,
    /// TX event FIFO depth, at most 32
    pub tx_event_fifo: usize,
    /// Dedicated TX buffers
    pub dedicated_tx_buffers: usize,
    /// TX FIFO/queue depth. Together with `dedicated_tx_buffers` at most 32.
    pub tx_fifo_queue: usize,
    /// Data size of TX buffers, dedicated and queued alike
    pub tx_buffer_data: DataSize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            standard_filters: 8,
            extended_filters: 8,
            rx_fifo_0: 16,
            rx_fifo_0_data: DataSize::Bytes8,
            rx_fifo_1: 8,
            rx_fifo_1_data: DataSize::Bytes8,
            dedicated_rx_buffers: 0,
            rx_buffer_data: DataSize::Bytes8,
            tx_event_fifo: 0,
            dedicated_tx_buffers: 0,
            tx_fifo_queue: 8,
            tx_buffer_data: DataSize::Bytes8,
        }
    }
}

/// Message RAM regions, in layout order
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionKind {
    StandardFilters,
    ExtendedFilters,
    RxFifo0,
    RxFifo1,
    DedicatedRxBuffers,
    TxEventFifo,
    DedicatedTxBuffers,
    TxFifoQueue,
}

/// A contiguous run of equally sized elements
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Word offset from the start of the message RAM
    pub offset: usize,
    /// Number of elements
    pub elements: usize,
    /// Words per element
    pub element_words: usize,
}

impl Region {
    /// Words occupied by the region
    pub const fn words(&self) -> usize {
        self.elements * self.element_words
    }

    /// Word offset one past the end of the region
    pub const fn end(&self) -> usize {
        self.offset + self.words()
    }

    /// Word offset of element `index`
    pub const fn element(&self, index: usize) -> usize {
        self.offset + index * self.element_words
    }
}

/// A region exceeds its hardware ceiling
#[derive(Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// A single region holds more elements than the hardware can address
    TooManyElements {
        /// Offending region
        region: RegionKind,
        /// Configured element count
        requested: usize,
        /// Hardware ceiling
        max: usize,
    },
    /// Dedicated TX buffers and the TX FIFO/queue together exceed 32
    TooManyTxBuffers {
        /// Configured total
        requested: usize,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyElements {
                region,
                requested,
                max,
            } => write!(f, "{region:?}: {requested} elements, at most {max}"),
            Self::TooManyTxBuffers { requested } => write!(
                f,
                "{requested} TX buffers, at most {MAX_TX_BUFFERS} dedicated and queued combined"
            ),
        }
    }
}

/// Partition of the message RAM
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageRamLayout {
    /// Capacities the layout was computed from
    pub capacities: Capacities,
    #[allow(missing_docs)]
    pub standard_filters: Region,
    #[allow(missing_docs)]
    pub extended_filters: Region,
    #[allow(missing_docs)]
    pub rx_fifo_0: Region,
    #[allow(missing_docs)]
    pub rx_fifo_1: Region,
    #[allow(missing_docs)]
    pub dedicated_rx_buffers: Region,
    #[allow(missing_docs)]
    pub tx_event_fifo: Region,
    #[allow(missing_docs)]
    pub dedicated_tx_buffers: Region,
    #[allow(missing_docs)]
    pub tx_fifo_queue: Region,
}

impl MessageRamLayout {
    /// Computes the word offset of every region as a running sum.
    ///
    /// Fails if any region exceeds its hardware ceiling.
    pub fn new(capacities: &Capacities) -> Result<Self, LayoutError> {
        let c = capacities;
        check(RegionKind::StandardFilters, c.standard_filters, MAX_STANDARD_FILTERS)?;
        check(RegionKind::ExtendedFilters, c.extended_filters, MAX_EXTENDED_FILTERS)?;
        check(RegionKind::RxFifo0, c.rx_fifo_0, MAX_RX_ELEMENTS)?;
        check(RegionKind::RxFifo1, c.rx_fifo_1, MAX_RX_ELEMENTS)?;
        check(RegionKind::DedicatedRxBuffers, c.dedicated_rx_buffers, MAX_RX_ELEMENTS)?;
        check(RegionKind::TxEventFifo, c.tx_event_fifo, MAX_TX_EVENTS)?;
        let tx_buffers = c.dedicated_tx_buffers + c.tx_fifo_queue;
        if tx_buffers > MAX_TX_BUFFERS {
            return Err(LayoutError::TooManyTxBuffers {
                requested: tx_buffers,
            });
        }

        let mut next = 0;
        let mut region = |elements: usize, element_words: usize| {
            let region = Region {
                offset: next,
                elements,
                element_words,
            };
            next = region.end();
            region
        };

        Ok(Self {
            capacities: *c,
            standard_filters: region(c.standard_filters, STANDARD_FILTER_WORDS),
            extended_filters: region(c.extended_filters, EXTENDED_FILTER_WORDS),
            rx_fifo_0: region(c.rx_fifo_0, c.rx_fifo_0_data.element_words()),
            rx_fifo_1: region(c.rx_fifo_1, c.rx_fifo_1_data.element_words()),
            dedicated_rx_buffers: region(
                c.dedicated_rx_buffers,
                c.rx_buffer_data.element_words(),
            ),
            tx_event_fifo: region(c.tx_event_fifo, TX_EVENT_WORDS),
            dedicated_tx_buffers: region(
                c.dedicated_tx_buffers,
                c.tx_buffer_data.element_words(),
            ),
            tx_fifo_queue: region(c.tx_fifo_queue, c.tx_buffer_data.element_words()),
        })
    }

    /// All regions, in layout order
    pub fn regions(&self) -> [(RegionKind, Region); 8] {
        [
            (RegionKind::StandardFilters, self.standard_filters),
            (RegionKind::ExtendedFilters, self.extended_filters),
            (RegionKind::RxFifo0, self.rx_fifo_0),
            (RegionKind::RxFifo1, self.rx_fifo_1),
            (RegionKind::DedicatedRxBuffers, self.dedicated_rx_buffers),
            (RegionKind::TxEventFifo, self.tx_event_fifo),
            (RegionKind::DedicatedTxBuffers, self.dedicated_tx_buffers),
            (RegionKind::TxFifoQueue, self.tx_fifo_queue),
        ]
    }

    /// Words required by the whole layout
    pub fn total_words(&self) -> usize {
        self.tx_fifo_queue.end()
    }

    /// Word offset of TX buffer `index`, counted from the first dedicated
    /// buffer as the put index in TXFQS is.
    pub fn tx_buffer(&self, index: usize) -> usize {
        self.dedicated_tx_buffers.element(index)
    }

    /// Number of TX buffers, dedicated and queued
    pub fn tx_buffers(&self) -> usize {
        self.dedicated_tx_buffers.elements + self.tx_fifo_queue.elements
    }
}

fn check(region: RegionKind, requested: usize, max: usize) -> Result<(), LayoutError> {
    if requested > max {
        Err(LayoutError::TooManyElements {
            region,
            requested,
            max,
        })
    } else {
        Ok(())
    }
}

/// Backing storage for a message RAM of `WORDS` words.
///
/// All initialization is handled by the driver, so this type can be placed
/// in a `NOLOAD` link section inside the window the controller can address:
///
/// ```no_run
/// use samv7_mcan::messageram::MessageRam;
///
/// #[link_section = ".can"]
/// static mut MESSAGE_RAM: MessageRam<1024> = MessageRam::new();
/// ```
#[repr(C, align(32))]
pub struct MessageRam<const WORDS: usize>([VolatileCell<u32>; WORDS]);

impl<const WORDS: usize> MessageRam<WORDS> {
    /// Zeroed storage
    pub const fn new() -> Self {
        Self([const { VolatileCell::new(0) }; WORDS])
    }

    /// The storage as a word slice, as taken by [`Mcan::new`]
    ///
    /// [`Mcan::new`]: crate::bus::Mcan::new
    pub fn words(&mut self) -> &mut [VolatileCell<u32>] {
        &mut self.0
    }
}

impl<const WORDS: usize> Default for MessageRam<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// The driver's view of the message RAM.
pub(crate) struct Words<'a>(&'a [VolatileCell<u32>]);

// Safety: Regions are only written by one context at a time. TX regions and
// filters are written with the driver lock held; RX regions are only read
// from the interrupt handler.
unsafe impl Send for Words<'_> {}
unsafe impl Sync for Words<'_> {}

impl<'a> Words<'a> {
    pub(crate) fn new(words: &'a mut [VolatileCell<u32>]) -> Self {
        Self(words)
    }

    pub(crate) fn as_slice(&self) -> &'a [VolatileCell<u32>] {
        self.0
    }

    /// Element starting at word `offset`, `len` words long
    pub(crate) fn slice(&self, offset: usize, len: usize) -> &'a [VolatileCell<u32>] {
        &self.0[offset..offset + len]
    }

    /// Byte address of word `offset`
    pub(crate) fn address(&self, offset: usize) -> usize {
        self.0.as_ptr() as usize + offset * 4
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn zero(&self) {
        self.0.iter().for_each(|w| w.set(0));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn capacities() -> Capacities {
        Capacities {
            standard_filters: 3,
            extended_filters: 2,
            rx_fifo_0: 4,
            rx_fifo_0_data: DataSize::Bytes64,
            rx_fifo_1: 2,
            rx_fifo_1_data: DataSize::Bytes12,
            dedicated_rx_buffers: 1,
            rx_buffer_data: DataSize::Bytes8,
            tx_event_fifo: 3,
            dedicated_tx_buffers: 1,
            tx_fifo_queue: 5,
            tx_buffer_data: DataSize::Bytes32,
        }
    }

    #[test]
    fn size_codes_and_footprints() {
        assert_eq!(DataSize::Bytes8.code(), 0);
        assert_eq!(DataSize::Bytes64.code(), 7);
        assert_eq!(DataSize::Bytes8.element_words(), 4);
        assert_eq!(DataSize::Bytes12.element_words(), 5);
        assert_eq!(DataSize::Bytes48.element_words(), 14);
        assert_eq!(DataSize::Bytes64.element_words(), 18);
        for bytes in [8, 12, 16, 20, 24, 32, 48, 64] {
            assert_eq!(DataSize::from_bytes(bytes).map(DataSize::bytes), Some(bytes));
        }
        assert_eq!(DataSize::from_bytes(40), None);
    }

    #[test]
    fn running_sum_offsets() {
        let layout = MessageRamLayout::new(&capacities()).unwrap();
        assert_eq!(layout.standard_filters.offset, 0);
        assert_eq!(layout.extended_filters.offset, 3);
        assert_eq!(layout.rx_fifo_0.offset, 3 + 4);
        assert_eq!(layout.rx_fifo_1.offset, 7 + 4 * 18);
        assert_eq!(layout.dedicated_rx_buffers.offset, 79 + 2 * 5);
        assert_eq!(layout.tx_event_fifo.offset, 89 + 4);
        assert_eq!(layout.dedicated_tx_buffers.offset, 93 + 3 * 2);
        assert_eq!(layout.tx_fifo_queue.offset, 99 + 10);
        assert_eq!(layout.total_words(), 109 + 5 * 10);
        assert_eq!(layout.tx_buffer(3), 99 + 3 * 10);
        assert_eq!(layout.tx_buffers(), 6);
    }

    #[test]
    fn regions_are_contiguous_and_sum_to_total() {
        let mut caps = capacities();
        for fifo_0 in [0, 1, 17, 64] {
            for queue in [1, 8, 31] {
                caps.rx_fifo_0 = fifo_0;
                caps.tx_fifo_queue = queue;
                let layout = MessageRamLayout::new(&caps).unwrap();
                let regions = layout.regions();
                let mut expected_offset = 0;
                let mut sum = 0;
                for (_, region) in regions {
                    assert_eq!(region.offset, expected_offset);
                    expected_offset = region.end();
                    sum += region.words();
                }
                assert_eq!(sum, layout.total_words());
            }
        }
    }

    #[test]
    fn ceilings_are_enforced() {
        let mut caps = capacities();
        caps.standard_filters = 129;
        assert_eq!(
            MessageRamLayout::new(&caps),
            Err(LayoutError::TooManyElements {
                region: RegionKind::StandardFilters,
                requested: 129,
                max: 128
            })
        );

        let mut caps = capacities();
        caps.rx_fifo_1 = 65;
        assert!(matches!(
            MessageRamLayout::new(&caps),
            Err(LayoutError::TooManyElements {
                region: RegionKind::RxFifo1,
                ..
            })
        ));

        let mut caps = capacities();
        caps.dedicated_tx_buffers = 2;
        caps.tx_fifo_queue = 31;
        assert_eq!(
            MessageRamLayout::new(&caps),
            Err(LayoutError::TooManyTxBuffers { requested: 33 })
        );
    }

    #[test]
    fn maximum_layout_fits_the_address_window() {
        let caps = Capacities {
            standard_filters: 128,
            extended_filters: 64,
            rx_fifo_0: 64,
            rx_fifo_0_data: DataSize::Bytes64,
            rx_fifo_1: 64,
            rx_fifo_1_data: DataSize::Bytes64,
            dedicated_rx_buffers: 64,
            rx_buffer_data: DataSize::Bytes64,
            tx_event_fifo: 32,
            dedicated_tx_buffers: 0,
            tx_fifo_queue: 32,
            tx_buffer_data: DataSize::Bytes64,
        };
        let layout = MessageRamLayout::new(&caps).unwrap();
        assert_eq!(layout.total_words(), 128 + 128 + 3 * 64 * 18 + 64 + 32 * 18);
        assert!(layout.total_words() * 4 <= 1 << 16);
    }
}

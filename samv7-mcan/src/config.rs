//! CAN bus configuration

mod timing;

pub use timing::{BitTiming, BitTimingError};

use crate::messageram::Capacities;
use fugit::HertzU32;

/// Configuration for one controller instance.
///
/// Built with [`CanConfig::new`] and adjusted field by field before being
/// handed to [`Mcan::new`]. It is immutable afterwards.
///
/// [`Mcan::new`]: crate::bus::Mcan::new
#[derive(Copy, Clone, Debug)]
pub struct CanConfig {
    /// Protocol variant
    pub mode: Mode,
    /// Internal loopback with bus monitoring: transmitted frames are received
    /// back without driving the bus
    pub loopback: bool,
    /// Identifier kinds accepted by `send` and delivered on reception
    pub addressing: Addressing,
    /// How received frames are handed over
    pub rx_delivery: RxDelivery,
    /// Arbitration phase timing
    pub nominal_timing: BitTiming,
    /// Data phase timing of bit rate switched FD frames. Ignored in
    /// [`Mode::Iso11898`].
    pub data_timing: BitTiming,
    /// Message RAM partition
    pub capacities: Capacities,
    /// RX FIFO 0
    pub rx_fifo_0: RxFifoConfig,
    /// RX FIFO 1
    pub rx_fifo_1: RxFifoConfig,
    /// TX FIFO/queue submode
    pub tx_queue_mode: TxQueueMode,
    /// Number of polls of CCCR.INIT before initialization gives up
    pub init_timeout: u32,
}

impl CanConfig {
    /// Create an instance
    ///
    /// Nominal bitrate value must be provided, all other settings come
    /// pre-populated with default values.
    pub fn new(bitrate: HertzU32) -> Self {
        Self {
            mode: Default::default(),
            loopback: false,
            addressing: Default::default(),
            rx_delivery: Default::default(),
            nominal_timing: BitTiming::new(bitrate),
            data_timing: BitTiming::new(bitrate),
            capacities: Default::default(),
            rx_fifo_0: Default::default(),
            rx_fifo_1: Default::default(),
            tx_queue_mode: Default::default(),
            init_timeout: 100_000,
        }
    }
}

/// Protocol variant. The variants are mutually exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Classic CAN with up to 8 bytes of data
    #[default]
    Iso11898,
    /// CAN FD frames with up to 64 bytes, single bit rate
    Fd,
    /// CAN FD frames transmitted with the data phase at
    /// [`CanConfig::data_timing`]
    FdBitRateSwitching,
}

impl Mode {
    /// `true` if FD frames may be sent
    pub fn is_fd(self) -> bool {
        !matches!(self, Mode::Iso11898)
    }
}

/// Identifier policy of an instance
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Addressing {
    /// Only 11-bit identifiers are sent; received 29-bit frames are dropped
    #[default]
    Standard,
    /// Only 29-bit identifiers are sent; both kinds are delivered
    Extended,
}

/// Delivery of received frames
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RxDelivery {
    /// Frames are drained from RX FIFO 0 and 1
    #[default]
    Fifo,
    /// Frames are read from dedicated RX buffers. Not supported; rejected by
    /// [`Mcan::new`](crate::bus::Mcan::new).
    DedicatedBuffers,
}

/// RX FIFO settings
#[derive(Default, Copy, Clone, Debug)]
pub struct RxFifoConfig {
    /// Behaviour when the FIFO is full
    pub mode: RxFifoMode,
    /// Fill level raising the watermark interrupt, clamped to 64. 0 disables
    /// the interrupt.
    pub watermark: u8,
}

/// Full FIFO behaviour
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RxFifoMode {
    overwrite: bool,
}

impl RxFifoMode {
    /// Frames arriving at a full FIFO are discarded and the message lost
    /// interrupt is raised.
    pub fn blocking() -> Self {
        Self { overwrite: false }
    }

    /// Frames arriving at a full FIFO replace the oldest element.
    ///
    /// # Safety
    /// The controller may overwrite the element at the get index while the
    /// interrupt handler decodes it, so frames delivered from a full FIFO
    /// may be torn.
    pub unsafe fn overwrite() -> Self {
        Self { overwrite: true }
    }

    pub(crate) fn overwrites(self) -> bool {
        self.overwrite
    }
}

/// Transmission order of the TX FIFO/queue
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxQueueMode {
    /// Submission order
    Fifo,
    /// Lowest identifier first, as arbitration would order them
    #[default]
    Priority,
}

impl TxQueueMode {
    /// TXBC.TFQM
    pub(crate) fn is_queue(self) -> bool {
        matches!(self, TxQueueMode::Priority)
    }
}

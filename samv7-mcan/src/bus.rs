//! The driver instance and its configuration sequence

use crate::config::{BitTimingError, CanConfig, Mode, RxDelivery};
use crate::filter::{ExtFilter, Filter};
use crate::interrupt::InterruptSet;
use crate::message::TooMuchData;
use crate::messageram::{LayoutError, MessageRamLayout, Words};
use crate::reg::{
    cme, cmr, non_matching, Btp, Bus, Cccr, Ecr, Fbtp, Gfc, Ile, Psr, Reg, RxFifoConfig, Rxbc,
    Rxesc, Sidfc, Test, Txbc, Txefc, Txesc, Xidfc,
};
use crate::tx::TxTokens;
use crate::driver::Receiver;
use core::fmt::{self, Debug};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use log::{debug, warn};
use samv7_mcan_core::{AttachError, Dependencies, InterruptLine};
use vcell::VolatileCell;

/// Size of the window the controller can address, in bytes
const ADDRESS_WINDOW: usize = 1 << 16;

/// Printable PSR field
pub struct ProtocolStatus(pub Psr);

impl From<Psr> for ProtocolStatus {
    fn from(value: Psr) -> Self {
        Self(value)
    }
}

impl Debug for ProtocolStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        let psr = &self.0;

        f.debug_struct("ProtocolStatus")
            .field("redl", &psr.redl())
            .field("rbrs", &psr.rbrs())
            .field("resi", &psr.resi())
            .field("flec", &psr.flec())
            .field("bo", &psr.bo())
            .field("ew", &psr.ew())
            .field("ep", &psr.ep())
            .field("act", &psr.act())
            .field("lec", &psr.lec())
            .finish()
    }
}

/// Printable ECR field
pub struct ErrorCounters(pub Ecr);

impl From<Ecr> for ErrorCounters {
    fn from(value: Ecr) -> Self {
        Self(value)
    }
}

impl Debug for ErrorCounters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        let ecr = &self.0;

        f.debug_struct("ErrorCounters")
            .field("cel", &ecr.cel())
            .field("rec", &ecr.rec())
            .field("rp", &ecr.rp())
            .field("tec", &ecr.tec())
            .finish()
    }
}

/// Errors that may occur during construction. No register has been touched
/// when one of these is returned.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Problems with the bit timing configuration
    BitTiming(BitTimingError),
    /// A message RAM region exceeds its hardware ceiling
    Layout(LayoutError),
    /// The provided message RAM is smaller than the layout
    MessageRamTooSmall {
        /// Words needed by the layout
        required: usize,
        /// Words provided
        provided: usize,
    },
    /// The message RAM is not inside the 64 KiB window starting at
    /// [`Dependencies::eligible_message_ram_start`]
    MemoryNotAddressable,
    /// Frames are only sent through the TX FIFO/queue, which has no elements
    EmptyTxQueue,
    /// [`RxDelivery::DedicatedBuffers`] was requested
    UnsupportedRxDelivery,
}

impl From<BitTimingError> for ConfigurationError {
    fn from(value: BitTimingError) -> Self {
        Self::BitTiming(value)
    }
}

impl From<LayoutError> for ConfigurationError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

/// Errors reported by driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The controller did not acknowledge the initialization request
    InitTimeout,
    /// An interrupt line could not be attached
    Attach(AttachError),
    /// The identifier kind does not match the configured
    /// [`Addressing`](crate::config::Addressing)
    InvalidId,
    /// The payload does not fit in a TX buffer element
    TooMuchData,
    /// FD frame on an instance running classic CAN
    FdNotEnabled,
    /// Index is out of bounds
    OutOfBounds,
    /// The ioctl command is not supported
    NotSupported,
    /// Remote frame requests are not implemented
    NotImplemented,
    /// The controller reported the TX queue full although a slot was
    /// reserved
    QueueFull,
}

impl From<AttachError> for Error {
    fn from(value: AttachError) -> Self {
        Self::Attach(value)
    }
}

impl From<TooMuchData> for Error {
    fn from(_: TooMuchData) -> Self {
        Self::TooMuchData
    }
}

/// Runtime flags shared by callers and the interrupt handler
pub(crate) struct State {
    /// RX interrupts requested through `rxint`
    pub(crate) rx_enabled: AtomicBool,
    /// TX interrupts requested through `txint`
    pub(crate) tx_enabled: AtomicBool,
    /// Queue slots with a pending request, as TXBAR bits
    pub(crate) in_flight: AtomicU32,
}

/// One MCAN instance.
///
/// All hardware access goes through `B`, platform services through `D`, and
/// received frames are handed to `R`. The message RAM is borrowed for `'a`.
///
/// Methods take `&self`: callers are serialized by an internal lock, the
/// interrupt handler ([`Mcan::on_interrupt`]) never takes it.
pub struct Mcan<'a, B, D, R> {
    pub(crate) bus: B,
    pub(crate) dependencies: D,
    pub(crate) receiver: R,
    pub(crate) config: CanConfig,
    pub(crate) layout: MessageRamLayout,
    pub(crate) ram: Words<'a>,
    btp: Btp,
    fbtp: Fbtp,
    pub(crate) rx_interrupts: InterruptSet,
    pub(crate) tx_interrupts: InterruptSet,
    pub(crate) lock: Mutex<CriticalSectionRawMutex, ()>,
    pub(crate) tokens: TxTokens,
    pub(crate) state: State,
}

impl<'a, B: Bus, D: Dependencies, R: Receiver> Mcan<'a, B, D, R> {
    /// Validates `config` against the hardware limits and the provided
    /// message RAM.
    ///
    /// The hardware only holds the lower 16 bits of message RAM addresses, so
    /// `memory` must lie in the 64 KiB window starting at
    /// [`Dependencies::eligible_message_ram_start`].
    ///
    /// The returned instance has not touched the hardware yet; call
    /// [`Self::setup`] to program it.
    pub fn new(
        bus: B,
        dependencies: D,
        receiver: R,
        config: CanConfig,
        memory: &'a mut [VolatileCell<u32>],
    ) -> Result<Self, ConfigurationError> {
        let layout = MessageRamLayout::new(&config.capacities)?;
        if config.capacities.tx_fifo_queue == 0 {
            return Err(ConfigurationError::EmptyTxQueue);
        }
        if config.rx_delivery != RxDelivery::Fifo {
            return Err(ConfigurationError::UnsupportedRxDelivery);
        }
        if memory.len() < layout.total_words() {
            return Err(ConfigurationError::MessageRamTooSmall {
                required: layout.total_words(),
                provided: memory.len(),
            });
        }
        let eligible = dependencies.eligible_message_ram_start() as usize;
        let start = memory.as_ptr() as usize;
        let end = start + layout.total_words() * 4;
        if start < eligible || end - eligible > ADDRESS_WINDOW {
            return Err(ConfigurationError::MemoryNotAddressable);
        }

        let can_clock = dependencies.can_clock();
        let btp = config.nominal_timing.nominal(can_clock)?;
        let fbtp = match config.mode {
            Mode::Iso11898 => Fbtp::RESET,
            Mode::Fd | Mode::FdBitRateSwitching => config.data_timing.data(can_clock)?,
        };

        Ok(Self {
            bus,
            dependencies,
            receiver,
            config,
            layout,
            ram: Words::new(memory),
            btp,
            fbtp,
            rx_interrupts: InterruptSet::RX_FIFO,
            tx_interrupts: InterruptSet::TX_FIFO_QUEUE,
            lock: Mutex::new(()),
            tokens: TxTokens::new(config.capacities.tx_fifo_queue),
            state: State {
                rx_enabled: AtomicBool::new(false),
                tx_enabled: AtomicBool::new(false),
                in_flight: AtomicU32::new(0),
            },
        })
    }

    /// Configuration the instance was built with
    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Message RAM partition
    pub fn layout(&self) -> &MessageRamLayout {
        &self.layout
    }

    /// Raw access to the message RAM.
    ///
    /// # Safety
    /// The driver assumes exclusive ownership of the message RAM. Writes can
    /// corrupt frames in flight.
    pub unsafe fn message_ram(&self) -> &'a [VolatileCell<u32>] {
        self.ram.as_slice()
    }

    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &B {
        &self.bus
    }

    /// Disables all interrupts at the controller and puts it into
    /// initialization mode, where it neither sends nor receives.
    pub fn reset(&self) {
        let _guard = block_on(self.lock.lock());
        self.reset_locked();
    }

    fn reset_locked(&self) {
        debug!("reset");
        self.bus.write(Reg::Ie, 0);
        self.bus.write(Reg::Txbtie, 0);
        self.state.rx_enabled.store(false, Ordering::Relaxed);
        self.state.tx_enabled.store(false, Ordering::Relaxed);
        if self.request_init().is_err() {
            warn!("reset: initialization not acknowledged");
        }
    }

    /// Programs the controller, attaches both interrupt lines and unmasks
    /// them at the system interrupt controller. Controller interrupts stay
    /// disabled until [`Self::rxint`] / [`Self::txint`].
    ///
    /// If a line cannot be attached the controller is left in initialization
    /// mode.
    pub fn setup(&self) -> Result<(), Error> {
        let _guard = block_on(self.lock.lock());
        debug!("setup");

        self.initialize_hardware()?;
        self.dump_registers("after hardware initialization");

        if let Err(e) = self.attach_lines() {
            if self.request_init().is_err() {
                warn!("setup: initialization not acknowledged");
            }
            return Err(e.into());
        }

        self.dump_registers("after receive setup");

        self.tokens.refill();
        self.state.in_flight.store(0, Ordering::Relaxed);
        self.dependencies.enable_interrupt(InterruptLine::Line0);
        self.dependencies.enable_interrupt(InterruptLine::Line1);
        Ok(())
    }

    /// Attaches both lines, or neither
    fn attach_lines(&self) -> Result<(), AttachError> {
        self.dependencies.attach_interrupt(InterruptLine::Line0)?;
        if let Err(e) = self.dependencies.attach_interrupt(InterruptLine::Line1) {
            self.dependencies.detach_interrupt(InterruptLine::Line0);
            return Err(e);
        }
        Ok(())
    }

    /// Reverses [`Self::setup`] and resets the controller.
    pub fn shutdown(&self) {
        let _guard = block_on(self.lock.lock());
        debug!("shutdown");
        self.dependencies.disable_interrupt(InterruptLine::Line0);
        self.dependencies.disable_interrupt(InterruptLine::Line1);
        self.dependencies.detach_interrupt(InterruptLine::Line0);
        self.dependencies.detach_interrupt(InterruptLine::Line1);
        self.reset_locked();
    }

    /// Enables or disables the RX interrupt group. Enabling also enables the
    /// common error interrupts.
    pub fn rxint(&self, enable: bool) {
        let _guard = block_on(self.lock.lock());
        debug!("rxint: {}", enable);
        critical_section::with(|_| {
            self.state.rx_enabled.store(enable, Ordering::Relaxed);
            if enable {
                self.enable_interrupts(self.rx_interrupts | InterruptSet::COMMON_ERRORS);
            } else {
                self.disable_interrupts(self.rx_interrupts);
            }
        });
    }

    /// Enables or disables the TX interrupt group. Enabling also enables the
    /// common error interrupts.
    pub fn txint(&self, enable: bool) {
        let _guard = block_on(self.lock.lock());
        debug!("txint: {}", enable);
        critical_section::with(|_| {
            self.state.tx_enabled.store(enable, Ordering::Relaxed);
            if enable {
                self.enable_interrupts(self.tx_interrupts | InterruptSet::COMMON_ERRORS);
            } else {
                self.disable_interrupts(self.tx_interrupts);
            }
        });
    }

    /// Installs `filter` at `index` of the standard filter list.
    pub fn set_standard_filter(&self, index: usize, filter: Filter) -> Result<(), Error> {
        let region = self.layout.standard_filters;
        if index >= region.elements {
            return Err(Error::OutOfBounds);
        }
        let _guard = block_on(self.lock.lock());
        let offset = region.element(index);
        self.ram.slice(offset, 1)[0].set(filter.encode());
        self.clean(offset, 1);
        Ok(())
    }

    /// Installs `filter` at `index` of the extended filter list.
    pub fn set_extended_filter(&self, index: usize, filter: ExtFilter) -> Result<(), Error> {
        let region = self.layout.extended_filters;
        if index >= region.elements {
            return Err(Error::OutOfBounds);
        }
        let _guard = block_on(self.lock.lock());
        let offset = region.element(index);
        let words = self.ram.slice(offset, region.element_words);
        let [f0, f1] = filter.encode();
        words[0].set(f0);
        words[1].set(f1);
        self.clean(offset, region.element_words);
        Ok(())
    }

    /// Read error counters
    pub fn error_counters(&self) -> ErrorCounters {
        Ecr::from_bits(self.bus.read(Reg::Ecr)).into()
    }

    /// Read additional status information
    pub fn protocol_status(&self) -> ProtocolStatus {
        Psr::from_bits(self.bus.read(Reg::Psr)).into()
    }

    /// Logs every register at `debug` level
    pub fn dump_registers(&self, msg: &str) {
        debug!("registers {}:", msg);
        for reg in Reg::ALL {
            debug!("  {:<6} {:#010x}", reg.name(), self.bus.read(reg));
        }
    }

    /// Sets INIT and waits for the controller to acknowledge it
    fn request_init(&self) -> Result<(), Error> {
        self.modify_cccr(|c| c.set_init(true));
        for _ in 0..self.config.init_timeout {
            if Cccr::from_bits(self.bus.read(Reg::Cccr)).init() {
                return Ok(());
            }
        }
        Err(Error::InitTimeout)
    }

    fn modify_cccr(&self, f: impl FnOnce(&mut Cccr)) {
        self.bus.modify(Reg::Cccr, |bits| {
            let mut cccr = Cccr::from_bits(bits);
            f(&mut cccr);
            cccr.bits()
        });
    }

    /// Runs the configuration sequence, leaving the controller in normal
    /// operation with all interrupts disabled and all filters disabled.
    pub(crate) fn initialize_hardware(&self) -> Result<(), Error> {
        let config = &self.config;
        let layout = &self.layout;
        let caps = &config.capacities;

        self.request_init()?;
        self.modify_cccr(|c| {
            c.set_init(true);
            c.set_cce(true);
        });

        let mut gfc = Gfc::default();
        gfc.set_rrfe(true);
        gfc.set_rrfs(true);
        gfc.set_anfe(non_matching::REJECT);
        gfc.set_anfs(non_matching::REJECT);
        self.bus.write(Reg::Gfc, gfc.bits());
        self.bus.write(Reg::Xidam, 0x1fff_ffff);

        self.bus.write(Reg::Ie, 0);
        self.bus.write(Reg::Txbtie, 0);
        self.bus.write(Reg::Ils, 0);
        self.bus.write(Reg::Ile, 0);
        self.bus.write(Reg::Ir, InterruptSet::ALL.bits());

        self.bus.write(Reg::Btp, self.btp.bits());
        self.bus.write(Reg::Fbtp, self.fbtp.bits());

        let address = |offset| self.ram.address(offset);

        let mut sidfc = Sidfc::default();
        sidfc.set_start_address(address(layout.standard_filters.offset));
        sidfc.set_lss(caps.standard_filters as u8);
        self.bus.write(Reg::Sidfc, sidfc.bits());

        let mut xidfc = Xidfc::default();
        xidfc.set_start_address(address(layout.extended_filters.offset));
        xidfc.set_lse(caps.extended_filters as u8);
        self.bus.write(Reg::Xidfc, xidfc.bits());

        for (reg, region, fifo) in [
            (Reg::Rxf0c, layout.rx_fifo_0, config.rx_fifo_0),
            (Reg::Rxf1c, layout.rx_fifo_1, config.rx_fifo_1),
        ] {
            let mut c = RxFifoConfig::default();
            c.set_start_address(address(region.offset));
            c.set_fs(region.elements as u8);
            c.set_fwm(fifo.watermark.min(64));
            c.set_fom(fifo.mode.overwrites());
            self.bus.write(reg, c.bits());
        }

        let mut rxbc = Rxbc::default();
        rxbc.set_start_address(address(layout.dedicated_rx_buffers.offset));
        self.bus.write(Reg::Rxbc, rxbc.bits());

        let mut txefc = Txefc::default();
        txefc.set_start_address(address(layout.tx_event_fifo.offset));
        txefc.set_efs(caps.tx_event_fifo as u8);
        self.bus.write(Reg::Txefc, txefc.bits());

        let mut txbc = Txbc::default();
        txbc.set_start_address(address(layout.dedicated_tx_buffers.offset));
        txbc.set_ndtb(caps.dedicated_tx_buffers as u8);
        txbc.set_tfqs(caps.tx_fifo_queue as u8);
        self.bus.write(Reg::Txbc, txbc.bits());

        let mut rxesc = Rxesc::default();
        rxesc.set_f0ds(caps.rx_fifo_0_data.code());
        rxesc.set_f1ds(caps.rx_fifo_1_data.code());
        rxesc.set_rbds(caps.rx_buffer_data.code());
        self.bus.write(Reg::Rxesc, rxesc.bits());

        let mut txesc = Txesc::default();
        txesc.set_tbds(caps.tx_buffer_data.code());
        self.bus.write(Reg::Txesc, txesc.bits());

        self.disable_all_filters();

        self.bus.write(Reg::Ndat1, u32::MAX);
        self.bus.write(Reg::Ndat2, u32::MAX);

        let (mode, request) = match config.mode {
            Mode::Iso11898 => (cme::ISO11898_1, cmr::ISO11898_1),
            Mode::Fd => (cme::FD, cmr::FD),
            Mode::FdBitRateSwitching => (cme::FD_BIT_RATE_SWITCHING, cmr::FD_BIT_RATE_SWITCHING),
        };
        self.modify_cccr(|c| {
            c.set_cme(mode);
            c.set_cmr(cmr::NO_CHANGE);
        });
        self.modify_cccr(|c| c.set_cmr(request));

        self.bus.modify(Reg::Txbc, |bits| {
            let mut txbc = Txbc::from_bits(bits);
            txbc.set_tfqm(config.tx_queue_mode.is_queue());
            txbc.bits()
        });

        if config.loopback {
            self.modify_cccr(|c| {
                c.set_test(true);
                c.set_mon(true);
            });
            self.bus.modify(Reg::Test, |bits| {
                let mut test = Test::from_bits(bits);
                test.set_lbck(true);
                test.bits()
            });
        }

        let mut ile = Ile::default();
        ile.set_eint0(true);
        self.bus.write(Reg::Ils, 0);
        self.bus.write(Reg::Ile, ile.bits());
        self.bus.write(Reg::Ir, InterruptSet::ALL.bits());

        self.modify_cccr(|c| c.set_init(false));
        Ok(())
    }

    /// Zeroes the message RAM, which also disables every filter element
    fn disable_all_filters(&self) {
        self.ram.zero();
        self.clean(0, self.ram.len());
    }

    /// Makes CPU writes to `words` words at `offset` visible to the
    /// controller
    pub(crate) fn clean(&self, offset: usize, words: usize) {
        let start = self.ram.address(offset);
        self.dependencies.clean_dcache(start, start + words * 4);
    }

    /// Makes controller writes to `words` words at `offset` visible to the
    /// CPU
    pub(crate) fn invalidate(&self, offset: usize, words: usize) {
        let start = self.ram.address(offset);
        self.dependencies.invalidate_dcache(start, start + words * 4);
    }

    /// IE |= `interrupts`. Callers outside the interrupt handler hold a
    /// critical section.
    pub(crate) fn enable_interrupts(&self, interrupts: InterruptSet) {
        self.bus.modify(Reg::Ie, |ie| ie | interrupts.bits());
    }

    /// IE &= !`interrupts`
    pub(crate) fn disable_interrupts(&self, interrupts: InterruptSet) {
        self.bus.modify(Reg::Ie, |ie| ie & !interrupts.bits());
    }
}

#![no_std]
#![warn(missing_docs)]

//! `samv7-mcan-core` is the thin integration layer between the platform
//! independent [`samv7-mcan`] driver and board support code.
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by the board or
//! chip support crate, which is responsible for clocks, pin multiplexing, the
//! message RAM base address in the bus matrix and the interrupt controller.
//!
//! [`samv7-mcan`]: <https://docs.rs/crate/samv7-mcan/>

pub use fugit;

/// Trait representing CAN peripheral identity
///
/// Types implementing this trait are marker types identifying a specific
/// MCAN instance on the chip (SAMV7 has two). It only conveys *where* the
/// register block is located, not that it can be accessed. The latter is
/// expressed by the [`Dependencies`] trait.
///
/// # Safety
/// `CanId::ADDRESS` points to the start of a valid MCAN register block.
///
/// # Examples
/// ```no_run
/// use samv7_mcan_core::CanId;
///
/// pub enum Mcan0 {}
///
/// unsafe impl CanId for Mcan0 {
///     const ADDRESS: *const () = 0x4003_0000 as *const _;
/// }
///
/// pub enum Mcan1 {}
///
/// unsafe impl CanId for Mcan1 {
///     const ADDRESS: *const () = 0x4003_4000 as *const _;
/// }
/// ```
pub unsafe trait CanId {
    /// Static address of the register block of the corresponding peripheral
    const ADDRESS: *const ();
}

/// One of the two interrupt lines an MCAN instance drives into the system
/// interrupt controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptLine {
    /// MCANx_INT0
    Line0,
    /// MCANx_INT1
    Line1,
}

/// The platform refused to attach a handler to an interrupt line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttachError {
    /// Line that could not be attached
    pub line: InterruptLine,
}

/// Trait representing CAN peripheral dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose everything the peripheral needs to run (clocks, pins) and be
///   constructible only once those are configured
/// - be a singleton per peripheral instance
/// - own the routing of the instance's interrupt lines
///
/// # Safety
/// While the [`Dependencies`] instance exists
/// - CAN related clocks must not change
/// - CAN related pin modes must not change
/// - the register block must not be accessed by other parts of the program
/// - the upper 16 bits of the message RAM address (CANxDMABA in the bus
///   matrix) must match [`Dependencies::eligible_message_ram_start`]
pub unsafe trait Dependencies {
    /// Frequency of the host / main / CPU clock.
    fn host_clock(&self) -> fugit::HertzU32;

    /// Frequency of the CAN core clock (PCK5 on SAMV7) from which bit timing
    /// is derived.
    fn can_clock(&self) -> fugit::HertzU32;

    /// Start of the 64 KiB window the controller can address.
    ///
    /// The controller only holds the lower 16 bits of every message RAM
    /// address; the upper bits come from the bus matrix configuration.
    fn eligible_message_ram_start(&self) -> *const ();

    /// Route `line` to the driver's interrupt entry point.
    fn attach_interrupt(&self, line: InterruptLine) -> Result<(), AttachError>;

    /// Undo [`Self::attach_interrupt`].
    fn detach_interrupt(&self, line: InterruptLine);

    /// Unmask `line` in the system interrupt controller.
    fn enable_interrupt(&self, line: InterruptLine);

    /// Mask `line` in the system interrupt controller.
    fn disable_interrupt(&self, line: InterruptLine);

    /// Write back the data cache lines covering `start..end` so the
    /// controller observes what the CPU wrote.
    ///
    /// The default is a memory fence, sufficient when the message RAM is not
    /// cacheable.
    fn clean_dcache(&self, start: usize, end: usize) {
        let _ = (start, end);
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Discard the data cache lines covering `start..end` so the CPU reads
    /// what the controller wrote.
    fn invalidate_dcache(&self, start: usize, end: usize) {
        let _ = (start, end);
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }
}

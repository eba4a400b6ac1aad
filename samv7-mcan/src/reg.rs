//! Register access layer
//!
//! All hardware interaction of the driver passes through a [`Bus`]: a pair of
//! 32-bit read/write operations addressed by [`Reg`]. [`Mmio`] is the real
//! implementation on top of the register block at [`CanId::ADDRESS`];
//! [`trace::Traced`] wraps any bus with diagnostic logging.

mod fields;
pub mod trace;

pub use fields::*;

use core::marker::PhantomData;
use samv7_mcan_core::CanId;
use vcell::VolatileCell;

/// Registers of the MCAN (revision A) register block
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Reg {
    Cust = 0x08,
    Fbtp = 0x0c,
    Test = 0x10,
    Rwd = 0x14,
    Cccr = 0x18,
    Btp = 0x1c,
    Tscc = 0x20,
    Tscv = 0x24,
    Tocc = 0x28,
    Tocv = 0x2c,
    Ecr = 0x40,
    Psr = 0x44,
    Ir = 0x50,
    Ie = 0x54,
    Ils = 0x58,
    Ile = 0x5c,
    Gfc = 0x80,
    Sidfc = 0x84,
    Xidfc = 0x88,
    Xidam = 0x90,
    Hpms = 0x94,
    Ndat1 = 0x98,
    Ndat2 = 0x9c,
    Rxf0c = 0xa0,
    Rxf0s = 0xa4,
    Rxf0a = 0xa8,
    Rxbc = 0xac,
    Rxf1c = 0xb0,
    Rxf1s = 0xb4,
    Rxf1a = 0xb8,
    Rxesc = 0xbc,
    Txbc = 0xc0,
    Txfqs = 0xc4,
    Txesc = 0xc8,
    Txbrp = 0xcc,
    Txbar = 0xd0,
    Txbcr = 0xd4,
    Txbto = 0xd8,
    Txbcf = 0xdc,
    Txbtie = 0xe0,
    Txbcie = 0xe4,
    Txefc = 0xf0,
    Txefs = 0xf4,
    Txefa = 0xf8,
}

impl Reg {
    /// Every register, in address order
    pub const ALL: [Reg; 44] = [
        Reg::Cust,
        Reg::Fbtp,
        Reg::Test,
        Reg::Rwd,
        Reg::Cccr,
        Reg::Btp,
        Reg::Tscc,
        Reg::Tscv,
        Reg::Tocc,
        Reg::Tocv,
        Reg::Ecr,
        Reg::Psr,
        Reg::Ir,
        Reg::Ie,
        Reg::Ils,
        Reg::Ile,
        Reg::Gfc,
        Reg::Sidfc,
        Reg::Xidfc,
        Reg::Xidam,
        Reg::Hpms,
        Reg::Ndat1,
        Reg::Ndat2,
        Reg::Rxf0c,
        Reg::Rxf0s,
        Reg::Rxf0a,
        Reg::Rxbc,
        Reg::Rxf1c,
        Reg::Rxf1s,
        Reg::Rxf1a,
        Reg::Rxesc,
        Reg::Txbc,
        Reg::Txfqs,
        Reg::Txesc,
        Reg::Txbrp,
        Reg::Txbar,
        Reg::Txbcr,
        Reg::Txbto,
        Reg::Txbcf,
        Reg::Txbtie,
        Reg::Txbcie,
        Reg::Txefc,
        Reg::Txefs,
        Reg::Txefa,
    ];

    /// Byte offset from the start of the register block
    pub const fn offset(self) -> usize {
        self as u16 as usize
    }

    /// Datasheet name of the register
    pub const fn name(self) -> &'static str {
        match self {
            Reg::Cust => "CUST",
            Reg::Fbtp => "FBTP",
            Reg::Test => "TEST",
            Reg::Rwd => "RWD",
            Reg::Cccr => "CCCR",
            Reg::Btp => "BTP",
            Reg::Tscc => "TSCC",
            Reg::Tscv => "TSCV",
            Reg::Tocc => "TOCC",
            Reg::Tocv => "TOCV",
            Reg::Ecr => "ECR",
            Reg::Psr => "PSR",
            Reg::Ir => "IR",
            Reg::Ie => "IE",
            Reg::Ils => "ILS",
            Reg::Ile => "ILE",
            Reg::Gfc => "GFC",
            Reg::Sidfc => "SIDFC",
            Reg::Xidfc => "XIDFC",
            Reg::Xidam => "XIDAM",
            Reg::Hpms => "HPMS",
            Reg::Ndat1 => "NDAT1",
            Reg::Ndat2 => "NDAT2",
            Reg::Rxf0c => "RXF0C",
            Reg::Rxf0s => "RXF0S",
            Reg::Rxf0a => "RXF0A",
            Reg::Rxbc => "RXBC",
            Reg::Rxf1c => "RXF1C",
            Reg::Rxf1s => "RXF1S",
            Reg::Rxf1a => "RXF1A",
            Reg::Rxesc => "RXESC",
            Reg::Txbc => "TXBC",
            Reg::Txfqs => "TXFQS",
            Reg::Txesc => "TXESC",
            Reg::Txbrp => "TXBRP",
            Reg::Txbar => "TXBAR",
            Reg::Txbcr => "TXBCR",
            Reg::Txbto => "TXBTO",
            Reg::Txbcf => "TXBCF",
            Reg::Txbtie => "TXBTIE",
            Reg::Txbcie => "TXBCIE",
            Reg::Txefc => "TXEFC",
            Reg::Txefs => "TXEFS",
            Reg::Txefa => "TXEFA",
        }
    }
}

/// Word-wide access to the controller's registers.
///
/// Implementations must not reorder accesses.
pub trait Bus {
    /// Read the current value of `reg`
    fn read(&self, reg: Reg) -> u32;

    /// Write `value` to `reg`
    fn write(&self, reg: Reg, value: u32);

    /// Read-modify-write. Not atomic with respect to the interrupt handler;
    /// callers that race with it wrap this in a critical section.
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: Reg, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

/// Memory mapped register block of the peripheral identified by `Id`
pub struct Mmio<Id> {
    _id: PhantomData<fn() -> Id>,
}

impl<Id: CanId> Mmio<Id> {
    /// # Safety
    /// The caller must own the peripheral referenced by `Id`: no other code
    /// may access its register block while the returned value is in use.
    pub unsafe fn new() -> Self {
        Self { _id: PhantomData }
    }

    fn cell(&self, reg: Reg) -> &VolatileCell<u32> {
        // Safety: `Id::ADDRESS` points to a valid register block and every
        // `Reg` is a word aligned offset inside it.
        unsafe {
            &*Id::ADDRESS
                .cast::<u8>()
                .add(reg.offset())
                .cast::<VolatileCell<u32>>()
        }
    }
}

impl<Id: CanId> Bus for Mmio<Id> {
    fn read(&self, reg: Reg) -> u32 {
        self.cell(reg).get()
    }

    fn write(&self, reg: Reg, value: u32) {
        self.cell(reg).set(value)
    }
}

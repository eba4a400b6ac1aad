//! Field layouts of the registers the driver programs or decodes.
//!
//! Address fields of the message RAM configuration registers hold bits 15:2
//! of the byte address; use the `*_address` helpers rather than the raw
//! setters.
#![allow(missing_docs)]

use bitfield::bitfield;

bitfield! {
    /// CC Control Register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Cccr(u32);
    impl Debug;
    /// Initialization
    pub init, set_init: 0;
    /// Configuration Change Enable
    pub cce, set_cce: 1;
    /// Restricted Operation Mode
    pub asm, set_asm: 2;
    /// Clock Stop Acknowledge
    pub csa, _: 3;
    /// Clock Stop Request
    pub csr, set_csr: 4;
    /// Bus Monitoring Mode
    pub mon, set_mon: 5;
    /// Disable Automatic Retransmission
    pub dar, set_dar: 6;
    /// Test Mode Enable
    pub test, set_test: 7;
    /// CAN Mode Enable
    pub u8, cme, set_cme: 9, 8;
    /// CAN Mode Request
    pub u8, cmr, set_cmr: 11, 10;
    /// CAN FD Operation
    pub fdo, _: 12;
    /// CAN FD Bit Rate Switching
    pub fdbs, _: 13;
    /// Transmit Pause
    pub txp, set_txp: 14;
}

/// Values of [`Cccr::cme`]
pub mod cme {
    pub const ISO11898_1: u8 = 0;
    pub const FD: u8 = 1;
    pub const FD_BIT_RATE_SWITCHING: u8 = 2;
}

/// Values of [`Cccr::cmr`]
pub mod cmr {
    pub const NO_CHANGE: u8 = 0;
    pub const FD: u8 = 1;
    pub const FD_BIT_RATE_SWITCHING: u8 = 2;
    pub const ISO11898_1: u8 = 3;
}

bitfield! {
    /// Bit Timing and Prescaler Register (arbitration phase)
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Btp(u32);
    impl Debug;
    pub u8, sjw, set_sjw: 3, 0;
    pub u8, tseg2, set_tseg2: 7, 4;
    pub u8, tseg1, set_tseg1: 13, 8;
    pub u16, brp, set_brp: 25, 16;
}

bitfield! {
    /// Fast Bit Timing and Prescaler Register (data phase)
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Fbtp(u32);
    impl Debug;
    pub u8, fsjw, set_fsjw: 1, 0;
    pub u8, ftseg2, set_ftseg2: 6, 4;
    pub u8, ftseg1, set_ftseg1: 11, 8;
    pub u8, fbrp, set_fbrp: 20, 16;
    /// Transceiver Delay Compensation
    pub tdc, set_tdc: 23;
}

impl Fbtp {
    /// Value after reset
    pub const RESET: Fbtp = Fbtp(0x0000_0a33);
}

bitfield! {
    /// Test Register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Test(u32);
    impl Debug;
    /// Loop Back Mode
    pub lbck, set_lbck: 4;
    pub u8, tx, set_tx: 6, 5;
    pub rx, _: 7;
}

bitfield! {
    /// Error Counter Register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Ecr(u32);
    impl Debug;
    pub u8, tec, _: 7, 0;
    pub u8, rec, _: 14, 8;
    pub rp, _: 15;
    pub u8, cel, _: 23, 16;
}

bitfield! {
    /// Protocol Status Register
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Psr(u32);
    impl Debug;
    pub u8, lec, _: 2, 0;
    pub u8, act, _: 4, 3;
    pub ep, _: 5;
    pub ew, _: 6;
    pub bo, _: 7;
    pub u8, flec, _: 10, 8;
    pub resi, _: 11;
    pub rbrs, _: 12;
    pub redl, _: 13;
}

bitfield! {
    /// Interrupt Line Enable
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Ile(u32);
    impl Debug;
    pub eint0, set_eint0: 0;
    pub eint1, set_eint1: 1;
}

bitfield! {
    /// Global Filter Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Gfc(u32);
    impl Debug;
    /// Reject Remote Frames Extended
    pub rrfe, set_rrfe: 0;
    /// Reject Remote Frames Standard
    pub rrfs, set_rrfs: 1;
    /// Accept Non-matching Frames Extended
    pub u8, anfe, set_anfe: 3, 2;
    /// Accept Non-matching Frames Standard
    pub u8, anfs, set_anfs: 5, 4;
}

/// Values of [`Gfc::anfs`] and [`Gfc::anfe`]
pub mod non_matching {
    pub const RX_FIFO_0: u8 = 0;
    pub const RX_FIFO_1: u8 = 1;
    pub const REJECT: u8 = 2;
}

bitfield! {
    /// Standard ID Filter Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Sidfc(u32);
    impl Debug;
    pub u16, flssa, set_flssa: 15, 2;
    pub u8, lss, set_lss: 23, 16;
}

bitfield! {
    /// Extended ID Filter Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Xidfc(u32);
    impl Debug;
    pub u16, flesa, set_flesa: 15, 2;
    pub u8, lse, set_lse: 22, 16;
}

bitfield! {
    /// Receive FIFO 0/1 Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct RxFifoConfig(u32);
    impl Debug;
    pub u16, fsa, set_fsa: 15, 2;
    /// FIFO size
    pub u8, fs, set_fs: 22, 16;
    /// Watermark
    pub u8, fwm, set_fwm: 30, 24;
    /// Overwrite mode
    pub fom, set_fom: 31;
}

bitfield! {
    /// Receive FIFO 0/1 Status
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct RxFifoStatus(u32);
    impl Debug;
    /// Fill level
    pub u8, ffl, _: 6, 0;
    /// Get index
    pub u8, fgi, _: 13, 8;
    /// Put index
    pub u8, fpi, _: 21, 16;
    /// Full
    pub ff, _: 24;
    /// Message lost
    pub rfl, _: 25;
}

bitfield! {
    /// Receive Buffer Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Rxbc(u32);
    impl Debug;
    pub u16, rbsa, set_rbsa: 15, 2;
}

bitfield! {
    /// Receive Buffer / FIFO Element Size Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Rxesc(u32);
    impl Debug;
    pub u8, f0ds, set_f0ds: 2, 0;
    pub u8, f1ds, set_f1ds: 6, 4;
    pub u8, rbds, set_rbds: 10, 8;
}

bitfield! {
    /// Transmit Buffer Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Txbc(u32);
    impl Debug;
    pub u16, tbsa, set_tbsa: 15, 2;
    /// Number of dedicated transmit buffers
    pub u8, ndtb, set_ndtb: 21, 16;
    /// Transmit FIFO/queue size
    pub u8, tfqs, set_tfqs: 29, 24;
    /// Queue mode (priority) instead of FIFO
    pub tfqm, set_tfqm: 30;
}

bitfield! {
    /// Transmit FIFO/Queue Status
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Txfqs(u32);
    impl Debug;
    /// Free level
    pub u8, tffl, _: 5, 0;
    /// Get index
    pub u8, tfgi, _: 12, 8;
    /// Put index
    pub u8, tfqpi, _: 20, 16;
    /// FIFO/queue full
    pub tfqf, _: 21;
}

bitfield! {
    /// Transmit Buffer Element Size Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Txesc(u32);
    impl Debug;
    pub u8, tbds, set_tbds: 2, 0;
}

bitfield! {
    /// Transmit Event FIFO Configuration
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Txefc(u32);
    impl Debug;
    pub u16, efsa, set_efsa: 15, 2;
    pub u8, efs, set_efs: 21, 16;
    pub u8, efwm, set_efwm: 29, 24;
}

macro_rules! impl_raw {
    ($($reg:ident),* $(,)?) => {
        $(
            impl $reg {
                /// Wrap a raw register value
                pub const fn from_bits(bits: u32) -> Self {
                    Self(bits)
                }

                /// Raw register value
                pub const fn bits(self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

impl_raw!(
    Cccr,
    Btp,
    Fbtp,
    Test,
    Ecr,
    Psr,
    Ile,
    Gfc,
    Sidfc,
    Xidfc,
    RxFifoConfig,
    RxFifoStatus,
    Rxbc,
    Rxesc,
    Txbc,
    Txfqs,
    Txesc,
    Txefc,
);

macro_rules! impl_start_address {
    ($($reg:ident :: $setter:ident => $name:ident),* $(,)?) => {
        $(
            impl $reg {
                /// Store the lower 16 bits of `address`, word aligned.
                pub fn $name(&mut self, address: usize) {
                    self.$setter(((address & 0xfffc) >> 2) as u16);
                }
            }
        )*
    };
}

impl_start_address!(
    Sidfc::set_flssa => set_start_address,
    Xidfc::set_flesa => set_start_address,
    RxFifoConfig::set_fsa => set_start_address,
    Rxbc::set_rbsa => set_start_address,
    Txbc::set_tbsa => set_start_address,
    Txefc::set_efsa => set_start_address,
);

//! Bit timing computation

use crate::reg::{Btp, Fbtp};
use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Bit-timing parameters
///
/// The bit time is made of `prop_seg + phase_seg_1 + phase_seg_2 + 3` time
/// quanta: the two configured segments before and after the sample point,
/// each stored minus one by the hardware, plus the synchronization segment.
/// The prescaler is derived from the CAN core clock so that the bit time
/// matches `bitrate` as closely as possible.
///
/// Default values are:
/// - prop_seg: 2
/// - phase_seg_1: 8
/// - phase_seg_2: 3
/// - sjw: 4
///
/// giving 16 time quanta per bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// Target bit rate
    pub bitrate: HertzU32,
    /// Propagation segment
    pub prop_seg: u8,
    /// Phase segment before the sample point
    pub phase_seg_1: u8,
    /// Phase segment after the sample point
    pub phase_seg_2: u8,
    /// Synchronization jump width, at least 1
    pub sjw: u8,
}

impl BitTiming {
    /// Default segments at `bitrate`
    pub const fn new(bitrate: HertzU32) -> Self {
        Self {
            bitrate,
            prop_seg: 2,
            phase_seg_1: 8,
            phase_seg_2: 3,
            sjw: 4,
        }
    }

    /// Value of the TSEG1 field
    pub fn tseg1(&self) -> u32 {
        u32::from(self.prop_seg) + u32::from(self.phase_seg_1)
    }

    /// Value of the TSEG2 field
    pub fn tseg2(&self) -> u32 {
        self.phase_seg_2.into()
    }

    /// Time quanta in one bit time
    pub fn time_quanta_per_bit(&self) -> u32 {
        self.tseg1() + self.tseg2() + 3
    }

    fn check(&self, limits: &BitTimingLimits) -> Result<(), BitTimingError> {
        if self.bitrate.raw() == 0 {
            return Err(BitTimingError::ZeroBitrate);
        }
        if !limits.tseg1.contains(&self.tseg1()) {
            return Err(BitTimingError::Tseg1OutOfRange(limits.tseg1.clone()));
        }
        if !limits.tseg2.contains(&self.tseg2()) {
            return Err(BitTimingError::Tseg2OutOfRange(limits.tseg2.clone()));
        }
        let sjw = u32::from(self.sjw);
        if sjw == 0 || !limits.sjw.contains(&(sjw - 1)) {
            return Err(BitTimingError::SynchronizationJumpWidthOutOfRange(
                limits.sjw.clone(),
            ));
        }
        Ok(())
    }

    /// Value of the prescaler field: the clock division closest to the
    /// requested bit rate, minus one.
    fn prescaler(&self, can_clock: HertzU32, limits: &BitTimingLimits) -> Result<u32, BitTimingError> {
        self.check(limits)?;
        let divider = u64::from(self.bitrate.raw()) * u64::from(self.time_quanta_per_bit());
        let rounded = (u64::from(can_clock.raw()) + divider / 2) / divider;
        match rounded.checked_sub(1).and_then(|p| u32::try_from(p).ok()) {
            Some(brp) if limits.brp.contains(&brp) => Ok(brp),
            _ => Err(BitTimingError::PrescalerOutOfRange(limits.brp.clone())),
        }
    }

    /// Bit rate actually produced by these segments at `can_clock`
    pub fn effective_bitrate(&self, can_clock: HertzU32, brp: u32) -> u32 {
        can_clock.raw() / ((brp + 1) * self.time_quanta_per_bit())
    }

    /// Packs the arbitration phase register
    pub fn nominal(&self, can_clock: HertzU32) -> Result<Btp, BitTimingError> {
        let brp = self.prescaler(can_clock, &NOMINAL_LIMITS)?;
        let mut btp = Btp::default();
        btp.set_tseg1(self.tseg1() as u8);
        btp.set_tseg2(self.tseg2() as u8);
        btp.set_sjw(self.sjw - 1);
        btp.set_brp(brp as u16);
        Ok(btp)
    }

    /// Packs the data phase register
    pub fn data(&self, can_clock: HertzU32) -> Result<Fbtp, BitTimingError> {
        let brp = self.prescaler(can_clock, &DATA_LIMITS)?;
        let mut fbtp = Fbtp::default();
        fbtp.set_ftseg1(self.tseg1() as u8);
        fbtp.set_ftseg2(self.tseg2() as u8);
        fbtp.set_fsjw(self.sjw - 1);
        fbtp.set_fbrp(brp as u8);
        Ok(fbtp)
    }
}

/// Misconfigurations of [`BitTiming`]. Ranges refer to register field
/// values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitTimingError {
    /// `prop_seg + phase_seg_1` is outside the wrapped `RangeInclusive`
    Tseg1OutOfRange(RangeInclusive<u32>),
    /// `phase_seg_2` is outside the wrapped `RangeInclusive`
    Tseg2OutOfRange(RangeInclusive<u32>),
    /// `sjw - 1` is outside the wrapped `RangeInclusive`
    SynchronizationJumpWidthOutOfRange(RangeInclusive<u32>),
    /// The computed prescaler is outside the wrapped `RangeInclusive`
    PrescalerOutOfRange(RangeInclusive<u32>),
    /// Bit rate of 0 Hz requested
    ZeroBitrate,
}

/// Valid register field values of one timing register
#[derive(Clone)]
pub(crate) struct BitTimingLimits {
    tseg1: RangeInclusive<u32>,
    tseg2: RangeInclusive<u32>,
    sjw: RangeInclusive<u32>,
    brp: RangeInclusive<u32>,
}

pub(crate) const NOMINAL_LIMITS: BitTimingLimits = BitTimingLimits {
    tseg1: 0..=63,
    tseg2: 0..=15,
    sjw: 0..=15,
    brp: 0..=1023,
};

pub(crate) const DATA_LIMITS: BitTimingLimits = BitTimingLimits {
    tseg1: 0..=15,
    tseg2: 0..=7,
    sjw: 0..=3,
    brp: 0..=31,
};

//! Register access logging
//!
//! [`Traced`] logs every register access at `debug` level. Polling loops read
//! the same register over and over, so identical consecutive reads are
//! compressed: the first three are shown, the fourth prints `...`, and the
//! next differing access reports how many were suppressed.

use super::{Bus, Reg};
use core::cell::Cell;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use log::debug;

/// Identical reads shown before suppression starts
const SHOWN_REPEATS: u32 = 3;

/// What to print for an observed read
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Echo {
    /// Print the access, after reporting how many identical reads of the
    /// previous register were suppressed
    Show { suppressed: Option<u32> },
    /// First suppressed read
    Ellipsis,
    /// Print nothing
    Quiet,
}

#[derive(Copy, Clone, Default)]
pub(crate) struct LastRead {
    reg: Option<Reg>,
    value: u32,
    count: u32,
}

impl LastRead {
    pub(crate) fn observe(&mut self, reg: Reg, value: u32) -> Echo {
        if self.reg == Some(reg) && self.value == value {
            if self.count == u32::MAX {
                return Echo::Quiet;
            }
            self.count += 1;
            return match self.count {
                n if n <= SHOWN_REPEATS => Echo::Show { suppressed: None },
                n if n == SHOWN_REPEATS + 1 => Echo::Ellipsis,
                _ => Echo::Quiet,
            };
        }
        let suppressed = (self.count > SHOWN_REPEATS).then(|| self.count - SHOWN_REPEATS);
        *self = LastRead {
            reg: Some(reg),
            value,
            count: 1,
        };
        Echo::Show { suppressed }
    }
}

/// A [`Bus`] that logs register accesses
pub struct Traced<B> {
    inner: B,
    last: Mutex<CriticalSectionRawMutex, Cell<LastRead>>,
}

impl<B: Bus> Traced<B> {
    /// Wrap `inner`
    pub const fn new(inner: B) -> Self {
        Self {
            inner,
            last: Mutex::new(Cell::new(LastRead {
                reg: None,
                value: 0,
                count: 0,
            })),
        }
    }

    /// Unwrap the underlying bus
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Bus> Bus for Traced<B> {
    fn read(&self, reg: Reg) -> u32 {
        let value = self.inner.read(reg);
        let echo = self.last.lock(|last| {
            let mut state = last.get();
            let echo = state.observe(reg, value);
            last.set(state);
            echo
        });
        match echo {
            Echo::Show { suppressed } => {
                if let Some(n) = suppressed {
                    debug!("[repeats {} more times]", n);
                }
                debug!("{:<6} {:#04x} -> {:#010x}", reg.name(), reg.offset(), value);
            }
            Echo::Ellipsis => debug!("..."),
            Echo::Quiet => {}
        }
        value
    }

    fn write(&self, reg: Reg, value: u32) {
        debug!("{:<6} {:#04x} <- {:#010x}", reg.name(), reg.offset(), value);
        self.inner.write(reg, value)
    }
}

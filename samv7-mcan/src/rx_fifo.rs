//! Reception through RX FIFO 0 and 1
//!
//! Both FIFOs are drained from the interrupt handler. The status register is
//! read once per pass; the batch it describes is decoded in hardware order
//! and acknowledged with the index of its last element.

use crate::bus::Mcan;
use crate::config::Addressing;
use crate::driver::Receiver;
use crate::interrupt::{Interrupt, InterruptSet};
use crate::message::rx;
use crate::messageram::{MessageRamLayout, Region, HEADER_WORDS};
use crate::reg::{Bus, Reg, RxFifoStatus};
use core::sync::atomic::Ordering;
use log::{error, trace};
use samv7_mcan_core::Dependencies;

/// One of the two RX FIFOs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fifo {
    /// RX FIFO 0
    Fifo0,
    /// RX FIFO 1
    Fifo1,
}

impl Fifo {
    pub(crate) const ALL: [Fifo; 2] = [Fifo::Fifo0, Fifo::Fifo1];

    fn status_reg(self) -> Reg {
        match self {
            Fifo::Fifo0 => Reg::Rxf0s,
            Fifo::Fifo1 => Reg::Rxf1s,
        }
    }

    fn acknowledge_reg(self) -> Reg {
        match self {
            Fifo::Fifo0 => Reg::Rxf0a,
            Fifo::Fifo1 => Reg::Rxf1a,
        }
    }

    /// All interrupts of the FIFO
    pub(crate) fn interrupts(self) -> InterruptSet {
        match self {
            Fifo::Fifo0 => InterruptSet::RX_FIFO_0,
            Fifo::Fifo1 => InterruptSet::RX_FIFO_1,
        }
    }

    pub(crate) fn new_message(self) -> InterruptSet {
        match self {
            Fifo::Fifo0 => Interrupt::RxFifo0NewMessage.into(),
            Fifo::Fifo1 => Interrupt::RxFifo1NewMessage.into(),
        }
    }

    pub(crate) fn message_lost(self) -> InterruptSet {
        match self {
            Fifo::Fifo0 => Interrupt::RxFifo0MessageLost.into(),
            Fifo::Fifo1 => Interrupt::RxFifo1MessageLost.into(),
        }
    }

    /// Message RAM region of the FIFO
    pub fn region(self, layout: &MessageRamLayout) -> Region {
        match self {
            Fifo::Fifo0 => layout.rx_fifo_0,
            Fifo::Fifo1 => layout.rx_fifo_1,
        }
    }
}

impl<'a, B: Bus, D: Dependencies, R: Receiver> Mcan<'a, B, D, R> {
    /// Drains `fifo`. The FIFO's interrupts are masked for the duration and
    /// restored afterwards if RX interrupts are enabled. The message lost
    /// interrupt stays masked until `rxint` re-arms it.
    pub(crate) fn receive_fifo(&self, fifo: Fifo) {
        self.disable_interrupts(fifo.interrupts());

        let status = RxFifoStatus::from_bits(self.bus.read(fifo.status_reg()));
        let region = fifo.region(&self.layout);
        let fill = status.ffl() as usize;
        let get = status.fgi() as usize;

        if fill > 0 && region.elements > 0 {
            if status.rfl() {
                error!("{:?}: message lost, dropping {} frames", fifo, fill);
                self.bus.write(Reg::Ir, fifo.message_lost().bits());
            } else {
                for i in 0..fill {
                    self.deliver(fifo, region, (get + i) % region.elements);
                }
            }
            let last = (get + fill - 1) % region.elements;
            self.bus.write(fifo.acknowledge_reg(), last as u32);
        }

        if self.state.rx_enabled.load(Ordering::Relaxed) {
            self.enable_interrupts(fifo.interrupts() - InterruptSet::RX_ERRORS);
        }
    }

    fn deliver(&self, fifo: Fifo, region: Region, index: usize) {
        let offset = region.element(index);
        self.invalidate(offset, region.element_words);
        let slot = self.ram.slice(offset, region.element_words);
        let frame = match rx::decode(slot) {
            Ok(frame) => frame,
            Err(_) => {
                error!(
                    "{:?}[{}]: payload exceeds the {} byte element, dropping",
                    fifo,
                    index,
                    (region.element_words - HEADER_WORDS) * 4
                );
                return;
            }
        };

        if frame.is_extended() && self.config.addressing == Addressing::Standard {
            trace!("{:?}: dropping extended frame {:?}", fifo, frame.id());
            return;
        }
        trace!(
            "{:?}[{}]: {:?}, filter {:?}",
            fifo,
            index,
            frame.id(),
            rx::filter_index(slot)
        );
        if let Err(e) = self.receiver.receive(&frame) {
            error!("{:?}: receiver failed: {:?}", fifo, e);
        }
    }
}

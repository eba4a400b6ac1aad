//! Interrupt handling
//!
//! Runs in interrupt context and never blocks. Error interrupts are logged
//! and masked; they stay masked until the matching group is enabled again
//! through `rxint`/`txint`.

use super::{Interrupt, InterruptSet};
use crate::bus::Mcan;
use crate::driver::Receiver;
use crate::reg::{Bus, Reg};
use crate::rx_fifo::Fifo;
use crate::tx::TxBufferSet;
use core::sync::atomic::Ordering;
use log::{error, trace, warn};
use samv7_mcan_core::Dependencies;

impl<'a, B: Bus, D: Dependencies, R: Receiver> Mcan<'a, B, D, R> {
    /// Services the controller.
    ///
    /// Must be called from the handler attached to both interrupt lines. It
    /// does not take the driver lock, so it is safe to run while a caller
    /// holds it.
    pub fn on_interrupt(&self) {
        let pending = InterruptSet::from_bits(self.bus.read(Reg::Ir) & self.bus.read(Reg::Ie));
        if pending.is_empty() {
            return;
        }
        trace!("interrupt: {:?}", pending);

        // Lost flags are mirrored in the FIFO status and cleared while
        // draining
        let lost = Fifo::Fifo0.message_lost() | Fifo::Fifo1.message_lost();
        self.bus.write(Reg::Ir, (pending - lost).bits());

        let errors = pending & InterruptSet::COMMON_ERRORS;
        if !errors.is_empty() {
            error!(
                "{:?} {:?} {:?}",
                errors,
                self.protocol_status(),
                self.error_counters()
            );
            self.disable_interrupts(errors);
        }

        let errors = pending & InterruptSet::TX_ERRORS;
        if !errors.is_empty() {
            warn!("TX errors: {:?}", errors);
            self.disable_interrupts(errors);
        }

        let completed = InterruptSet::from(Interrupt::TransmissionCompleted);
        if pending.intersects(completed) {
            self.complete_transmissions(errors);
        } else {
            let other = pending & self.tx_interrupts - errors;
            if !other.is_empty() {
                trace!("masking {:?}", other);
                self.disable_interrupts(other);
            }
        }

        let errors = pending & InterruptSet::RX_ERRORS;
        if !errors.is_empty() {
            warn!("RX errors: {:?}", errors);
            self.disable_interrupts(errors);
        }

        let mut serviced = errors;
        for fifo in Fifo::ALL {
            if pending.intersects(fifo.new_message()) {
                self.receive_fifo(fifo);
                serviced = serviced | fifo.interrupts();
            }
        }

        let other = pending & self.rx_interrupts - serviced;
        if !other.is_empty() {
            trace!("masking {:?}", other);
            self.disable_interrupts(other);
        }
    }

    /// Returns the tokens of every in-flight slot the controller reports as
    /// transmitted. `errors` stay masked.
    fn complete_transmissions(&self, errors: InterruptSet) {
        self.disable_interrupts(self.tx_interrupts);

        let done = self.bus.read(Reg::Txbto) & self.state.in_flight.load(Ordering::Relaxed);
        if done != 0 {
            self.bus.modify(Reg::Txbtie, |ie| ie & !done);
            self.state.in_flight.fetch_and(!done, Ordering::Relaxed);
            for index in TxBufferSet(done).iter() {
                trace!("transmitted buffer {}", index);
                self.return_token();
            }
        }

        if self.state.tx_enabled.load(Ordering::Relaxed)
            && self.state.in_flight.load(Ordering::Relaxed) != 0
        {
            self.enable_interrupts(self.tx_interrupts - errors);
        }
    }
}

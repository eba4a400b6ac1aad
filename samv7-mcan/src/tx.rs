//! Transmission through the TX FIFO/queue
//!
//! Every queue slot is represented by an admission token. A sender takes a
//! token before claiming the slot at the hardware put index and the interrupt
//! handler returns it once the controller reports the transmission as
//! completed. The number of requests pending in hardware therefore never
//! exceeds the queue depth.

use crate::bus::{Error, Mcan};
use crate::config::{Addressing, Mode};
use crate::driver::Receiver;
use crate::message::{tx, Frame};
use crate::messageram::MAX_TX_BUFFERS;
use crate::reg::{Bus, Reg, Txfqs};
use core::cell::Cell;
use core::future::poll_fn;
use core::sync::atomic::Ordering;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embedded_can::Id;
use log::{trace, warn};
use samv7_mcan_core::Dependencies;

/// More tokens were released than acquired
#[derive(Debug, PartialEq, Eq)]
pub struct TokenOverflow;

/// Bounded pool of TX admission tokens
pub(crate) struct TxTokens {
    free: Channel<CriticalSectionRawMutex, (), MAX_TX_BUFFERS>,
    outstanding: BlockingMutex<CriticalSectionRawMutex, Cell<usize>>,
    depth: usize,
}

impl TxTokens {
    /// Empty pool for a queue of `depth` slots; call [`Self::refill`] before
    /// use.
    pub(crate) const fn new(depth: usize) -> Self {
        Self {
            free: Channel::new(),
            outstanding: BlockingMutex::new(Cell::new(0)),
            depth,
        }
    }

    /// Makes all `depth` tokens available again
    pub(crate) fn refill(&self) {
        while self.free.try_receive().is_ok() {}
        for _ in 0..self.depth {
            // Cannot fail, the channel was drained and depth <= capacity
            let _ = self.free.try_send(());
        }
        self.outstanding.lock(|o| o.set(0));
    }

    /// Waits until a token is free and takes it
    pub(crate) async fn acquire(&self) {
        poll_fn(|cx| {
            critical_section::with(|_| {
                let token = self.free.poll_receive(cx);
                if token.is_ready() {
                    self.outstanding.lock(|o| o.set(o.get() + 1));
                }
                token
            })
        })
        .await
    }

    /// Takes a token if one is free
    pub(crate) fn try_acquire(&self) -> bool {
        critical_section::with(|_| {
            if self.free.try_receive().is_ok() {
                self.outstanding.lock(|o| o.set(o.get() + 1));
                true
            } else {
                false
            }
        })
    }

    /// Returns a token. Never blocks, safe to call from the interrupt
    /// handler.
    pub(crate) fn release(&self) -> Result<(), TokenOverflow> {
        critical_section::with(|_| {
            self.outstanding.lock(|o| match o.get() {
                0 => Err(TokenOverflow),
                n => {
                    o.set(n - 1);
                    self.free.try_send(()).map_err(|_| TokenOverflow)
                }
            })
        })
    }

    /// Tokens currently free
    pub(crate) fn available(&self) -> usize {
        self.depth - self.outstanding.lock(Cell::get)
    }
}

/// A set of transmit buffers, which may be dedicated buffers or part of the
/// queue.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TxBufferSet(pub u32);

impl FromIterator<usize> for TxBufferSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = 0_u32;
        for i in iter.into_iter() {
            set |= 1u32 << i;
        }
        TxBufferSet(set)
    }
}

impl TxBufferSet {
    /// `true` if no buffer is in the set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// An iterator visiting all elements in ascending order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

/// An iterator over the buffer indexes of the buffers in a [`TxBufferSet`].
///
/// This `struct` is created by [`TxBufferSet::iter`].
pub struct Iter {
    flags: TxBufferSet,
    index: u8,
}

impl Iterator for Iter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < 32 {
            let i = self.index;
            self.index += 1;
            if self.flags.0 & (1 << i) != 0 {
                return Some(i as usize);
            }
        }
        None
    }
}

impl<'a, B: Bus, D: Dependencies, R: Receiver> Mcan<'a, B, D, R> {
    /// Queues `frame` for transmission, waiting for a free queue slot.
    ///
    /// Frames are rejected before any hardware access if the identifier kind
    /// does not match [`Addressing`], if an FD frame is sent in
    /// [`Mode::Iso11898`] or if the payload exceeds the TX element.
    pub async fn send(&self, frame: &Frame) -> Result<(), Error> {
        self.check_frame(frame)?;
        self.tokens.acquire().await;
        let _guard = self.lock.lock().await;
        self.enqueue(frame)
    }

    /// Blocking version of [`Self::send`]
    pub fn blocking_send(&self, frame: &Frame) -> Result<(), Error> {
        block_on(self.send(frame))
    }

    /// Non-blocking version of [`Self::send`]. Fails with
    /// [`nb::Error::WouldBlock`] while all queue slots are taken.
    pub fn try_send(&self, frame: &Frame) -> nb::Result<(), Error> {
        self.check_frame(frame)?;
        if !self.tokens.try_acquire() {
            return Err(nb::Error::WouldBlock);
        }
        let _guard = block_on(self.lock.lock());
        Ok(self.enqueue(frame)?)
    }

    /// `true` if a frame could be queued right now
    pub fn tx_ready(&self) -> bool {
        self.tokens.available() > 0 && !Txfqs::from_bits(self.bus.read(Reg::Txfqs)).tfqf()
    }

    /// `true` if no transmission request is pending
    pub fn tx_empty(&self) -> bool {
        self.bus.read(Reg::Txbrp) == 0
    }

    /// Transmission requests the controller has not completed yet
    pub fn tx_pending(&self) -> TxBufferSet {
        TxBufferSet(self.bus.read(Reg::Txbrp))
    }

    fn check_frame(&self, frame: &Frame) -> Result<(), Error> {
        match (self.config.addressing, frame.id()) {
            (Addressing::Standard, Id::Standard(_)) | (Addressing::Extended, Id::Extended(_)) => {}
            _ => return Err(Error::InvalidId),
        }
        if frame.fd_format() && !self.config.mode.is_fd() {
            return Err(Error::FdNotEnabled);
        }
        if frame.len() > self.config.capacities.tx_buffer_data.bytes() {
            return Err(Error::TooMuchData);
        }
        Ok(())
    }

    /// Writes `frame` at the put index and requests its transmission. The
    /// caller holds a token and the lock.
    fn enqueue(&self, frame: &Frame) -> Result<(), Error> {
        let status = Txfqs::from_bits(self.bus.read(Reg::Txfqs));
        if status.tfqf() {
            warn!("send: TX queue full with a token held");
            self.return_token();
            return Err(Error::QueueFull);
        }

        let index = status.tfqpi() as usize;
        let offset = self.layout.tx_buffer(index);
        let words = self.layout.tx_fifo_queue.element_words;
        let bit_rate_switching = self.config.mode == Mode::FdBitRateSwitching;
        if let Err(e) = tx::encode(frame, bit_rate_switching, self.ram.slice(offset, words)) {
            self.return_token();
            return Err(e.into());
        }
        self.clean(offset, words);

        let bit = 1 << index;
        critical_section::with(|_| {
            self.state.in_flight.fetch_or(bit, Ordering::Relaxed);
            self.bus.modify(Reg::Txbtie, |ie| ie | bit);
            self.bus.write(Reg::Txbar, bit);
            if self.state.tx_enabled.load(Ordering::Relaxed) {
                self.enable_interrupts(self.tx_interrupts);
            }
        });
        trace!("send: {:?} in buffer {}", frame.id(), index);
        Ok(())
    }

    pub(crate) fn return_token(&self) {
        if self.tokens.release().is_err() {
            warn!("TX token released twice");
        }
    }
}

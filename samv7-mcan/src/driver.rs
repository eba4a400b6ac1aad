//! Boundary towards the upper-half CAN layer
//!
//! [`LowerHalf`] is the operation set an upper layer drives; [`Receiver`] is
//! the callback the driver invokes once per received frame.

use crate::bus::{Error, Mcan};
use crate::message::Frame;
use crate::reg::Bus;
use core::fmt::Debug;
use embedded_can::Id;
use samv7_mcan_core::Dependencies;

/// Consumer of received frames. Called from interrupt context.
pub trait Receiver {
    /// Reason a frame was not accepted
    type Error: Debug;

    /// Takes a copy of a received frame. Errors are logged by the driver and
    /// the frame is dropped.
    fn receive(&self, frame: &Frame) -> Result<(), Self::Error>;
}

impl<F, E> Receiver for F
where
    F: Fn(&Frame) -> Result<(), E>,
    E: Debug,
{
    type Error = E;

    fn receive(&self, frame: &Frame) -> Result<(), E> {
        self(frame)
    }
}

/// Operations of a CAN lower-half driver
pub trait LowerHalf {
    /// Reset the controller, leaving it in initialization mode
    fn reset(&self);
    /// Program the controller and attach interrupts
    fn setup(&self) -> Result<(), Error>;
    /// Undo `setup`
    fn shutdown(&self);
    /// Enable or disable RX interrupts
    fn rxint(&self, enable: bool);
    /// Enable or disable TX interrupts
    fn txint(&self, enable: bool);
    /// Driver specific command. No commands are defined.
    fn ioctl(&self, command: u32, argument: usize) -> Result<usize, Error> {
        let _ = (command, argument);
        Err(Error::NotSupported)
    }
    /// Send a remote frame request for `id`. Not implemented.
    fn remote_request(&self, id: Id) -> Result<(), Error> {
        let _ = id;
        Err(Error::NotImplemented)
    }
    /// Queue a frame, blocking while the queue is full
    fn send(&self, frame: &Frame) -> Result<(), Error>;
    /// `true` if `send` would not block
    fn tx_ready(&self) -> bool;
    /// `true` if all queued frames were transmitted
    fn tx_empty(&self) -> bool;
}

impl<'a, B: Bus, D: Dependencies, R: Receiver> LowerHalf for Mcan<'a, B, D, R> {
    fn reset(&self) {
        Mcan::reset(self)
    }

    fn setup(&self) -> Result<(), Error> {
        Mcan::setup(self)
    }

    fn shutdown(&self) {
        Mcan::shutdown(self)
    }

    fn rxint(&self, enable: bool) {
        Mcan::rxint(self, enable)
    }

    fn txint(&self, enable: bool) {
        Mcan::txint(self, enable)
    }

    fn send(&self, frame: &Frame) -> Result<(), Error> {
        self.blocking_send(frame)
    }

    fn tx_ready(&self) -> bool {
        Mcan::tx_ready(self)
    }

    fn tx_empty(&self) -> bool {
        Mcan::tx_empty(self)
    }
}

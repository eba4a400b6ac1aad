//! Handling of messages/frames
//!
//! [`Frame`] is the driver's value type for a CAN frame. It is copied into
//! and out of the message RAM by [`tx::encode`] and [`rx::decode`]; no
//! reference into the RAM outlives those calls.

pub(crate) mod rx;
pub(crate) mod tx;

use embedded_can::{ExtendedId, Id, StandardId};

/// Largest payload of an FD frame
pub const MAX_FD_PAYLOAD: usize = 64;

/// Data does not fit in the backing buffer
#[derive(Debug, PartialEq, Eq)]
pub struct TooMuchData;

/// CAN frame/message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    id: Id,
    remote: bool,
    fd: bool,
    error_passive: bool,
    dlc: u8,
    data: [u8; MAX_FD_PAYLOAD],
}

impl Frame {
    /// Classic data frame with up to 8 bytes
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Result<Self, TooMuchData> {
        Self::with_payload(id.into(), data, false)
    }

    /// FD data frame with up to 64 bytes. Payloads between the valid FD
    /// lengths are padded with zeros.
    pub fn new_fd(id: impl Into<Id>, data: &[u8]) -> Result<Self, TooMuchData> {
        Self::with_payload(id.into(), data, true)
    }

    /// Classic remote frame requesting `dlc`
    pub fn new_remote(id: impl Into<Id>, dlc: u8) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            remote: true,
            fd: false,
            error_passive: false,
            dlc,
            data: [0; MAX_FD_PAYLOAD],
        })
    }

    fn with_payload(id: Id, payload: &[u8], fd: bool) -> Result<Self, TooMuchData> {
        let dlc = len_to_dlc(payload.len(), fd)?;
        let mut data = [0; MAX_FD_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            remote: false,
            fd,
            error_passive: false,
            dlc,
            data,
        })
    }

    /// CAN identifier
    pub fn id(&self) -> Id {
        self.id
    }

    /// Check if the frame uses an extended (29-bit) ID
    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    /// Remote Transmission Request
    pub fn is_remote_frame(&self) -> bool {
        self.remote
    }

    /// True if the frame uses the CAN FD format
    pub fn fd_format(&self) -> bool {
        self.fd
    }

    /// `true` if the sender of a received frame indicated that it is in
    /// "error passive" state
    pub fn is_transmitter_error_passive(&self) -> bool {
        self.error_passive
    }

    /// Data length code
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Payload length in bytes, 0 for remote frames
    pub fn len(&self) -> usize {
        if self.remote {
            0
        } else {
            dlc_to_len(self.dlc, self.fd)
        }
    }

    /// `true` if the frame carries no payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data field
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Frame::new(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        Frame::new_remote(id, u8::try_from(dlc).ok()?)
    }

    fn is_extended(&self) -> bool {
        Frame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        Frame::is_remote_frame(self)
    }

    fn id(&self) -> Id {
        Frame::id(self)
    }

    fn dlc(&self) -> usize {
        self.dlc.into()
    }

    fn data(&self) -> &[u8] {
        Frame::data(self)
    }
}

/// Identifier field of element word 0
pub(crate) fn id_field(id: Id) -> u32 {
    match id {
        Id::Standard(id) => (id.as_raw() as u32) << 18,
        Id::Extended(id) => id.as_raw(),
    }
}

/// Inverse of [`id_field`] given the XTD flag
pub(crate) fn id_from_field(field: u32, extended: bool) -> Id {
    if extended {
        // The mask ensures the ID is in range for a 29-bit integer
        Id::Extended(unsafe { ExtendedId::new_unchecked(field & ExtendedId::MAX.as_raw()) })
    } else {
        // The mask ensures the ID is in range for a 11-bit integer
        Id::Standard(unsafe {
            StandardId::new_unchecked((field >> 18) as u16 & StandardId::MAX.as_raw())
        })
    }
}

/// Finds the smallest data length code that encodes at least len bytes
pub(crate) fn len_to_dlc(len: usize, fd_format: bool) -> Result<u8, TooMuchData> {
    if fd_format {
        match len {
            0..=8 => Ok(len as u8),
            9..=12 => Ok(9),
            13..=16 => Ok(10),
            17..=20 => Ok(11),
            21..=24 => Ok(12),
            25..=32 => Ok(13),
            33..=48 => Ok(14),
            49..=64 => Ok(15),
            _ => Err(TooMuchData),
        }
    } else {
        match len {
            0..=8 => Ok(len as u8),
            _ => Err(TooMuchData),
        }
    }
}

/// Converts data length code to a length in bytes
pub(crate) fn dlc_to_len(dlc: u8, fd_format: bool) -> usize {
    if fd_format {
        match dlc {
            0..=8 => dlc.into(),
            9 => 12,
            10 => 16,
            11 => 20,
            12 => 24,
            13 => 32,
            14 => 48,
            15.. => 64,
        }
    } else {
        match dlc {
            0..=8 => dlc.into(),
            9.. => 8,
        }
    }
}

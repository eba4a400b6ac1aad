//! Decoding of RX FIFO elements

use super::{dlc_to_len, id_from_field, Frame, TooMuchData, MAX_FD_PAYLOAD};
use crate::messageram::HEADER_WORDS;
use vcell::VolatileCell;

/// Reads the element `slot` into a [`Frame`].
///
/// Fails if the DLC announces more data than the element's data field
/// holds; the controller stores only the leading bytes of such frames.
pub(crate) fn decode(slot: &[VolatileCell<u32>]) -> Result<Frame, TooMuchData> {
    let r0 = slot[0].get();
    let r1 = slot[1].get();

    let remote = r0 & (1 << 29) != 0; // RTR
    let extended = r0 & (1 << 30) != 0; // XTD
    let error_passive = r0 & (1 << 31) != 0; // ESI
    let dlc = ((r1 >> 16) & 0xf) as u8;
    let fd = r1 & (1 << 21) != 0; // FDF

    let mut data = [0; MAX_FD_PAYLOAD];
    if !remote {
        let len = dlc_to_len(dlc, fd);
        if len > slot.len().saturating_sub(HEADER_WORDS) * 4 {
            return Err(TooMuchData);
        }
        for (chunk, word) in data[..len].chunks_mut(4).zip(&slot[HEADER_WORDS..]) {
            let bytes = word.get().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    Ok(Frame {
        id: id_from_field(r0, extended),
        remote,
        fd,
        error_passive,
        dlc,
        data,
    })
}

/// Filter element index that accepted the frame in `slot`. `None` if it was
/// accepted as a non-matching frame.
pub(crate) fn filter_index(slot: &[VolatileCell<u32>]) -> Option<u8> {
    let r1 = slot[1].get();
    if r1 & (1 << 31) != 0 {
        None
    } else {
        Some(((r1 >> 24) & 0x7f) as u8)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::tx::encode;
    use embedded_can::{ExtendedId, Id, StandardId};

    fn ram<const N: usize>() -> [VolatileCell<u32>; N] {
        core::array::from_fn(|_| VolatileCell::new(0))
    }

    #[test]
    fn extended_classic_round_trip() {
        let ram = ram::<4>();
        let id = ExtendedId::new(0x1abc_def).unwrap();
        let sent = Frame::new(id, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        encode(&sent, false, &ram).unwrap();

        let received = decode(&ram).unwrap();
        assert_eq!(received, sent);
        assert_eq!(received.id(), Id::Extended(id));
        assert!(!received.is_remote_frame());
        assert_eq!(received.dlc(), 8);
        assert_eq!(received.data(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn fd_round_trip_and_undersized_elements() {
        let ram = ram::<18>();
        let id = StandardId::new(0x7ff).unwrap();
        let sent = Frame::new_fd(id, &[9; 48]).unwrap();
        encode(&sent, true, &ram).unwrap();
        assert_eq!(decode(&ram), Ok(sent));

        // An 8 byte element only holds the start of the payload
        assert_eq!(decode(&ram[..4]), Err(TooMuchData));
        assert_eq!(decode(&ram[..13]), Err(TooMuchData));
        assert!(decode(&ram[..14]).is_ok());

        // Remote frames carry no payload whatever the DLC
        ram[0].set(ram[0].get() | 1 << 29);
        assert!(decode(&ram[..2]).unwrap().is_remote_frame());
    }

    #[test]
    fn receive_header_fields() {
        let ram = ram::<4>();
        ram[0].set(0x05 << 18 | 1 << 31);
        ram[1].set(0x0123 | 3 << 24 | 1 << 16);
        ram[2].set(0x44);
        let frame = decode(&ram).unwrap();
        assert!(frame.is_transmitter_error_passive());
        assert_eq!(frame.id(), Id::Standard(StandardId::new(5).unwrap()));
        assert_eq!(frame.data(), &[0x44]);
        assert_eq!(filter_index(&ram), Some(3));
        ram[1].set(1 << 31);
        assert_eq!(filter_index(&ram), None);
    }
}

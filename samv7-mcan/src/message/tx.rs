//! Encoding of frames into TX buffer elements

use super::{id_field, Frame, TooMuchData};
use crate::messageram::HEADER_WORDS;
use vcell::VolatileCell;

/// Writes `frame` into the element `slot`.
///
/// Word 0 carries the identifier with the RTR, XTD and ESI flags, word 1 the
/// DLC with the BRS and FDF flags, the rest is the payload in transfer order.
/// Fails without touching `slot` if the payload does not fit.
pub(crate) fn encode(
    frame: &Frame,
    bit_rate_switching: bool,
    slot: &[VolatileCell<u32>],
) -> Result<(), TooMuchData> {
    let data = frame.data();
    let capacity = slot.len().saturating_sub(HEADER_WORDS) * 4;
    if data.len() > capacity {
        return Err(TooMuchData);
    }

    let rtr = frame.is_remote_frame();
    let xtd = frame.is_extended();
    let fdf = frame.fd_format();
    let brs = fdf && bit_rate_switching;

    let t0 = id_field(frame.id()) | (rtr as u32) << 29 | (xtd as u32) << 30;
    let t1 = (((frame.dlc() & 0xf) as u32) << 16) | ((brs as u32) << 20) | ((fdf as u32) << 21);
    slot[0].set(t0);
    slot[1].set(t1);

    for (word, chunk) in slot[HEADER_WORDS..].iter().zip(data.chunks(4)) {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        word.set(u32::from_le_bytes(bytes));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use embedded_can::{ExtendedId, StandardId};

    fn slot<const N: usize>() -> [VolatileCell<u32>; N] {
        core::array::from_fn(|_| VolatileCell::new(0xdead_beef))
    }

    #[test]
    fn header_layout() {
        let ram = slot::<4>();
        let id = StandardId::new(0x123).unwrap();
        encode(&Frame::new(id, &[0xaa, 0xbb, 0xcc]).unwrap(), true, &ram).unwrap();
        assert_eq!(ram[0].get(), 0x123 << 18);
        // BRS is only set for FD frames
        assert_eq!(ram[1].get(), 3 << 16);
        assert_eq!(ram[2].get(), 0x00cc_bbaa);

        let id = ExtendedId::new(0x1abc_def).unwrap();
        encode(&Frame::new_remote(id, 2).unwrap(), false, &ram).unwrap();
        assert_eq!(ram[0].get(), 0x1abc_def | 1 << 29 | 1 << 30);
        assert_eq!(ram[1].get(), 2 << 16);
    }

    #[test]
    fn fd_flags() {
        let ram = slot::<18>();
        let id = StandardId::new(1).unwrap();
        encode(&Frame::new_fd(id, &[7; 64]).unwrap(), true, &ram).unwrap();
        assert_eq!(ram[1].get(), 15 << 16 | 1 << 20 | 1 << 21);
        assert!(ram[2..].iter().all(|w| w.get() == 0x0707_0707));
    }

    #[test]
    fn payload_must_fit_the_element() {
        let ram = slot::<4>();
        let id = StandardId::new(1).unwrap();
        let frame = Frame::new_fd(id, &[1; 12]).unwrap();
        assert_eq!(encode(&frame, false, &ram), Err(TooMuchData));
        assert_eq!(ram[0].get(), 0xdead_beef);
    }
}

//! Variable-length integers of the catalog database.
//!
//! Big-endian groups of 7 bits with the high bit as a continuation flag.
//! At most 9 bytes: the ninth byte contributes all 8 of its bits, so every
//! `u64` is representable.

use semlens_common::constants::MAX_VARINT_LEN;

/// Decodes a varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// buffer ends before the varint does.
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        if i == MAX_VARINT_LEN - 1 {
            return Some(((value << 8) | u64::from(byte), MAX_VARINT_LEN));
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Appends the varint encoding of `value` to `out`.
///
/// Returns the number of bytes written. The encoding is the shortest one,
/// and [`decode_varint`] reads it back exactly.
pub fn encode_varint(value: u64, out: &mut Vec<u8>) -> usize {
    if value >> 56 != 0 {
        let mut buf = [0u8; MAX_VARINT_LEN];
        buf[8] = value as u8;
        let mut rest = value >> 8;
        for slot in buf[..8].iter_mut().rev() {
            *slot = (rest & 0x7F) as u8 | 0x80;
            rest >>= 7;
        }
        out.extend_from_slice(&buf);
        return MAX_VARINT_LEN;
    }

    let mut groups = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
    len
}

/// Returns the encoded length of `value`.
pub fn varint_len(value: u64) -> usize {
    if value >> 56 != 0 {
        return MAX_VARINT_LEN;
    }
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

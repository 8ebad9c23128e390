//! Little-endian integer codecs, the CompactSize varint, and the
//! compact-bits difficulty target encoding. See spec §4.C1.

use crate::error::DecodeError;

/// Declared-length cap shared by every decoder in this crate. No
/// sequence sized by a wire-supplied count may be allocated before its
/// declared length is checked against this cap (spec §4.C1, §8 S5).
pub const MAX_BLOCK_SIZE: u64 = 1_000_000;

/// A cursor over an immutable byte slice. Every primitive read advances
/// the cursor or leaves it untouched and returns `Truncated`.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The full slice this reader was built over.
    pub fn full_buf(&self) -> &'a [u8] {
        self.buf
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Reads a CompactSize ("varint") integer.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let tag = self.read_array::<1>()?[0];
        match tag {
            0xFD => Ok(u16::from_le_bytes(self.read_array::<2>()?) as u64),
            0xFE => Ok(u32::from_le_bytes(self.read_array::<4>()?) as u64),
            0xFF => Ok(u64::from_le_bytes(self.read_array::<8>()?)),
            n => Ok(n as u64),
        }
    }

    /// Reads a varint-prefixed count, failing `Oversize` before the
    /// caller allocates anything sized by it. `per_item` is the minimum
    /// plausible wire size of one element, used to derive a tighter
    /// bound than the flat `MAX_BLOCK_SIZE` cap where the caller knows it.
    pub fn read_count(&mut self, per_item: u64) -> Result<u64, DecodeError> {
        let n = self.read_varint()?;
        let cap = if per_item == 0 {
            MAX_BLOCK_SIZE
        } else {
            MAX_BLOCK_SIZE / per_item
        };
        if n > cap {
            return Err(DecodeError::Oversize { declared: n, cap });
        }
        if n > self.remaining() as u64 {
            return Err(DecodeError::Oversize {
                declared: n,
                cap: self.remaining() as u64,
            });
        }
        Ok(n)
    }
}

/// CompactSize size-of, used to precompute serialized lengths without
/// allocating (spec §4.C1).
pub fn varint_size(n: u64) -> usize {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

pub fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => out.push(n as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// A 4-byte packed 256-bit difficulty ceiling: `0xEEMMMMMM -> M * 256^(E-3)`.
/// This core only ever stores this value (as `NetworkParams::max_target`);
/// it performs no proof-of-work arithmetic against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactBits(pub u32);

impl CompactBits {
    /// Decodes into a big-endian, arbitrary-precision byte representation.
    /// Values that would overflow 32 bytes saturate to all-0xFF, mirroring
    /// the historical "negative mantissa -> zero" and overflow clamps of
    /// the reference compact-bits decoding, without needing a big-integer
    /// dependency this core otherwise has no use for.
    pub fn to_target_be_bytes(self) -> [u8; 32] {
        let exponent = (self.0 >> 24) as i32;
        let mantissa = self.0 & 0x007F_FFFF;
        let negative = self.0 & 0x0080_0000 != 0;
        let mut out = [0u8; 32];
        if negative || mantissa == 0 {
            return out;
        }
        // The encoding only ever shifts the 3-byte mantissa by whole
        // bytes, never by sub-byte bit counts.
        let shift_bytes = exponent - 3;
        let m = mantissa.to_be_bytes(); // 4 bytes, top byte always 0 (23-bit value)
        let m = &m[1..]; // 3 significant bytes, most-significant first
        if shift_bytes >= 0 {
            let shift_bytes = shift_bytes as usize;
            if shift_bytes + 3 > 32 {
                // exponent implies a value wider than 256 bits; saturate.
                return [0xFFu8; 32];
            }
            let start = 32 - shift_bytes - 3;
            out[start..start + 3].copy_from_slice(m);
        } else {
            let drop = (-shift_bytes) as usize;
            if drop < 3 {
                let keep = 3 - drop;
                out[32 - keep..32].copy_from_slice(&m[..keep]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trips_all_size_classes() {
        for n in [0u64, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, n);
            assert_eq!(buf.len(), varint_size(n));
            let mut r = Reader::new(&buf);
            assert_eq!(r.read_varint().unwrap(), n);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn truncated_read_fails() {
        let buf = [0xFDu8, 0x01];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_varint(), Err(DecodeError::Truncated));
    }

    #[test]
    fn oversize_count_detected_before_allocation() {
        // 0xFE + u32 LE 0x7FFFFFFF, as in spec §8 S5.
        let buf = [0xFEu8, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut r = Reader::new(&buf);
        let err = r.read_count(60).unwrap_err();
        assert!(matches!(err, DecodeError::Oversize { .. }));
    }

    #[test]
    fn compact_bits_zero_for_zero_mantissa() {
        assert_eq!(CompactBits(0x0400_0000).to_target_be_bytes(), [0u8; 32]);
    }

    #[test]
    fn compact_bits_decodes_standard_example() {
        // 0x1d00ffff -> 0x00ffff * 256^(0x1d-3), matches Bitcoin mainnet's
        // historical genesis-era difficulty-1 target.
        let bytes = CompactBits(0x1d00_ffff).to_target_be_bytes();
        assert_eq!(&bytes[3..6], &[0x00, 0xff, 0xff]);
        assert!(bytes[6..].iter().all(|&b| b == 0));
        assert!(bytes[..3].iter().all(|&b| b == 0));
    }
}

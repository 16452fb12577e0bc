//! Field-level decoding of fixed on-disk records.
//!
//! Records are pulled from the stream as whole byte arrays and then split into
//! fields here, so every count, size, offset, and id is converted to host order
//! before anything else looks at it.

use super::endianness::FILE_ORDER;

pub struct FieldDecoder<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> FieldDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, at: 0 }
    }

    #[inline(always)]
    pub fn u32(&mut self) -> u32 {
        let raw = self.array::<4>();
        FILE_ORDER.decode_u32(raw)
    }

    #[inline(always)]
    pub fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        out
    }
}

pub struct FieldEncoder<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> FieldEncoder<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    #[inline(always)]
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.out.extend_from_slice(&FILE_ORDER.encode_u32(value));
        self
    }

    #[inline(always)]
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Writes `bytes` into a zero-filled slot of exactly `len` bytes.
    pub fn padded(&mut self, bytes: &[u8], len: usize) -> &mut Self {
        let take = bytes.len().min(len);
        self.out.extend_from_slice(&bytes[..take]);
        self.out.resize(self.out.len() + (len - take), 0);
        self
    }
}

/// Cuts a fixed-width name field at its first NUL.
pub fn fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decoder_reads_fields_in_file_order() {
        let raw = hex!("10 07 00 00 ff 41 42 01 00 00 00");
        let mut dec = FieldDecoder::new(&raw);
        assert_eq!(dec.u32(), 0x0710, "version field decodes little-endian");
        assert_eq!(dec.array::<3>(), [0xFF, 0x41, 0x42]);
        assert_eq!(dec.u32(), 1);
    }

    #[test]
    fn encoder_pads_fixed_slots() {
        let mut out = Vec::new();
        FieldEncoder::new(&mut out).u32(7).padded(b"MAIN", 6);
        assert_eq!(out, hex!("07 00 00 00 4d 41 49 4e 00 00"));
    }

    #[test]
    fn fixed_name_stops_at_nul() {
        assert_eq!(fixed_name(b"SAY\0junk"), "SAY");
        assert_eq!(fixed_name(b"FULL"), "FULL", "unterminated names use the whole slot");
    }
}

//! Byte-order helpers shared by the field decoder and the payload walker.

/// Order every multi-byte field is written in on disk.
pub const FILE_ORDER: Endianness = Endianness::Little;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    #[inline(always)]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    #[inline(always)]
    pub const fn differs_from(self, other: Endianness) -> bool {
        !matches!(
            (self, other),
            (Endianness::Little, Endianness::Little) | (Endianness::Big, Endianness::Big)
        )
    }

    #[inline(always)]
    pub fn decode_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }

    #[inline(always)]
    pub fn encode_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }
}

/// Reverses every `width`-byte element of `bytes` in place.
///
/// Trailing bytes that do not fill a whole element are left alone.
#[inline]
pub fn swap_elements(bytes: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for element in bytes.chunks_exact_mut(width) {
        element.reverse();
    }
}

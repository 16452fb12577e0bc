//! ContainerReader wraps a seekable byte stream and exposes reads relative to
//! the module's base offset, so a module embedded inside a larger file is read
//! exactly like a standalone one.
//!
//! The reader learns the stream length up front and checks every request
//! against it before allocating or reading, which keeps a corrupted count from
//! turning into a huge allocation. Errors are stamped with the load phase that
//! was active when they happened.
use std::io::{self, Read, Seek, SeekFrom};

use super::endianness::FILE_ORDER;
use super::error::{LoadError, LoadPhase, LoadResult};
use super::fields::fixed_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerSeek {
    /// Absolute offset from the module base.
    Start(u32),
    Current(i64),
    End(i64),
}

pub struct ContainerReader<R> {
    source: R,
    base: u64,
    len: u64,
    position: u64,
    phase: LoadPhase,
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn open(mut source: R, base_offset: u64) -> LoadResult<Self> {
        let end = source
            .seek(SeekFrom::End(0))
            .map_err(|err| LoadError::io(LoadPhase::Header, err))?;
        if end < base_offset {
            return Err(LoadError::Truncated {
                phase: LoadPhase::Header,
                offset: base_offset,
                len: 0,
                available: end,
            });
        }
        source
            .seek(SeekFrom::Start(base_offset))
            .map_err(|err| LoadError::io(LoadPhase::Header, err))?;
        Ok(Self {
            source,
            base: base_offset,
            len: end - base_offset,
            position: 0,
            phase: LoadPhase::Header,
        })
    }

    #[inline(always)]
    pub fn set_phase(&mut self, phase: LoadPhase) {
        self.phase = phase;
    }

    #[inline(always)]
    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    #[inline(always)]
    pub fn base_offset(&self) -> u64 {
        self.base
    }

    /// Current position relative to the module base.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes available between the module base and the end of the stream.
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn seek(&mut self, to: ContainerSeek) -> LoadResult<u64> {
        let target = match to {
            ContainerSeek::Start(offset) => Some(offset as i128),
            ContainerSeek::Current(delta) => Some(self.position as i128 + delta as i128),
            ContainerSeek::End(delta) => Some(self.len as i128 + delta as i128),
        };
        let target = target
            .filter(|value| *value >= 0 && *value <= self.len as i128)
            .map(|value| value as u64)
            .ok_or_else(|| {
                LoadError::io(
                    self.phase,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("seek {to:?} leaves the {}-byte container", self.len),
                    ),
                )
            })?;
        if target != self.position {
            self.source
                .seek(SeekFrom::Start(self.base + target))
                .map_err(|err| LoadError::io(self.phase, err))?;
            self.position = target;
        }
        Ok(self.position)
    }

    /// Fails unless `len` more bytes exist past the current position.
    pub fn ensure_available(&self, len: u64) -> LoadResult<()> {
        match self.position.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(LoadError::Truncated {
                phase: self.phase,
                offset: self.position,
                len,
                available: self.len,
            }),
        }
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> LoadResult<()> {
        self.ensure_available(buf.len() as u64)?;
        self.source
            .read_exact(buf)
            .map_err(|err| LoadError::io(self.phase, err))?;
        self.position += buf.len() as u64;
        Ok(())
    }

    #[inline(always)]
    pub fn read_fixed<const N: usize>(&mut self) -> LoadResult<[u8; N]> {
        let mut out = [0u8; N];
        self.read_into(&mut out)?;
        Ok(out)
    }

    #[inline(always)]
    pub fn read_u32(&mut self) -> LoadResult<u32> {
        let raw = self.read_fixed::<4>()?;
        Ok(FILE_ORDER.decode_u32(raw))
    }

    pub fn read_bytes(&mut self, len: usize) -> LoadResult<Vec<u8>> {
        self.ensure_available(len as u64)?;
        let mut out = try_vec::<u8>(self.phase, len)?;
        out.resize(len, 0);
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// Reads `count` words, each converted from file order.
    pub fn read_u32_array(&mut self, count: usize) -> LoadResult<Vec<u32>> {
        let byte_len = count.checked_mul(4).ok_or(LoadError::Truncated {
            phase: self.phase,
            offset: self.position,
            len: u64::MAX,
            available: self.len,
        })?;
        let raw = self.read_bytes(byte_len)?;
        let mut out = try_vec::<u32>(self.phase, count)?;
        out.extend(
            raw.chunks_exact(4)
                .map(|word| FILE_ORDER.decode_u32([word[0], word[1], word[2], word[3]])),
        );
        Ok(out)
    }

    /// Reads a `len`-byte name slot and cuts it at the first NUL.
    pub fn read_name(&mut self, len: usize) -> LoadResult<String> {
        let raw = self.read_bytes(len)?;
        Ok(fixed_name(&raw))
    }

    /// Checks that `count` records of `record_len` bytes fit at the current
    /// position, then hands back an empty vector able to hold them.
    pub fn reserve_records<T>(&self, count: u32, record_len: usize) -> LoadResult<Vec<T>> {
        let total = (count as u64).saturating_mul(record_len as u64);
        self.ensure_available(total)?;
        try_vec(self.phase, count as usize)
    }
}

/// Allocates room for `count` values, reporting failure instead of aborting.
pub(crate) fn try_vec<T>(phase: LoadPhase, count: usize) -> LoadResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|_| LoadError::Allocation {
            phase,
            bytes: count.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::error::ErrorKind;
    use hex_literal::hex;

    fn make_reader(prefix: usize) -> ContainerReader<Cursor<Vec<u8>>> {
        let mut bytes = vec![0xEE; prefix];
        bytes.extend_from_slice(&hex!("01 00 00 00 02 00 00 00 4d 41 49 4e 00 00 00 00"));
        ContainerReader::open(Cursor::new(bytes), prefix as u64).expect("open reader")
    }

    #[test]
    fn reads_are_relative_to_the_base_offset() {
        let mut reader = make_reader(32);
        assert_eq!(reader.len(), 16, "length excludes the bytes before the base");
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert_eq!(reader.position(), 4, "position advances past the word");
        reader.seek(ContainerSeek::Start(8)).unwrap();
        assert_eq!(reader.read_name(8).unwrap(), "MAIN");
        reader.seek(ContainerSeek::Start(0)).unwrap();
        assert_eq!(reader.read_u32_array(2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn relative_seeks_stay_inside_the_container() {
        let mut reader = make_reader(4);
        assert_eq!(reader.seek(ContainerSeek::End(-4)).unwrap(), 12);
        assert_eq!(reader.seek(ContainerSeek::Current(-12)).unwrap(), 0);
        assert!(
            reader.seek(ContainerSeek::Current(-1)).is_err(),
            "seeking before the base must fail"
        );
        assert!(
            reader.seek(ContainerSeek::End(1)).is_err(),
            "seeking past the end must fail"
        );
        assert_eq!(reader.position(), 0, "failed seeks leave the cursor alone");
    }

    #[test]
    fn short_reads_report_truncation_with_phase() {
        let mut reader = make_reader(0);
        reader.set_phase(LoadPhase::Imports);
        reader.seek(ContainerSeek::Start(12)).unwrap();
        let err = reader.read_u32_array(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io, "short read is an I/O failure");
        assert_eq!(err.phase(), Some(LoadPhase::Imports));
        assert_eq!(reader.position(), 12, "nothing was consumed");
    }

    #[test]
    fn huge_record_counts_fail_before_allocation() {
        let reader = make_reader(0);
        let err = reader.reserve_records::<u64>(u32::MAX, 84).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { .. }), "got {err:?}");
    }

    #[test]
    fn base_past_end_is_rejected() {
        let err = ContainerReader::open(Cursor::new(vec![0u8; 4]), 8)
            .err()
            .expect("base beyond stream");
        assert_eq!(err.phase(), Some(LoadPhase::Header));
    }
}

//! Constant string pool: a start-offset table over one NUL-separated text blob.

use std::borrow::Cow;
use std::io::{Read, Seek};

use crate::container::reader::{ContainerReader, ContainerSeek};
use crate::container::{LoadError, LoadResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringPool {
    offsets: Vec<u32>,
    text: Vec<u8>,
}

impl StringPool {
    pub fn new(offsets: Vec<u32>, text: Vec<u8>) -> Self {
        Self { offsets, text }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Raw bytes of string `index`, without the terminating NUL.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(index)? as usize;
        let tail = self.text.get(start..)?;
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        Some(&tail[..end])
    }

    pub fn get_str(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get(index).map(String::from_utf8_lossy)
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn read_from<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offsets_at: u32,
        count: u32,
        text_at: u32,
        text_size: u32,
    ) -> LoadResult<Self> {
        let offsets = if count > 0 {
            reader.seek(ContainerSeek::Start(offsets_at))?;
            reader.read_u32_array(count as usize)?
        } else {
            Vec::new()
        };
        let text = if text_size > 0 {
            reader.seek(ContainerSeek::Start(text_at))?;
            reader.read_bytes(text_size as usize)?
        } else {
            Vec::new()
        };
        if let Some((index, bad)) = offsets
            .iter()
            .enumerate()
            .find(|(_, offset)| **offset as usize > text.len())
        {
            return Err(LoadError::malformed(
                reader.phase(),
                format!(
                    "string {index} starts at {bad} past the {}-byte text block",
                    text.len()
                ),
            ));
        }
        Ok(Self { offsets, text })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::container::fields::FieldEncoder;

    #[test]
    fn strings_end_at_their_nul() {
        let pool = StringPool::new(vec![0, 6, 6], b"hello\0\0".to_vec());
        assert_eq!(pool.get(0), Some(&b"hello"[..]));
        assert_eq!(pool.get(1), Some(&b""[..]), "empty string is valid");
        assert_eq!(pool.get_str(0).as_deref(), Some("hello"));
        assert_eq!(pool.get(3), None, "out of range index");
    }

    #[test]
    fn offsets_past_the_text_are_malformed() {
        let mut bytes = Vec::new();
        FieldEncoder::new(&mut bytes).u32(0).u32(9).bytes(b"ab\0");
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let err = StringPool::read_from(&mut reader, 0, 2, 8, 3).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }), "got {err:?}");
    }

    #[test]
    fn reads_offsets_and_text() {
        let mut bytes = Vec::new();
        FieldEncoder::new(&mut bytes).u32(0).u32(3).bytes(b"ab\0cd\0");
        let mut reader = ContainerReader::open(Cursor::new(bytes), 0).unwrap();
        let pool = StringPool::read_from(&mut reader, 0, 2, 8, 6).expect("read pool");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get_str(1).as_deref(), Some("cd"));
    }
}

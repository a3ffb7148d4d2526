//! Append-only string pool.
//!
//! Stores identifier strings as UTF-8, NUL-terminated, referenced by byte
//! offset. Offset 0 is the canonical empty string. Duplicates are allowed;
//! nothing in the engine requires interning.

use std::ffi::CStr;

use crate::{Error, Result};

/// The string pool of one database.
#[derive(Debug, Clone)]
pub struct StringHeap {
    data: Vec<u8>,
}

impl StringHeap {
    /// Creates an empty pool containing only the empty string at offset 0.
    #[must_use]
    pub fn new() -> Self {
        StringHeap { data: vec![0] }
    }

    /// Adopts an existing pool image.
    ///
    /// # Errors
    /// Returns an error if the image does not start with the mandatory
    /// leading NUL or does not end on a terminator.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("String pool must start with NUL"));
        }
        if *data.last().unwrap_or(&1) != 0 {
            return Err(malformed_error!("String pool must end with NUL"));
        }

        Ok(StringHeap {
            data: data.to_vec(),
        })
    }

    /// Appends a string, returning its offset. The empty string is always
    /// offset 0 and is never re-added.
    ///
    /// # Errors
    /// Returns an error if the string contains an interior NUL, which the
    /// terminator encoding cannot represent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if value.as_bytes().contains(&0) {
            return Err(malformed_error!("String contains interior NUL"));
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        Ok(offset)
    }

    /// Reads the string at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if the offset is out of
    /// bounds, and a malformed error if the bytes there are not valid
    /// NUL-terminated UTF-8.
    pub fn get(&self, offset: u32) -> Result<&str> {
        let index = offset as usize;
        if index >= self.data.len() {
            return Err(Error::InvalidOffset(offset));
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(raw) => raw
                .to_str()
                .map_err(|_| malformed_error!("Invalid string at offset - {}", offset)),
            Err(_) => Err(malformed_error!("Invalid string at offset - {}", offset)),
        }
    }

    /// The raw pool image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Current pool size in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        u32::try_from(self.data.len()).unwrap_or(u32::MAX)
    }
}

impl Default for StringHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut heap = StringHeap::new();
        let hello = heap.add("Hello").unwrap();
        let world = heap.add("World").unwrap();

        assert_eq!(heap.get(hello).unwrap(), "Hello");
        assert_eq!(heap.get(world).unwrap(), "World");
        assert_eq!(heap.get(0).unwrap(), "");

        // Duplicates are allowed and get fresh offsets
        let again = heap.add("Hello").unwrap();
        assert_ne!(again, hello);
        assert_eq!(heap.get(again).unwrap(), "Hello");
    }

    #[test]
    fn empty_string_is_offset_zero() {
        let mut heap = StringHeap::new();
        assert_eq!(heap.add("").unwrap(), 0);
        assert_eq!(heap.size(), 1);
    }

    #[test]
    fn offsets_are_monotonic() {
        let mut heap = StringHeap::new();
        let mut last = 0;
        for name in ["a", "bb", "ccc", "dddd"] {
            let offset = heap.add(name).unwrap();
            assert!(offset > last);
            last = offset;
        }
    }

    #[test]
    fn invalid_offset() {
        let heap = StringHeap::new();
        assert!(heap.get(100).is_err());
    }

    #[test]
    fn interior_nul_rejected() {
        let mut heap = StringHeap::new();
        assert!(heap.add("a\0b").is_err());
    }

    #[test]
    fn from_bytes_round_trip() {
        let mut heap = StringHeap::new();
        heap.add("Namespace").unwrap();
        heap.add("Type").unwrap();

        let copy = StringHeap::from_bytes(heap.bytes()).unwrap();
        assert_eq!(copy.get(1).unwrap(), "Namespace");

        assert!(StringHeap::from_bytes(&[]).is_err());
        assert!(StringHeap::from_bytes(&[1, 0]).is_err());
        assert!(StringHeap::from_bytes(&[0, b'x']).is_err());
    }
}

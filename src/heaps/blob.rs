//! Append-only blob pool.
//!
//! Stores opaque byte ranges (signatures, constant values, permission sets)
//! with a compressed length prefix, referenced by byte offset. Offset 0 is
//! the canonical empty blob.

use crate::{
    io::{read_compressed_u32, write_compressed_u32},
    Error, Result,
};

/// The blob pool of one database.
#[derive(Debug, Clone)]
pub struct BlobHeap {
    data: Vec<u8>,
}

impl BlobHeap {
    /// Creates an empty pool containing only the empty blob at offset 0.
    #[must_use]
    pub fn new() -> Self {
        BlobHeap { data: vec![0] }
    }

    /// Adopts an existing pool image.
    ///
    /// # Errors
    /// Returns an error if the image does not start with the mandatory
    /// zero-length blob at offset 0.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Blob pool must start with the empty blob"));
        }

        Ok(BlobHeap {
            data: data.to_vec(),
        })
    }

    /// Appends a blob, returning its offset. The empty blob is always
    /// offset 0 and is never re-added.
    ///
    /// # Errors
    /// Returns an error if the blob exceeds the 29-bit length limit of the
    /// compressed prefix.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }

        let offset = self.data.len() as u32;
        write_compressed_u32(&mut self.data, value.len() as u32)?;
        self.data.extend_from_slice(value);
        Ok(offset)
    }

    /// Reads the blob at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if the offset is out of
    /// bounds or the length prefix runs past the end of the pool.
    pub fn get(&self, offset: u32) -> Result<&[u8]> {
        let index = offset as usize;
        if index >= self.data.len() {
            return Err(Error::InvalidOffset(offset));
        }

        let mut pos = index;
        let len = read_compressed_u32(&self.data, &mut pos)? as usize;
        let Some(end) = pos.checked_add(len) else {
            return Err(Error::InvalidOffset(offset));
        };
        if end > self.data.len() {
            return Err(Error::InvalidOffset(offset));
        }

        Ok(&self.data[pos..end])
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

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut heap = BlobHeap::new();
        let a = heap.add(&[0x41, 0x42, 0x43]).unwrap();
        let b = heap.add(&[0x44]).unwrap();

        assert_eq!(heap.get(a).unwrap(), &[0x41, 0x42, 0x43]);
        assert_eq!(heap.get(b).unwrap(), &[0x44]);
        assert_eq!(heap.get(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn empty_blob_is_offset_zero() {
        let mut heap = BlobHeap::new();
        assert_eq!(heap.add(&[]).unwrap(), 0);
        assert_eq!(heap.size(), 1);
    }

    #[test]
    fn two_byte_length_prefix() {
        let mut heap = BlobHeap::new();
        let long = vec![0xAB; 300];
        let offset = heap.add(&long).unwrap();
        assert_eq!(heap.get(offset).unwrap(), long.as_slice());
    }

    #[test]
    fn invalid_offset() {
        let heap = BlobHeap::new();
        assert!(heap.get(5).is_err());
    }

    #[test]
    fn truncated_blob_rejected() {
        // Claims 5 bytes, has 3
        let heap = BlobHeap::from_bytes(&[0x00, 0x05, 0x41, 0x42, 0x43]).unwrap();
        assert!(heap.get(1).is_err());
    }

    #[test]
    fn from_bytes_validation() {
        assert!(BlobHeap::from_bytes(&[]).is_err());
        assert!(BlobHeap::from_bytes(&[0x01, 0x41]).is_err());
    }
}

//! Append-only GUID pool.
//!
//! Fixed 16-byte slots referenced by 1-based index; index 0 means "no GUID".

use uguid::Guid;

use crate::{Error, Result};

/// The GUID pool of one database.
#[derive(Debug, Clone, Default)]
pub struct GuidHeap {
    data: Vec<u8>,
}

impl GuidHeap {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        GuidHeap { data: Vec::new() }
    }

    /// Adopts an existing pool image.
    ///
    /// # Errors
    /// Returns an error if the image is not a whole number of 16-byte slots.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "GUID pool size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(GuidHeap {
            data: data.to_vec(),
        })
    }

    /// Appends a GUID, returning its 1-based index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, guid: &Guid) -> u32 {
        self.data.extend_from_slice(&guid.to_bytes());
        (self.data.len() / 16) as u32
    }

    /// Reads the GUID at 1-based `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if the index is 0 or past the
    /// end of the pool.
    pub fn get(&self, index: u32) -> Result<Guid> {
        if index == 0 {
            return Err(Error::InvalidOffset(index));
        }

        let start = (index as usize - 1) * 16;
        let Some(slot) = self.data.get(start..start + 16) else {
            return Err(Error::InvalidOffset(index));
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(slot);
        Ok(Guid::from_bytes(bytes))
    }

    /// Number of GUIDs in the pool.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn count(&self) -> u32 {
        (self.data.len() / 16) as u32
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

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::guid;

    #[test]
    fn add_and_get() {
        let mut heap = GuidHeap::new();
        let first = guid!("01020304-0506-0708-090a-0b0c0d0e0f10");
        let second = guid!("11121314-1516-1718-191a-1b1c1d1e1f20");

        assert_eq!(heap.add(&first), 1);
        assert_eq!(heap.add(&second), 2);
        assert_eq!(heap.get(1).unwrap(), first);
        assert_eq!(heap.get(2).unwrap(), second);
        assert_eq!(heap.count(), 2);
    }

    #[test]
    fn slot_zero_is_unused() {
        let heap = GuidHeap::new();
        assert!(heap.get(0).is_err());
        assert!(heap.get(1).is_err());
    }

    #[test]
    fn from_bytes_validation() {
        assert!(GuidHeap::from_bytes(&[0u8; 15]).is_err());
        let heap = GuidHeap::from_bytes(&[0u8; 32]).unwrap();
        assert_eq!(heap.count(), 2);
    }
}

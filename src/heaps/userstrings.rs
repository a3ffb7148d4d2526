//! Append-only user-string pool.
//!
//! User strings are UTF-16 literals referenced only by the executable
//! payload, never by table rows. Each entry is a compressed byte-length
//! prefix, the UTF-16LE code units, and one terminal flag byte that marks
//! strings containing characters beyond simple ASCII. The pool supports
//! forward iteration so a consumer can walk every entry without a table of
//! contents, which is exactly what the merge engine's string pass does.

use widestring::Utf16String;

use crate::{
    io::{read_compressed_u32, write_compressed_u32},
    Error, Result,
};

/// The user-string pool of one database.
#[derive(Debug, Clone)]
pub struct UserStringHeap {
    data: Vec<u8>,
}

impl UserStringHeap {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        UserStringHeap { data: vec![0] }
    }

    /// Adopts an existing pool image.
    ///
    /// # Errors
    /// Returns an error if the image does not start with the mandatory
    /// leading zero entry.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("User-string pool must start with 0"));
        }

        Ok(UserStringHeap {
            data: data.to_vec(),
        })
    }

    /// Appends a raw entry payload (UTF-16LE bytes plus terminal flag
    /// byte), returning its index. Used when copying entries between pools.
    ///
    /// # Errors
    /// Returns an error if the payload is empty or has an even length,
    /// which cannot be code units plus a flag byte.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_raw(&mut self, payload: &[u8]) -> Result<u32> {
        if payload.is_empty() || payload.len() % 2 == 0 {
            return Err(malformed_error!(
                "User-string payload length {} is not 2n+1",
                payload.len()
            ));
        }

        let index = self.data.len() as u32;
        write_compressed_u32(&mut self.data, payload.len() as u32)?;
        self.data.extend_from_slice(payload);
        Ok(index)
    }

    /// Appends a string, returning its index.
    ///
    /// # Errors
    /// Returns an error if the encoded entry exceeds the length prefix limit.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        let wide = Utf16String::from_str(value);
        let mut payload = Vec::with_capacity(wide.len() * 2 + 1);
        let mut special = false;

        for unit in wide.code_units() {
            payload.extend_from_slice(&unit.to_le_bytes());
            special |= Self::is_special_unit(unit);
        }
        payload.push(u8::from(special));

        self.add_raw(&payload)
    }

    /// Reads the raw entry at `index`, returning the payload (code units
    /// plus terminal byte) and the index of the following entry. Walking
    /// from index 1 until `next` reaches the pool size visits every entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if the index is out of
    /// bounds or the entry runs past the end of the pool.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_raw(&self, index: u32) -> Result<(&[u8], u32)> {
        let start = index as usize;
        if start == 0 || start >= self.data.len() {
            return Err(Error::InvalidOffset(index));
        }

        let mut pos = start;
        let len = read_compressed_u32(&self.data, &mut pos)? as usize;
        let Some(end) = pos.checked_add(len) else {
            return Err(Error::InvalidOffset(index));
        };
        if end > self.data.len() {
            return Err(Error::InvalidOffset(index));
        }

        Ok((&self.data[pos..end], end as u32))
    }

    /// Decodes the string at `index`.
    ///
    /// # Errors
    /// Returns an error if the index is invalid or the payload is not a
    /// valid entry.
    pub fn get(&self, index: u32) -> Result<Utf16String> {
        let (payload, _) = self.get_raw(index)?;
        if payload.len() % 2 == 0 {
            return Err(malformed_error!("User-string entry {} is malformed", index));
        }

        let units: Vec<u16> = payload[..payload.len() - 1]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Utf16String::from_vec(units)
            .map_err(|_| malformed_error!("User-string entry {} is not valid UTF-16", index))
    }

    /// Iterates all entries as `(index, payload)` pairs in storage order.
    pub fn iter_raw(&self) -> impl Iterator<Item = Result<(u32, &[u8])>> + '_ {
        let mut index = if self.data.len() > 1 { 1u32 } else { 0 };
        std::iter::from_fn(move || {
            if index == 0 || index as usize >= self.data.len() {
                return None;
            }

            match self.get_raw(index) {
                Ok((payload, next)) => {
                    let current = index;
                    index = next;
                    Some(Ok((current, payload)))
                }
                Err(error) => {
                    index = 0;
                    Some(Err(error))
                }
            }
        })
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

    /// The terminal flag byte marks entries whose characters need more than
    /// trivial handling downstream: control characters, a few punctuation
    /// marks the loader treats specially, and anything beyond ASCII.
    fn is_special_unit(unit: u16) -> bool {
        matches!(unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F) || unit >= 0x80
    }
}

impl Default for UserStringHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut heap = UserStringHeap::new();
        let hello = heap.add("Hello").unwrap();
        let unicode = heap.add("héllo").unwrap();

        assert_eq!(heap.get(hello).unwrap().to_string(), "Hello");
        assert_eq!(heap.get(unicode).unwrap().to_string(), "héllo");
    }

    #[test]
    fn terminal_byte_flags_special_chars() {
        let mut heap = UserStringHeap::new();
        let plain = heap.add("abc").unwrap();
        let special = heap.add("héllo").unwrap();
        let dash = heap.add("a-b").unwrap();

        assert_eq!(heap.get_raw(plain).unwrap().0.last(), Some(&0));
        assert_eq!(heap.get_raw(special).unwrap().0.last(), Some(&1));
        assert_eq!(heap.get_raw(dash).unwrap().0.last(), Some(&1));
    }

    #[test]
    fn forward_iteration_visits_all() {
        let mut heap = UserStringHeap::new();
        let expected = ["one", "two", "three"];
        for value in expected {
            heap.add(value).unwrap();
        }

        let entries: Vec<_> = heap
            .iter_raw()
            .map(|entry| entry.unwrap())
            .map(|(index, _)| heap.get(index).unwrap().to_string())
            .collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn raw_round_trip_between_pools() {
        let mut source = UserStringHeap::new();
        source.add("payload").unwrap();

        let mut target = UserStringHeap::new();
        for entry in source.iter_raw() {
            let (_, payload) = entry.unwrap();
            let index = target.add_raw(payload).unwrap();
            assert_eq!(target.get(index).unwrap().to_string(), "payload");
        }
    }

    #[test]
    fn unpaired_surrogate_rejected() {
        let mut heap = UserStringHeap::new();
        // A lone high surrogate (0xD800) plus the flag byte
        let index = heap.add_raw(&[0x00, 0xD8, 0x01]).unwrap();

        assert!(heap.get(index).is_err());
        // The raw view stays readable so pool-to-pool copies keep working
        assert_eq!(heap.get_raw(index).unwrap().0, &[0x00, 0xD8, 0x01]);
    }

    #[test]
    fn invalid_access() {
        let heap = UserStringHeap::new();
        assert!(heap.get_raw(0).is_err());
        assert!(heap.get_raw(10).is_err());

        let mut heap = UserStringHeap::new();
        assert!(heap.add_raw(&[0x41, 0x00]).is_err());
    }
}

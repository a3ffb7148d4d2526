//! Bounds-checked little-endian reading and writing over byte buffers.
//!
//! Every table record and the schema header are plain little-endian byte
//! runs; these helpers keep all the bounds checks in one place so the
//! decoders never index a slice directly. Column widths that depend on heap
//! or table sizes go through the `_dyn` variants, which switch between
//! 2 and 4 bytes at runtime.

use crate::{Error::OutOfBounds, Result};

/// Types which can be read from / written to a little-endian byte buffer.
pub trait LeIo: Sized + Copy {
    /// Size of the value in bytes
    const SIZE: usize;

    /// Read a value from the start of `data`, without bounds checking.
    fn from_le(data: &[u8]) -> Self;

    /// Write the value to the start of `data`, without bounds checking.
    fn to_le(self, data: &mut [u8]);
}

macro_rules! impl_le_io {
    ($($t:ty),*) => {
        $(impl LeIo for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_le(data: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&data[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }

            fn to_le(self, data: &mut [u8]) {
                data[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

impl_le_io!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Read a `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: LeIo>(data: &[u8]) -> Result<T> {
    if data.len() < T::SIZE {
        return Err(OutOfBounds);
    }

    Ok(T::from_le(data))
}

/// Read a `T` at `*offset`, advancing the offset past the value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of `data`.
pub fn read_le_at<T: LeIo>(data: &[u8], offset: &mut usize) -> Result<T> {
    let Some(end) = offset.checked_add(T::SIZE) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let value = T::from_le(&data[*offset..]);
    *offset = end;
    Ok(value)
}

/// Read a 2- or 4-byte unsigned value at `*offset`, widened to `u32`.
///
/// Dynamic-width columns (RIDs, coded tokens, heap offsets) use this; the
/// caller decides the width from the schema context.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Write a `T` at `*offset`, advancing the offset past the value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would pass the end of `data`.
pub fn write_le_at<T: LeIo>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let Some(end) = offset.checked_add(T::SIZE) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    value.to_le(&mut data[*offset..]);
    *offset = end;
    Ok(())
}

/// Write a `u32` as 2 or 4 bytes at `*offset`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would pass the end of
/// `data`, or if a value above `u16::MAX` is written into a narrow column.
#[allow(clippy::cast_possible_truncation)]
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)
    } else {
        if value > u32::from(u16::MAX) {
            return Err(OutOfBounds);
        }
        write_le_at::<u16>(data, offset, value as u16)
    }
}

/// Read a compressed unsigned integer (the 1/2/4-byte length prefix format
/// used by the blob and user-string heaps) at `*offset`.
///
/// * `0bbbbbbb` - one byte, 7-bit value
/// * `10bbbbbb x` - two bytes, 14-bit value
/// * `110bbbbb x y z` - four bytes, 29-bit value
///
/// # Errors
/// Returns an error if the buffer ends inside the value or the leading
/// byte is not a valid prefix.
pub fn read_compressed_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    let first = read_le_at::<u8>(data, offset)?;
    if first & 0x80 == 0 {
        return Ok(u32::from(first));
    }

    if first & 0xC0 == 0x80 {
        let second = read_le_at::<u8>(data, offset)?;
        return Ok((u32::from(first & 0x3F) << 8) | u32::from(second));
    }

    if first & 0xE0 == 0xC0 {
        let b1 = read_le_at::<u8>(data, offset)?;
        let b2 = read_le_at::<u8>(data, offset)?;
        let b3 = read_le_at::<u8>(data, offset)?;
        return Ok((u32::from(first & 0x1F) << 24)
            | (u32::from(b1) << 16)
            | (u32::from(b2) << 8)
            | u32::from(b3));
    }

    Err(malformed_error!(
        "Invalid compressed integer prefix - 0x{:02x}",
        first
    ))
}

/// Append a compressed unsigned integer to `out`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `value` exceeds the 29-bit
/// maximum of the encoding.
#[allow(clippy::cast_possible_truncation)]
pub fn write_compressed_u32(out: &mut Vec<u8>, value: u32) -> Result<()> {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.push(0x80 | (value >> 8) as u8);
        out.push((value & 0xFF) as u8);
    } else if value < 0x2000_0000 {
        out.push(0xC0 | (value >> 24) as u8);
        out.push(((value >> 16) & 0xFF) as u8);
        out.push(((value >> 8) & 0xFF) as u8);
        out.push((value & 0xFF) as u8);
    } else {
        return Err(OutOfBounds);
    }
    Ok(())
}

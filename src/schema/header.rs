//! Bit-exact decoding and encoding of the compact schema header.
//!
//! The header describes which tables are present, their row counts, which
//! of them are physically sorted by their key column, and whether heap
//! offsets are 2 or 4 bytes wide. Everything that follows it (the packed
//! records) derives its layout from this header via [`WidthContext`].

use bitflags::bitflags;

use crate::{
    io::{read_le_at, write_le_at},
    schema::{table_definition, ColumnKind, TableId, TABLE_COUNT},
    Error, Result,
};

bitflags! {
    /// Heap-width and auxiliary flags of the schema header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeapFlags: u8 {
        /// String heap offsets are 4 bytes
        const LARGE_STRINGS = 0x01;
        /// GUID heap indexes are 4 bytes
        const LARGE_GUIDS = 0x02;
        /// Blob heap indexes are 4 bytes
        const LARGE_BLOBS = 0x04;
        /// Reserved padding bit
        const PADDING = 0x08;
        /// The database carries only an edit-and-continue delta
        const DELTA_ONLY = 0x20;
        /// A trailing u32 of extra data follows the row counts
        const EXTRA_DATA = 0x40;
        /// Logically deleted rows are marked with the `_Deleted` name
        const HAS_DELETE = 0x80;
    }
}

/// Decoded schema header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Major version; 1 and 2 are supported
    pub major: u8,
    /// Minor version, carried through unchanged
    pub minor: u8,
    /// Heap width and auxiliary flags
    pub heap_flags: HeapFlags,
    /// Log2 of the largest valid RID, informational
    pub rid_log2: u8,
    /// Bitmask of present tables
    pub valid: u64,
    /// Bitmask of tables physically sorted by their key column
    pub sorted: u64,
    /// Row count per table; zero for absent tables
    pub row_counts: [u32; TABLE_COUNT],
    /// Extra trailing word, present when [`HeapFlags::EXTRA_DATA`] is set
    pub extra: Option<u32>,
}

impl Schema {
    /// Bitmask covering every table kind the catalog knows.
    const KNOWN_TABLES: u64 = (1 << TABLE_COUNT) - 1;

    /// Decodes a schema header from the start of `data`.
    ///
    /// Returns the header and the number of bytes consumed; the packed
    /// records start right after.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedVersion`] for a major version other
    /// than 1 or 2, and a malformed error if the reserved word is non-zero,
    /// the valid bitmask names unknown tables, or the buffer is truncated.
    pub fn decode(data: &[u8]) -> Result<(Schema, usize)> {
        let mut offset = 0;

        let reserved = read_le_at::<u32>(data, &mut offset)?;
        if reserved != 0 {
            return Err(malformed_error!(
                "Reserved schema field is non-zero - 0x{:08x}",
                reserved
            ));
        }

        let major = read_le_at::<u8>(data, &mut offset)?;
        if major != 1 && major != 2 {
            return Err(Error::UnsupportedVersion(major));
        }
        let minor = read_le_at::<u8>(data, &mut offset)?;
        let heap_flags = HeapFlags::from_bits_retain(read_le_at::<u8>(data, &mut offset)?);
        let rid_log2 = read_le_at::<u8>(data, &mut offset)?;

        let valid = read_le_at::<u64>(data, &mut offset)?;
        if valid & !Self::KNOWN_TABLES != 0 {
            return Err(malformed_error!(
                "Valid bitmask names unknown tables - 0x{:016x}",
                valid
            ));
        }
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        let mut row_counts = [0u32; TABLE_COUNT];
        for (index, count) in row_counts.iter_mut().enumerate() {
            if valid & (1 << index) == 0 {
                continue;
            }

            let id = TableId::from_tag(index as u8)
                .ok_or_else(|| malformed_error!("Valid bit {} has no table", index))?;
            if table_definition(major, id).is_none() {
                return Err(malformed_error!(
                    "Table {:?} does not exist in schema v{}",
                    id,
                    major
                ));
            }

            *count = read_le_at::<u32>(data, &mut offset)?;
        }

        let extra = if heap_flags.contains(HeapFlags::EXTRA_DATA) {
            Some(read_le_at::<u32>(data, &mut offset)?)
        } else {
            None
        };

        Ok((
            Schema {
                major,
                minor,
                heap_flags,
                rid_log2,
                valid,
                sorted,
                row_counts,
                extra,
            },
            offset,
        ))
    }

    /// Encodes the header back to bytes, bit-exact with what [`Schema::decode`]
    /// accepts.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.encoded_size()];
        let mut offset = 0;

        // The buffer is sized above; none of these writes can fail
        let _ = write_le_at::<u32>(&mut out, &mut offset, 0);
        let _ = write_le_at::<u8>(&mut out, &mut offset, self.major);
        let _ = write_le_at::<u8>(&mut out, &mut offset, self.minor);
        let _ = write_le_at::<u8>(&mut out, &mut offset, self.heap_flags.bits());
        let _ = write_le_at::<u8>(&mut out, &mut offset, self.rid_log2);
        let _ = write_le_at::<u64>(&mut out, &mut offset, self.valid);
        let _ = write_le_at::<u64>(&mut out, &mut offset, self.sorted);

        for (index, count) in self.row_counts.iter().enumerate() {
            if self.valid & (1 << index) != 0 {
                let _ = write_le_at::<u32>(&mut out, &mut offset, *count);
            }
        }

        if let Some(extra) = self.extra {
            let _ = write_le_at::<u32>(&mut out, &mut offset, extra);
        }

        out
    }

    fn encoded_size(&self) -> usize {
        24 + self.valid.count_ones() as usize * 4 + if self.extra.is_some() { 4 } else { 0 }
    }
}

/// Per-instance column width context: decides, from row counts and heap
/// flags, whether each dynamic column is 2 or 4 bytes on disk.
#[derive(Debug, Clone, Copy)]
pub struct WidthContext {
    /// Row count per table
    pub row_counts: [u32; TABLE_COUNT],
    /// Heap width flags
    pub heap_flags: HeapFlags,
}

impl WidthContext {
    /// Threshold above which a plain RID column needs 4 bytes.
    const LARGE_ROWS: u32 = u16::MAX as u32;

    /// Number of bits needed to represent any RID of `table`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rid_bits(&self, table: TableId) -> u8 {
        let rows = self.row_counts[table as usize];
        if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        }
    }

    /// On-disk byte width of one column.
    #[must_use]
    pub fn disk_width(&self, kind: ColumnKind) -> usize {
        match kind {
            ColumnKind::U8 => 1,
            ColumnKind::U16 => 2,
            ColumnKind::U32 => 4,
            ColumnKind::Rid(table) => {
                if self.row_counts[table as usize] > Self::LARGE_ROWS {
                    4
                } else {
                    2
                }
            }
            ColumnKind::Coded(coded) => {
                let max_rid_bits = coded
                    .tables()
                    .iter()
                    .map(|table| self.rid_bits(*table))
                    .max()
                    .unwrap_or(1);
                if max_rid_bits + coded.tag_bits() > 16 {
                    4
                } else {
                    2
                }
            }
            ColumnKind::StringIdx => {
                if self.heap_flags.contains(HeapFlags::LARGE_STRINGS) {
                    4
                } else {
                    2
                }
            }
            ColumnKind::GuidIdx => {
                if self.heap_flags.contains(HeapFlags::LARGE_GUIDS) {
                    4
                } else {
                    2
                }
            }
            ColumnKind::BlobIdx => {
                if self.heap_flags.contains(HeapFlags::LARGE_BLOBS) {
                    4
                } else {
                    2
                }
            }
        }
    }

    /// On-disk byte size of one record of `table` under this context.
    #[must_use]
    pub fn disk_record_size(&self, major: u8, table: TableId) -> usize {
        table_definition(major, table).map_or(0, |def| {
            def.columns
                .iter()
                .map(|column| self.disk_width(column.kind))
                .sum()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CodedTokenKind;

    fn sample_schema() -> Schema {
        let mut row_counts = [0u32; TABLE_COUNT];
        row_counts[TableId::Module as usize] = 1;
        row_counts[TableId::TypeDef as usize] = 3;
        row_counts[TableId::MethodDef as usize] = 7;

        Schema {
            major: 2,
            minor: 0,
            heap_flags: HeapFlags::empty(),
            rid_log2: 3,
            valid: (1 << TableId::Module as u64)
                | (1 << TableId::TypeDef as u64)
                | (1 << TableId::MethodDef as u64),
            sorted: 0,
            row_counts,
            extra: None,
        }
    }

    #[test]
    fn round_trip() {
        let schema = sample_schema();
        let bytes = schema.encode();
        let (decoded, consumed) = Schema::decode(&bytes).unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn round_trip_with_extra_data() {
        let mut schema = sample_schema();
        schema.heap_flags |= HeapFlags::EXTRA_DATA;
        schema.extra = Some(0xDEAD_BEEF);

        let bytes = schema.encode();
        let (decoded, consumed) = Schema::decode(&bytes).unwrap();
        assert_eq!(decoded.extra, Some(0xDEAD_BEEF));
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn rejects_reserved_and_version() {
        let mut bytes = sample_schema().encode();
        bytes[0] = 1;
        assert!(Schema::decode(&bytes).is_err());

        let mut bytes = sample_schema().encode();
        bytes[4] = 9;
        assert!(matches!(
            Schema::decode(&bytes),
            Err(Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_unknown_table_bits() {
        let mut schema = sample_schema();
        schema.valid |= 1 << 60;
        let bytes = schema.encode();
        assert!(Schema::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_generics_tables_in_v1() {
        let mut schema = sample_schema();
        schema.major = 1;
        schema.valid |= 1 << TableId::GenericParam as u64;
        schema.row_counts[TableId::GenericParam as usize] = 1;
        let bytes = schema.encode();
        assert!(Schema::decode(&bytes).is_err());
    }

    #[test]
    fn truncated_header() {
        let bytes = sample_schema().encode();
        assert!(Schema::decode(&bytes[..20]).is_err());
        assert!(Schema::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn widths_follow_row_counts() {
        let mut ctx = WidthContext {
            row_counts: [0; TABLE_COUNT],
            heap_flags: HeapFlags::empty(),
        };
        assert_eq!(ctx.disk_width(ColumnKind::Rid(TableId::Field)), 2);

        ctx.row_counts[TableId::Field as usize] = 0x1_0000;
        assert_eq!(ctx.disk_width(ColumnKind::Rid(TableId::Field)), 4);

        // TypeDefOrRef has 2 tag bits: > 14 bits of rid forces 4 bytes
        ctx.row_counts[TableId::TypeDef as usize] = 0x4000;
        assert_eq!(
            ctx.disk_width(ColumnKind::Coded(CodedTokenKind::TypeDefOrRef)),
            4
        );

        ctx.heap_flags = HeapFlags::LARGE_STRINGS;
        assert_eq!(ctx.disk_width(ColumnKind::StringIdx), 4);
        assert_eq!(ctx.disk_width(ColumnKind::BlobIdx), 2);
    }
}

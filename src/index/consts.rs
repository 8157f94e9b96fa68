// Binary accession index layout. All words are big-endian.
//
//   0   magic         4 bytes
//   4   version       i32
//   8   count         i32
//   12  table offset  u64
//   20  records       key_len i32 | key bytes | class id i32, ascending key order
//   ..  offset table  count x u64, absolute offset of each record
pub const MAGIC: &[u8; 4] = b"TXMI";
pub const VERSION: i32 = 1;
pub const HEADER_LEN: u64 = 20;
pub const OFFSET_WIDTH: u64 = 8;

pub mod fp {
    pub const RECORDS_SPILL_SUFFIX: &str = "chunk";
    pub const OFFSETS_SPILL_SUFFIX: &str = "offsets";
}

/// Rough number of bytes one accession map line takes, used to pre-size
/// in-memory tables from the input file length.
pub const EST_BYTES_PER_LINE: u64 = 20;

/// Rows held in memory per sorted chunk before spilling to disk.
pub const DEFAULT_CHUNK_ENTRIES: usize = 1 << 22;

//! Read-only, byte addressable views over binary files.
//!
//! Two interchangeable strategies are provided:
//!
//! * [`MappedByteStore`] maps the whole file. Reads are plain memory copies
//!   and any number of threads may read at once, at the cost of address space.
//! * [`SeekByteStore`] keeps a single file handle. Every logical read (seek
//!   followed by read) runs under one lock, so concurrent readers queue up on
//!   it. Memory stays bounded no matter how large the file is.
//!
//! Both report identical bytes for identical offsets. Which one to use is the
//! caller's call, see [`StoreKind`].
//!
//! Offsets past [`ByteStore::limit`] never return stale data: single byte
//! reads fail with `InvalidInput`, bulk reads come back short.
use std::io::{Error, ErrorKind, Result};
use std::path::Path;

use crate::config::{StoreConfig, StoreKind};

mod mapped;
mod seek;


pub use mapped::MappedByteStore;
pub use seek::SeekByteStore;

pub trait ByteStore: Send + Sync {
    /// Read the byte at `offset`. Requires `offset < limit()`.
    fn read_byte(&self, offset: u64) -> Result<u8>;

    /// Fill `buf` starting at `offset`. Returns the number of bytes read,
    /// which is short only when the end of the store is reached.
    fn read_bulk(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly four bytes at `offset` as a big-endian `i32`.
    fn read_i32_be(&self, offset: u64) -> Result<i32> {
        let mut word = [0u8; 4];
        let n = self.read_bulk(offset, &mut word)?;
        if n < word.len() {
            return Err(short_int_read(offset, n));
        }
        Ok(i32::from_be_bytes(word))
    }

    /// Total addressable length, fixed when the store was opened.
    fn limit(&self) -> u64;

    /// Release the underlying resource. Consumes the store so it cannot be
    /// used afterwards.
    fn close(self)
    where
        Self: Sized;
}

/// Store selected at runtime from a [`StoreConfig`].
#[derive(Debug)]
pub enum AnyByteStore {
    Mapped(MappedByteStore),
    Seek(SeekByteStore),
}

pub fn open_store<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<AnyByteStore> {
    let store = match config.kind {
        StoreKind::Mapped => AnyByteStore::Mapped(MappedByteStore::open(path)?),
        StoreKind::Seek => AnyByteStore::Seek(SeekByteStore::open(path)?),
    };
    Ok(store)
}

impl ByteStore for AnyByteStore {
    fn read_byte(&self, offset: u64) -> Result<u8> {
        match self {
            Self::Mapped(s) => s.read_byte(offset),
            Self::Seek(s) => s.read_byte(offset),
        }
    }

    fn read_bulk(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Mapped(s) => s.read_bulk(offset, buf),
            Self::Seek(s) => s.read_bulk(offset, buf),
        }
    }

    fn read_i32_be(&self, offset: u64) -> Result<i32> {
        match self {
            Self::Mapped(s) => s.read_i32_be(offset),
            Self::Seek(s) => s.read_i32_be(offset),
        }
    }

    fn limit(&self) -> u64 {
        match self {
            Self::Mapped(s) => s.limit(),
            Self::Seek(s) => s.limit(),
        }
    }

    fn close(self) {
        match self {
            Self::Mapped(s) => s.close(),
            Self::Seek(s) => s.close(),
        }
    }
}

impl AnyByteStore {
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Mapped(_) => StoreKind::Mapped,
            Self::Seek(_) => StoreKind::Seek,
        }
    }
}

/******************************************************************************/
// Helpers shared by both strategies
/******************************************************************************/
fn out_of_range(offset: u64, limit: u64) -> Error {
    let msg = format!("offset {} out of range for store of {} bytes", offset, limit);
    Error::new(ErrorKind::InvalidInput, msg)
}

fn short_int_read(offset: u64, n: usize) -> Error {
    let msg = format!("only {} of 4 bytes available at offset {}", n, offset);
    Error::new(ErrorKind::UnexpectedEof, msg)
}

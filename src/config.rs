use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/******************************************************************************/
// StoreConfig (stored as json)
//
// Tunables consulted when a backing store is opened. Values are copied
// into the store at open time, so changing a config afterwards never
// affects stores that are already open.
/******************************************************************************/

/// Rough on-disk footprint of one cached lookup, used to turn a cache size
/// given in KiB into an entry count.
pub const CACHED_ENTRY_BYTES: u64 = 64;

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum StoreKind {
    /// Memory mapped file. Fast, lock free, uses address space.
    #[serde(rename = "mapped")]
    #[default]
    Mapped,
    /// One shared file handle, every read serialized behind a lock.
    /// Bounded memory, contention under concurrent lookups.
    #[serde(rename = "seek")]
    Seek,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum CacheSize {
    Disabled,
    Entries(u64),
    KiB(u64),
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Positive values count entries, negative values request |n| KiB,
    /// zero disables caching.
    pub cache_size: i64,

    /// Stage temporary data in memory instead of a scratch file on disk.
    pub temp_store_in_memory: bool,
}

impl CacheSize {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::Disabled,
            n if n > 0 => Self::Entries(n as u64),
            n => Self::KiB(n.unsigned_abs()),
        }
    }

    /// Number of cache entries this size allows for.
    pub fn num_entries(&self) -> usize {
        match *self {
            Self::Disabled => 0,
            Self::Entries(n) => n as usize,
            Self::KiB(kib) => ((kib * 1024) / CACHED_ENTRY_BYTES) as usize,
        }
    }
}

impl StoreConfig {
    pub fn with_kind(kind: StoreKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn cache_size(&self) -> CacheSize {
        CacheSize::from_raw(self.cache_size)
    }

    pub fn load<P: AsRef<Path>>(p: P) -> std::io::Result<Self> {
        let p = p.as_ref();
        debug!("Loading StoreConfig from: {:?}", &p);
        let f = File::open(p)?;
        let r = BufReader::new(f);
        let config = serde_json::from_reader(r)?;
        Ok(config)
    }
}

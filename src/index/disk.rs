use std::cmp::Ordering;
use std::io;
use std::path::Path;

use log::{debug, info};
use lru::LruCache;
use parking_lot::Mutex;

use super::consts::{HEADER_LEN, MAGIC, OFFSET_WIDTH, VERSION};
use super::{AccessionMap, ClassId};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{open_store, AnyByteStore, ByteStore};

/// Accession index answered straight from a binary index file.
///
/// Lookups binary search the offset table through a [`ByteStore`], so the
/// table never has to fit in memory. An optional LRU cache remembers recent
/// answers (hits and misses alike).
pub struct DiskAccessionIndex<S: ByteStore> {
    store: S,
    count: usize,
    table_offset: u64,
    cache: Option<Mutex<LruCache<String, Option<ClassId>>>>,
}

impl DiskAccessionIndex<AnyByteStore> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        let store = open_store(path, config)?;
        let index = Self::from_store(store, config.cache_size().num_entries())?;
        info!(
            "Opened {:?} ({:?} store): {} accessions",
            path,
            config.kind,
            index.size()
        );
        Ok(index)
    }
}

impl<S: ByteStore> DiskAccessionIndex<S> {
    /// Validate the header of `store` and wrap it. A `cache_entries` of 0
    /// disables the lookup cache.
    pub fn from_store(store: S, cache_entries: usize) -> Result<Self> {
        let limit = store.limit();
        if limit < HEADER_LEN {
            return Err(Error::Format(format!(
                "{} bytes is shorter than the header",
                limit
            )));
        }

        let mut magic = [0u8; 4];
        store.read_bulk(0, &mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Format(format!("bad magic {:?}", magic)));
        }
        let version = store.read_i32_be(4)?;
        if version != VERSION {
            return Err(Error::Format(format!("unsupported version {}", version)));
        }
        let count = store.read_i32_be(8)?;
        if count < 0 {
            return Err(Error::Format(format!("negative entry count {}", count)));
        }
        let count = count as usize;
        let table_offset = read_u64_be(&store, 12)?;
        let table_end = table_offset.checked_add(count as u64 * OFFSET_WIDTH);
        if table_offset < HEADER_LEN || table_end.map_or(true, |end| end > limit) {
            return Err(Error::Format(format!(
                "offset table at {} with {} entries exceeds {} bytes",
                table_offset, count, limit
            )));
        }

        let cache = if cache_entries > 0 {
            debug!("Caching up to {} lookups", cache_entries);
            Some(Mutex::new(LruCache::new(cache_entries)))
        } else {
            None
        };

        Ok(Self {
            store,
            count,
            table_offset,
            cache,
        })
    }

    /// Class id of `accession`, `None` if the index has no entry for it.
    pub fn get(&self, accession: &str) -> io::Result<Option<ClassId>> {
        if let Some(cache) = &self.cache {
            let key = accession.to_string();
            if let Some(hit) = cache.lock().get(&key) {
                return Ok(*hit);
            }
            let found = self.search(accession.as_bytes())?;
            cache.lock().put(key, found);
            Ok(found)
        } else {
            self.search(accession.as_bytes())
        }
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn close(self) {
        self.store.close()
    }

    fn search(&self, key: &[u8]) -> io::Result<Option<ClassId>> {
        let mut lo = 0;
        let mut hi = self.count;
        let mut buf = Vec::with_capacity(key.len() + 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let rec = self.record_offset(mid)?;
            match self.compare_key(rec, key, &mut buf)? {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let id_offset = rec + 4 + key.len() as u64;
                    return Ok(Some(self.store.read_i32_be(id_offset)?));
                }
            }
        }
        Ok(None)
    }

    fn record_offset(&self, i: usize) -> io::Result<u64> {
        read_u64_be(&self.store, self.table_offset + i as u64 * OFFSET_WIDTH)
    }

    // Orders the key stored at `rec` against `key`.
    fn compare_key(&self, rec: u64, key: &[u8], buf: &mut Vec<u8>) -> io::Result<Ordering> {
        let len = self.store.read_i32_be(rec)?;
        if len < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative key length at offset {}", rec),
            ));
        }
        buf.clear();
        buf.resize(len as usize, 0);
        let n = self.store.read_bulk(rec + 4, buf)?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated key at offset {}", rec),
            ));
        }
        Ok(buf.as_slice().cmp(key))
    }
}

impl<S: ByteStore> AccessionMap for DiskAccessionIndex<S> {
    fn lookup(&self, accession: &str) -> io::Result<Option<ClassId>> {
        self.get(accession)
    }

    fn size(&self) -> usize {
        self.count
    }
}

fn read_u64_be<S: ByteStore>(store: &S, offset: u64) -> io::Result<u64> {
    let hi = store.read_i32_be(offset)? as u32 as u64;
    let lo = store.read_i32_be(offset + 4)? as u32 as u64;
    Ok((hi << 32) | lo)
}

use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::Result;
use std::path::{Path, PathBuf};

use super::{out_of_range, short_int_read, ByteStore};

#[derive(Debug)]
pub struct MappedByteStore {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedByteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only. Index files are written once and
        // never modified while a store is open on them.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!("Mapped {} bytes from {:?}", mmap.len(), path);
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

}

impl ByteStore for MappedByteStore {
    fn read_byte(&self, offset: u64) -> Result<u8> {
        if offset >= self.limit() {
            return Err(out_of_range(offset, self.limit()));
        }
        Ok(self.mmap[offset as usize])
    }

    fn read_bulk(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.limit() {
            return Ok(0);
        }
        let start = offset as usize;
        let n = usize::min(buf.len(), self.mmap.len() - start);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        Ok(n)
    }

    fn read_i32_be(&self, offset: u64) -> Result<i32> {
        let avail = self.limit().saturating_sub(offset);
        if avail < 4 {
            return Err(short_int_read(offset, avail as usize));
        }
        let start = offset as usize;
        Ok(crate::io::i32_from_be_slice(&self.mmap[start..start + 4]))
    }

    fn limit(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn close(self) {
        debug!("Unmapping {:?}", self.path);
        drop(self.mmap);
    }
}

use log::debug;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{ErrorKind, Read, Result, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{out_of_range, short_int_read, ByteStore};
use crate::io::ReadFrom;

// All reads go through one handle. Holding the lock across seek + read keeps
// another thread from moving the cursor in between.
#[derive(Debug)]
pub struct SeekByteStore {
    path: PathBuf,
    file: Mutex<File>,
    limit: u64,
}

impl SeekByteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let limit = file.metadata()?.len();
        debug!("Opened {:?} for seek reads ({} bytes)", path, limit);
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            limit,
        })
    }
}

// Read until `buf` is full or the file ends.
fn read_fully(f: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match f.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl ByteStore for SeekByteStore {
    fn read_byte(&self, offset: u64) -> Result<u8> {
        if offset >= self.limit {
            return Err(out_of_range(offset, self.limit));
        }
        let mut byte = [0u8; 1];
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        f.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_bulk(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.limit {
            return Ok(0);
        }
        // never read past the length recorded at open time
        let n = usize::min(buf.len(), (self.limit - offset) as usize);
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        read_fully(&mut f, &mut buf[..n])
    }

    fn read_i32_be(&self, offset: u64) -> Result<i32> {
        let avail = self.limit.saturating_sub(offset);
        if avail < 4 {
            return Err(short_int_read(offset, avail as usize));
        }
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        i32::read_from(&mut *f)
    }

    fn limit(&self) -> u64 {
        self.limit
    }

    fn close(self) {
        // std closes the handle on drop and swallows close(2) errors, which
        // is the behavior we want: nothing escapes past close.
        drop(self.file.into_inner());
        debug!("Closed {:?}", self.path);
    }
}

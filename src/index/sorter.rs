// Sorting of accession rows for the binary index writer.
//
// Rows arrive in file order and leave in ascending key order with one row per
// key, the row read last winning. The in-memory sorter keeps everything in a
// hash table; the external sorter spills sorted chunks next to the output and
// merges them, so the build never holds more than one chunk in memory.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::consts::fp;
use super::ClassId;
use crate::io::{ReadFrom, WriteTo};

pub type SortedRows = Box<dyn Iterator<Item = io::Result<(String, ClassId)>>>;

pub enum RowSorter {
    Memory(HashMap<String, ClassId>),
    External(ExternalSorter),
}

impl RowSorter {
    pub fn in_memory() -> Self {
        Self::Memory(HashMap::new())
    }

    pub fn external(output: &Path, chunk_entries: usize) -> Self {
        Self::External(ExternalSorter::new(output, chunk_entries))
    }

    pub fn push(&mut self, accession: &str, id: ClassId) -> io::Result<()> {
        match self {
            Self::Memory(table) => {
                table.insert(accession.to_string(), id);
                Ok(())
            }
            Self::External(sorter) => sorter.push(accession, id),
        }
    }

    pub fn finish(self) -> io::Result<SortedRows> {
        match self {
            Self::Memory(table) => {
                let mut rows: Vec<_> = table.into_iter().collect();
                rows.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
                Ok(Box::new(rows.into_iter().map(Ok)))
            }
            Self::External(sorter) => sorter.finish(),
        }
    }
}

/******************************************************************************/
// External sort
/******************************************************************************/

// Spill file, removed when dropped.
pub(super) struct SpillFile {
    pub(super) path: PathBuf,
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                warn!("Could not remove spill file {:?}: {}", self.path, e)
            }
            _ => {}
        }
    }
}

// (key, sequence number, class id)
type SeqRow = (String, u64, ClassId);

pub struct ExternalSorter {
    prefix: PathBuf,
    chunk_entries: usize,
    buf: Vec<SeqRow>,
    seq: u64,
    chunks: Vec<SpillFile>,
}

impl ExternalSorter {
    fn new(output: &Path, chunk_entries: usize) -> Self {
        Self {
            prefix: output.to_path_buf(),
            chunk_entries: chunk_entries.max(1),
            buf: Vec::new(),
            seq: 0,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, accession: &str, id: ClassId) -> io::Result<()> {
        self.buf.push((accession.to_string(), self.seq, id));
        self.seq += 1;
        if self.buf.len() >= self.chunk_entries {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        let mut rows = std::mem::take(&mut self.buf);
        sort_rows(&mut rows);

        let path = spill_path(&self.prefix, fp::RECORDS_SPILL_SUFFIX, self.chunks.len());
        debug!("Spilling {} rows to {:?}", rows.len(), path);
        let chunk = SpillFile { path };
        let mut w = BufWriter::new(File::create(&chunk.path)?);
        for (key, seq, id) in last_per_key(rows) {
            write_seq_row(&mut w, &key, seq, id)?;
        }
        w.flush()?;
        self.chunks.push(chunk);
        Ok(())
    }

    fn finish(mut self) -> io::Result<SortedRows> {
        if self.chunks.is_empty() {
            let mut rows = std::mem::take(&mut self.buf);
            sort_rows(&mut rows);
            let it = last_per_key(rows).map(|(key, _, id)| Ok((key, id)));
            return Ok(Box::new(it));
        }
        if !self.buf.is_empty() {
            self.spill()?;
        }

        debug!("Merging {} sorted chunks", self.chunks.len());
        let chunks = std::mem::take(&mut self.chunks);
        let mut readers = Vec::with_capacity(chunks.len());
        let mut heap = BinaryHeap::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let mut r = BufReader::new(File::open(&chunk.path)?);
            if let Some((key, seq, id)) = read_seq_row(&mut r)? {
                heap.push(Reverse((key, seq, i, id)));
            }
            readers.push(r);
        }
        Ok(Box::new(MergeIter {
            readers,
            heap,
            _chunks: chunks,
        }))
    }
}

fn sort_rows(rows: &mut [SeqRow]) {
    rows.sort_unstable_by(|a, b| {
        a.0.as_bytes()
            .cmp(b.0.as_bytes())
            .then_with(|| a.1.cmp(&b.1))
    });
}

// Rows must be sorted by (key, seq); keeps the highest seq of every key.
fn last_per_key(rows: Vec<SeqRow>) -> impl Iterator<Item = SeqRow> {
    let mut it = rows.into_iter().peekable();
    std::iter::from_fn(move || {
        let mut row = it.next()?;
        while let Some(next) = it.next_if(|n| n.0 == row.0) {
            row = next;
        }
        Some(row)
    })
}

fn spill_path(prefix: &Path, suffix: &str, n: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{}.{}.tmp", suffix, n));
    PathBuf::from(name)
}

pub(super) fn spill_file_for(prefix: &Path, suffix: &str) -> SpillFile {
    SpillFile {
        path: spill_path(prefix, suffix, 0),
    }
}

fn write_seq_row(w: &mut dyn Write, key: &str, seq: u64, id: ClassId) -> io::Result<()> {
    (key.len() as i32).write_to(w)?;
    w.write_all(key.as_bytes())?;
    seq.write_to(w)?;
    id.write_to(w)
}

fn read_seq_row(r: &mut dyn Read) -> io::Result<Option<SeqRow>> {
    let key_len = match i32::read_from(r) {
        Ok(n) => n as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;
    let key = String::from_utf8(key).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    let seq = u64::read_from(r)?;
    let id = i32::read_from(r)?;
    Ok(Some((key, seq, id)))
}

struct MergeIter {
    readers: Vec<BufReader<File>>,
    heap: BinaryHeap<Reverse<(String, u64, usize, ClassId)>>,
    _chunks: Vec<SpillFile>,
}

impl MergeIter {
    fn refill(&mut self, i: usize) -> io::Result<()> {
        if let Some((key, seq, id)) = read_seq_row(&mut self.readers[i])? {
            self.heap.push(Reverse((key, seq, i, id)));
        }
        Ok(())
    }
}

impl Iterator for MergeIter {
    type Item = io::Result<(String, ClassId)>;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((key, _, i, mut id)) = self.heap.pop()?;
        if let Err(e) = self.refill(i) {
            return Some(Err(e));
        }
        // Equal keys pop in ascending seq order, so the last one popped is
        // the row read last.
        while self.heap.peek().map_or(false, |Reverse(top)| top.0 == key) {
            if let Some(Reverse((_, _, j, later))) = self.heap.pop() {
                id = later;
                if let Err(e) = self.refill(j) {
                    return Some(Err(e));
                }
            }
        }
        Some(Ok((key, id)))
    }
}

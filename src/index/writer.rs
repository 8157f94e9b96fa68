use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Instant;

use log::info;

use super::consts::{fp, DEFAULT_CHUNK_ENTRIES, HEADER_LEN, MAGIC, OFFSET_WIDTH, VERSION};
use super::sorter::{spill_file_for, RowSorter, SortedRows, SpillFile};
use super::{for_each_row, ClassId, LabelResolver};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::io::WriteTo;
use crate::progress::ProgressListener;

/// Builds the binary accession index read by
/// [`DiskAccessionIndex`](super::DiskAccessionIndex).
///
/// With `temp_store_in_memory` the rows are sorted in a hash table;
/// otherwise they go through sorted chunks spilled next to the output file,
/// which bounds memory for maps larger than RAM.
#[derive(Debug, Clone)]
pub struct DiskIndexWriter {
    config: StoreConfig,
    chunk_entries: usize,
}

impl DiskIndexWriter {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            config: *config,
            chunk_entries: DEFAULT_CHUNK_ENTRIES,
        }
    }

    /// Rows per spilled chunk when sorting on disk.
    pub fn with_chunk_entries(mut self, chunk_entries: usize) -> Self {
        self.chunk_entries = chunk_entries;
        self
    }

    /// Convert an accession map file into a binary index at `output`.
    /// Returns the number of distinct accessions written.
    pub fn write_tsv<P, Q>(
        &self,
        input: P,
        resolver: Option<&dyn LabelResolver>,
        output: Q,
        progress: &dyn ProgressListener,
    ) -> Result<usize>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let output = output.as_ref();
        let start = Instant::now();
        let mut sorter = self.sorter(output);
        for_each_row(input, resolver, progress, |accession, id| {
            sorter.push(accession, id)?;
            Ok(())
        })?;
        let n = self.write_sorted(sorter.finish()?, output)?;
        info!(
            "Wrote {} accessions to {:?} in {:.3}s",
            n,
            output,
            start.elapsed().as_secs_f64()
        );
        Ok(n)
    }

    /// Write `entries` as a binary index. Entries mapping to 0 are dropped,
    /// duplicates resolve to the last one given.
    pub fn write_entries<I, S, Q>(&self, entries: I, output: Q) -> Result<usize>
    where
        I: IntoIterator<Item = (S, ClassId)>,
        S: AsRef<str>,
        Q: AsRef<Path>,
    {
        let output = output.as_ref();
        let mut sorter = self.sorter(output);
        for (accession, id) in entries {
            if id != 0 {
                sorter.push(accession.as_ref(), id)?;
            }
        }
        self.write_sorted(sorter.finish()?, output)
    }

    fn sorter(&self, output: &Path) -> RowSorter {
        if self.config.temp_store_in_memory {
            RowSorter::in_memory()
        } else {
            RowSorter::external(output, self.chunk_entries)
        }
    }

    fn write_sorted(&self, rows: SortedRows, output: &Path) -> Result<usize> {
        let res = self.write_records(rows, output);
        if res.is_err() {
            // never leave a truncated index behind
            let _ = std::fs::remove_file(output);
        }
        res
    }

    fn write_records(&self, rows: SortedRows, output: &Path) -> Result<usize> {
        let mut w = BufWriter::new(File::create(output)?);
        // placeholder, patched once count and table offset are known
        write_header(&mut w, 0, 0)?;

        let mut offsets = OffsetSink::new(self.config.temp_store_in_memory, output)?;
        let mut pos = HEADER_LEN;
        let mut count: u64 = 0;
        for row in rows {
            let (key, id) = row?;
            offsets.push(pos)?;
            (key.len() as i32).write_to(&mut w)?;
            w.write_all(key.as_bytes())?;
            id.write_to(&mut w)?;
            pos += 8 + key.len() as u64;
            count += 1;
        }
        if count > i32::MAX as u64 {
            return Err(Error::Format(format!(
                "{} accessions do not fit a 32-bit entry count",
                count
            )));
        }

        let table_offset = pos;
        offsets.copy_into(&mut w)?;

        let mut f = w.into_inner().map_err(|e| e.into_error())?;
        f.seek(SeekFrom::Start(0))?;
        write_header(&mut f, count as i32, table_offset)?;
        f.flush()?;
        debug_assert_eq!(
            f.metadata()?.len(),
            table_offset + count * OFFSET_WIDTH,
            "index file length"
        );
        Ok(count as usize)
    }
}

fn write_header(w: &mut dyn Write, count: i32, table_offset: u64) -> io::Result<()> {
    w.write_all(MAGIC)?;
    VERSION.write_to(w)?;
    count.write_to(w)?;
    table_offset.write_to(w)
}

// Record offsets collected while the records stream out, appended as the
// offset table at the end.
enum OffsetSink {
    Memory(Vec<u64>),
    Disk(BufWriter<File>, SpillFile),
}

impl OffsetSink {
    fn new(in_memory: bool, output: &Path) -> io::Result<Self> {
        if in_memory {
            return Ok(Self::Memory(Vec::new()));
        }
        let spill = spill_file_for(output, fp::OFFSETS_SPILL_SUFFIX);
        let w = BufWriter::new(File::create(&spill.path)?);
        Ok(Self::Disk(w, spill))
    }

    fn push(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Self::Memory(v) => {
                v.push(offset);
                Ok(())
            }
            Self::Disk(w, _) => offset.write_to(w),
        }
    }

    fn copy_into(self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::Memory(v) => {
                for offset in v {
                    offset.write_to(out)?;
                }
            }
            Self::Disk(w, spill) => {
                drop(w.into_inner().map_err(|e| e.into_error())?);
                let mut r = BufReader::new(File::open(&spill.path)?);
                io::copy(&mut r, out)?;
            }
        }
        Ok(())
    }
}

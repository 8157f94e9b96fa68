use std::cell::Cell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::rc::Rc;

use flate2::read::MultiGzDecoder;
use log::info;

use crate::error::Result;
use crate::progress::ProgressListener;

pub mod consts;
pub mod disk;
pub mod memory;
mod sorter;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-exports
pub use disk::DiskAccessionIndex;
pub use memory::InMemoryAccessionIndex;
pub use writer::DiskIndexWriter;

//****************************************************************************/
// Classification ids
//****************************************************************************/

/// Node id in a classification scheme. Positive ids are real classes,
/// negative ids are reserved buckets.
pub type ClassId = i32;

/// Reads whose accession could not be resolved.
pub const UNASSIGNED_ID: ClassId = -1;
/// Reads without any alignment.
pub const NOHITS_ID: ClassId = -2;
/// Reads filtered as low complexity.
pub const LOW_COMPLEXITY_ID: ClassId = -3;

//****************************************************************************/
// Traits
//****************************************************************************/

/// Query side shared by the in-memory and the disk backed index.
///
/// Lookups take `&self` and are safe from any number of threads once the
/// index is built. A key that was never inserted yields `Ok(None)`.
pub trait AccessionMap: Sync {
    fn lookup(&self, accession: &str) -> std::io::Result<Option<ClassId>>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Resolves human readable class labels (second column values that are not
/// integers) to class ids.
pub trait LabelResolver {
    fn resolve(&self, label: &str) -> Option<ClassId>;
}

impl LabelResolver for HashMap<String, ClassId> {
    fn resolve(&self, label: &str) -> Option<ClassId> {
        self.get(label).copied()
    }
}

/// Load a `<label><TAB><id>` table for use as a [`LabelResolver`].
/// Rows that do not parse are ignored.
pub fn load_label_map<P: AsRef<Path>>(p: P) -> Result<HashMap<String, ClassId>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(p.as_ref())?;

    let mut labels = HashMap::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() != 2 {
            continue;
        }
        if let Ok(id) = rec[1].parse::<ClassId>() {
            labels.insert(rec[0].to_string(), id);
        }
    }
    info!("Loaded {} class labels from {:?}", labels.len(), p.as_ref());
    Ok(labels)
}

//****************************************************************************/
// Accession map rows
//****************************************************************************/

/// Parse one line of an accession map.
///
/// Lines that do not split into exactly two tab separated columns, whose
/// second column is neither an integer nor a resolvable label, or that
/// resolve to id 0 yield `None`.
pub fn parse_row<'a>(
    line: &'a str,
    resolver: Option<&dyn LabelResolver>,
) -> Option<(&'a str, ClassId)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut cols = line.split('\t');
    let accession = cols.next()?;
    let value = cols.next()?;
    if cols.next().is_some() {
        return None;
    }

    let id = match value.parse::<ClassId>() {
        Ok(id) => id,
        Err(_) => resolver?.resolve(value)?,
    };

    if id == 0 {
        None
    } else {
        Some((accession, id))
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct RowStats {
    pub lines: u64,
    pub accepted: u64,
}

impl RowStats {
    pub fn skipped(&self) -> u64 {
        self.lines - self.accepted
    }
}

// Counts raw bytes pulled from the underlying file, so progress of
// compressed input is measured against the file length too.
struct CountingReader<R> {
    inner: R,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.set(self.consumed.get() + n as u64);
        Ok(n)
    }
}

/// Stream an accession map file, handing every accepted row to `f`.
///
/// Files ending in `.gz` are decompressed on the fly. Progress (bytes of the
/// file consumed) is reported and cancellation polled once per line.
pub fn for_each_row<P, F>(
    path: P,
    resolver: Option<&dyn LabelResolver>,
    progress: &dyn ProgressListener,
    mut f: F,
) -> Result<RowStats>
where
    P: AsRef<Path>,
    F: FnMut(&str, ClassId) -> Result<()>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    progress.set_maximum(file.metadata()?.len());

    let consumed = Rc::new(Cell::new(0));
    let counting = CountingReader {
        inner: file,
        consumed: Rc::clone(&consumed),
    };
    let is_gz = path.extension().map_or(false, |e| e == "gz");
    let mut rdr: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(counting)))
    } else {
        Box::new(BufReader::new(counting))
    };

    let mut stats = RowStats::default();
    let mut line_bytes = 0u64;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = rdr.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        stats.lines += 1;
        line_bytes += n as u64;

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        // Lines that are not valid UTF-8 are malformed rows like any other.
        if let Ok(line) = std::str::from_utf8(line) {
            if let Some((accession, id)) = parse_row(line, resolver) {
                f(accession, id)?;
                stats.accepted += 1;
            }
        }
        let pos = if is_gz { consumed.get() } else { line_bytes };
        progress.set_progress(pos)?;
    }

    info!(
        "Read {} lines from {:?}: {} rows kept, {} skipped",
        stats.lines,
        path,
        stats.accepted,
        stats.skipped()
    );
    Ok(stats)
}

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};

use super::consts::EST_BYTES_PER_LINE;
use super::{for_each_row, AccessionMap, ClassId, LabelResolver};
use crate::error::Result;
use crate::progress::ProgressListener;

/// Upper bound on the up-front table reservation.
const MAX_PRESIZE: usize = 1 << 28;

/// Accession to class id table held entirely in memory.
///
/// Built once from an accession map file and read only afterwards.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccessionIndex {
    table: HashMap<String, ClassId>,
}

impl InMemoryAccessionIndex {
    /// Stream `source` into a new index.
    ///
    /// On cancellation the partially filled table is dropped and
    /// `Error::Canceled` is returned.
    pub fn build<P: AsRef<Path>>(
        source: P,
        resolver: Option<&dyn LabelResolver>,
        progress: &dyn ProgressListener,
    ) -> Result<Self> {
        let source = source.as_ref();
        let capacity = presize(source);
        debug!("Reserving {} slots for {:?}", capacity, source);

        let mut table = HashMap::with_capacity(capacity);
        for_each_row(source, resolver, progress, |accession, id| {
            // last write wins on duplicate accessions
            table.insert(accession.to_string(), id);
            Ok(())
        })?;

        info!("Built in-memory accession index with {} entries", table.len());
        Ok(Self { table })
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, ClassId)>,
        S: Into<String>,
    {
        let table = entries
            .into_iter()
            .filter(|(_, id)| *id != 0)
            .map(|(acc, id)| (acc.into(), id))
            .collect();
        Self { table }
    }

    /// Class id of `accession`, `None` if it was never mapped.
    pub fn get(&self, accession: &str) -> Option<ClassId> {
        self.table.get(accession).copied()
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Release all entries. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.table.clear();
        self.table.shrink_to_fit();
    }
}

impl AccessionMap for InMemoryAccessionIndex {
    fn lookup(&self, accession: &str) -> std::io::Result<Option<ClassId>> {
        Ok(self.get(accession))
    }

    fn size(&self) -> usize {
        self.table.len()
    }
}

// Reserve for the expected number of rows up front so huge maps do not go
// through repeated rehashing while loading.
fn presize(source: &Path) -> usize {
    let len = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
    usize::min((len / EST_BYTES_PER_LINE) as usize, MAX_PRESIZE)
}

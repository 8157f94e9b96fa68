// crate::block
//
// Per sample, per classification scheme read counts.
//
// A block is filled by exactly one producer (see `classify_accessions`) and
// only read afterwards; it carries no locking of its own.
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::{AccessionMap, ClassId, UNASSIGNED_ID};
use crate::io::{DeserializeFrom, SerializeTo};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Sums {
    count: u32,
    weighted: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationBlock {
    name: String,
    sums: HashMap<ClassId, Sums>,
}

impl ClassificationBlock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sums: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Read count of `id`, 0 if never set.
    pub fn get_sum(&self, id: ClassId) -> u32 {
        self.sums.get(&id).map_or(0, |s| s.count)
    }

    /// Overwrite the read count of `id`.
    pub fn set_sum(&mut self, id: ClassId, value: u32) {
        self.sums.entry(id).or_default().count = value;
    }

    /// Weighted read count of `id`, 0.0 if never set.
    pub fn get_weighted_sum(&self, id: ClassId) -> f32 {
        self.sums.get(&id).map_or(0.0, |s| s.weighted)
    }

    /// Overwrite the weighted read count of `id`.
    pub fn set_weighted_sum(&mut self, id: ClassId, value: f32) {
        self.sums.entry(id).or_default().weighted = value;
    }

    /// Ids with any recorded value.
    pub fn keys(&self) -> BTreeSet<ClassId> {
        self.sums.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Sum of all read counts.
    pub fn total(&self) -> u64 {
        self.sums.values().map(|s| s.count as u64).sum()
    }

    /// id -> read count, the input of subsampling.
    pub fn counts(&self) -> HashMap<ClassId, u32> {
        self.sums.iter().map(|(id, s)| (*id, s.count)).collect()
    }

    /// Write `id<TAB>count<TAB>weighted` rows in ascending id order.
    pub fn write_tsv<W: Write>(&self, w: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(w);
        for id in self.keys() {
            wtr.serialize((id, self.get_sum(id), self.get_weighted_sum(id)))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl<P: AsRef<Path>> SerializeTo<P> for ClassificationBlock {
    fn serialize_to(&self, p: P) -> bincode::Result<()> {
        let p = p.as_ref();
        debug!("Saving block {:?} to {:?}", self.name, p);
        let mut w = BufWriter::new(File::create(p)?);
        bincode::serialize_into(&mut w, self)?;
        w.flush()?;
        Ok(())
    }
}

impl<P: AsRef<Path>> DeserializeFrom<P> for ClassificationBlock {
    fn deserialize_from(p: P) -> bincode::Result<Self> {
        let p = p.as_ref();
        debug!("Loading block from {:?}", p);
        let r = BufReader::new(File::open(p)?);
        bincode::deserialize_from(r)
    }
}

/// Summary of one classification pass.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct ClassifyStats {
    pub reads: u64,
    pub assigned: u64,
}

/// Resolve each `(accession, weight)` read through `index` and add it to
/// `block`. Reads whose accession is unknown go to [`UNASSIGNED_ID`].
pub fn classify_accessions<M, I, S>(
    index: &M,
    reads: I,
    block: &mut ClassificationBlock,
) -> Result<ClassifyStats>
where
    M: AccessionMap + ?Sized,
    I: IntoIterator<Item = (S, f32)>,
    S: AsRef<str>,
{
    let mut stats = ClassifyStats::default();
    for (accession, weight) in reads {
        let id = index.lookup(accession.as_ref())?.unwrap_or(UNASSIGNED_ID);
        let count = block.get_sum(id);
        if count == u32::MAX {
            warn!("Read count of class {} saturated", id);
        }
        block.set_sum(id, count.saturating_add(1));
        block.set_weighted_sum(id, block.get_weighted_sum(id) + weight);

        stats.reads += 1;
        if id != UNASSIGNED_ID {
            stats.assigned += 1;
        }
    }
    debug!(
        "Classified {} reads into {:?}: {} assigned",
        stats.reads, block.name, stats.assigned
    );
    Ok(stats)
}

//! Subsampling of per-class read counts.
//!
//! Samples of unequal size are made comparable by drawing the same number of
//! reads from each, several times over, and averaging the tallies.
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::block::ClassificationBlock;
use crate::error::Result;
use crate::index::ClassId;
use crate::progress::{Canceled, ProgressListener};

mod running_total;

pub use running_total::{RunningTotalTable, MAX_DRAW_TOTAL};

pub const DEFAULT_RUNS: u32 = 10;
pub const DEFAULT_SEED: u64 = 666;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subsampler {
    sample_size: u32,
    runs: u32,
    ignore_unassigned: bool,
    seed: u64,
}

impl Subsampler {
    pub fn new(sample_size: u32) -> Self {
        Self {
            sample_size,
            runs: DEFAULT_RUNS,
            ignore_unassigned: false,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    /// Leave reserved classes (id <= 0) out of the draw.
    pub fn ignore_unassigned(mut self, ignore: bool) -> Self {
        self.ignore_unassigned = ignore;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Subsample `counts` down (or up) to `sample_size` reads.
    ///
    /// Repeated ids in `counts` are summed. Returns the nonzero tallies.
    /// Runs are drawn in parallel, each from its own generator derived from
    /// the seed, so the result depends only on the seed and the input. The
    /// listener is polled once per run; cancellation discards everything
    /// drawn so far.
    pub fn subsample<I>(
        &self,
        counts: I,
        progress: &dyn ProgressListener,
    ) -> Result<BTreeMap<ClassId, u32>>
    where
        I: IntoIterator<Item = (ClassId, u32)>,
    {
        let table = RunningTotalTable::from_counts(counts, self.ignore_unassigned);
        let limit = table.draw_limit();
        if limit == 0 || self.runs == 0 {
            debug!("Nothing to subsample");
            return Ok(BTreeMap::new());
        }
        if table.total() > MAX_DRAW_TOTAL {
            info!(
                "Total of {} reads saturates at {}; classes past it are never drawn",
                table.total(),
                MAX_DRAW_TOTAL
            );
        }

        progress.set_maximum(self.runs as u64);
        let done = AtomicU64::new(0);
        let tallies = (0..self.runs)
            .into_par_iter()
            .map(|run| -> std::result::Result<Vec<u64>, Canceled> {
                progress.check_for_cancel()?;
                let local = self.draw(&table, limit, run);
                progress.set_progress(done.fetch_add(1, Ordering::Relaxed) + 1)?;
                Ok(local)
            })
            .try_reduce(
                || vec![0u64; table.len()],
                |mut acc, local| {
                    acc.iter_mut().zip(local).for_each(|(a, b)| *a += b);
                    Ok(acc)
                },
            )?;

        let result = self.round_to_target(&tallies);
        let realized: u64 = result.iter().map(|&c| c as u64).sum();
        info!(
            "Subsampled {} reads ({} requested, {} runs)",
            realized, self.sample_size, self.runs
        );

        Ok(result
            .into_iter()
            .enumerate()
            .filter(|&(_, c)| c > 0)
            .map(|(i, c)| (table.id(i), c))
            .collect())
    }

    pub fn subsample_block(
        &self,
        block: &ClassificationBlock,
        progress: &dyn ProgressListener,
    ) -> Result<BTreeMap<ClassId, u32>> {
        self.subsample(block.counts(), progress)
    }

    // One run: `sample_size` uniform draws over [0, limit).
    fn draw(&self, table: &RunningTotalTable, limit: u64, run: u32) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(run_seed(self.seed, run));
        let mut local = vec![0u64; table.len()];
        for _ in 0..self.sample_size {
            let r = rng.gen_range(0..limit);
            local[table.find(r)] += 1;
        }
        local
    }

    // Average over runs, then rescale once if rounding drifted off target.
    fn round_to_target(&self, tallies: &[u64]) -> Vec<u32> {
        let runs = self.runs as f64;
        let first: Vec<u32> = tallies
            .iter()
            .map(|&t| (t as f64 / runs).round() as u32)
            .collect();
        let realized: u64 = first.iter().map(|&c| c as u64).sum();
        let target = self.sample_size as u64;
        if realized == target || realized == 0 {
            return first;
        }

        debug!("Rescaling {} averaged reads to {}", realized, target);
        let factor = target as f64 / realized as f64;
        first
            .iter()
            .map(|&c| (c as f64 * factor).round() as u32)
            .collect()
    }
}

// Distinct, well spread seed per run.
fn run_seed(seed: u64, run: u32) -> u64 {
    seed ^ (run as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Subsample every block to the smallest eligible total among them.
///
/// Block `i` is drawn with seed `seed + i`. Blocks with no eligible reads
/// come back empty, and do not lower the common target.
pub fn normalize_blocks(
    blocks: &[ClassificationBlock],
    runs: u32,
    ignore_unassigned: bool,
    seed: u64,
    progress: &dyn ProgressListener,
) -> Result<Vec<BTreeMap<ClassId, u32>>> {
    let totals: Vec<u64> = blocks
        .iter()
        .map(|b| RunningTotalTable::from_counts(b.counts(), ignore_unassigned).total())
        .collect();
    let target = totals
        .iter()
        .copied()
        .filter(|&t| t > 0)
        .min()
        .unwrap_or(0)
        .min(u32::MAX as u64) as u32;
    info!("Normalizing {} samples to {} reads", blocks.len(), target);

    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            Subsampler::new(target)
                .with_runs(runs)
                .ignore_unassigned(ignore_unassigned)
                .with_seed(seed.wrapping_add(i as u64))
                .subsample_block(block, progress)
        })
        .collect()
}

/// Sum of the tallies of a subsample.
pub fn realized_total(result: &BTreeMap<ClassId, u32>) -> u64 {
    result.values().map(|&c| c as u64).sum()
}

/// Dense view keyed by id, convenient for comparing samples.
pub fn as_counts(result: &BTreeMap<ClassId, u32>) -> HashMap<ClassId, u32> {
    result.iter().map(|(&id, &c)| (id, c)).collect()
}

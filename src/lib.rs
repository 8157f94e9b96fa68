pub mod block;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod log;
pub mod normalize;
pub mod progress;
pub mod store;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod prelude {
    pub use crate::block::{classify_accessions, ClassificationBlock};
    pub use crate::config::{CacheSize, StoreConfig, StoreKind};
    pub use crate::error::{Error, Result};
    pub use crate::index::{
        AccessionMap, ClassId, DiskAccessionIndex, DiskIndexWriter, InMemoryAccessionIndex,
        LOW_COMPLEXITY_ID, NOHITS_ID, UNASSIGNED_ID,
    };
    pub use crate::normalize::{normalize_blocks, Subsampler};
    pub use crate::progress::{CancelFlag, LogProgress, NoProgress, ProgressListener};
    pub use crate::store::{AnyByteStore, ByteStore};
}

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;

use super::consts::*;
use super::*;
use crate::config::{StoreConfig, StoreKind};
use crate::error::Error;
use crate::progress::{Canceled, CancelFlag, NoProgress, ProgressListener};
use crate::store::{MappedByteStore, SeekByteStore};
use crate::test_utils::*;

const ROWS: &[(&str, &str)] = &[
    ("NP_000001.1", "9606"),
    ("WP_000002.1", "562"),
    ("XP_000003.2", "10090"),
    ("YP_000004.1", "-5"),
];

fn all_configs() -> Vec<StoreConfig> {
    let mut configs = Vec::new();
    for kind in [StoreKind::Mapped, StoreKind::Seek] {
        for temp_store_in_memory in [true, false] {
            for cache_size in [0, 2, -1] {
                configs.push(StoreConfig {
                    kind,
                    cache_size,
                    temp_store_in_memory,
                });
            }
        }
    }
    configs
}

fn build_disk(
    tsv: &str,
    config: &StoreConfig,
) -> (TempFile, DiskAccessionIndex<crate::store::AnyByteStore>) {
    let input = TempFile::with_contents("disk_in", tsv.as_bytes());
    let output = TempFile::new("disk_out");
    DiskIndexWriter::new(config)
        .with_chunk_entries(2)
        .write_tsv(input.path(), None, output.path(), &NoProgress)
        .unwrap();
    let index = DiskAccessionIndex::open_with_config(output.path(), config).unwrap();
    (output, index)
}

/******************************************************************************/
// Row parsing
/******************************************************************************/
#[test]
fn parse_rows() {
    assert_eq!(parse_row("A\t12", None), Some(("A", 12)));
    assert_eq!(parse_row("A\t12\r", None), Some(("A", 12)));
    assert_eq!(parse_row("A\t-3", None), Some(("A", -3)));
    assert_eq!(parse_row("A\t0", None), None);
    assert_eq!(parse_row("", None), None);
    assert_eq!(parse_row("A", None), None);
    assert_eq!(parse_row("A\t1\t2", None), None);
    assert_eq!(parse_row("A\tEscherichia coli", None), None);
    // accessions are case sensitive and kept as is
    assert_eq!(parse_row("abc\t7", None), Some(("abc", 7)));
}

#[test]
fn parse_rows_with_labels() {
    let mut labels: HashMap<String, ClassId> = HashMap::new();
    labels.insert("Escherichia coli".to_string(), 562);
    labels.insert("root".to_string(), 0);
    let resolver: &dyn LabelResolver = &labels;

    assert_eq!(
        parse_row("A\tEscherichia coli", Some(resolver)),
        Some(("A", 562))
    );
    // integers never go through the resolver
    assert_eq!(parse_row("A\t7", Some(resolver)), Some(("A", 7)));
    assert_eq!(parse_row("A\tunknown", Some(resolver)), None);
    // a label resolving to 0 is no mapping either
    assert_eq!(parse_row("A\troot", Some(resolver)), None);
}

#[test]
fn label_map_file() {
    let tf = TempFile::with_contents("labels", b"Homo sapiens\t9606\nbad line\nMus\tmusculus\n");
    let labels = load_label_map(tf.path()).unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels.resolve("Homo sapiens"), Some(9606));
}

/******************************************************************************/
// In-memory index
/******************************************************************************/
#[test]
fn memory_lookup() {
    let tf = TempFile::with_contents("mem", accession_tsv(ROWS).as_bytes());
    let index = InMemoryAccessionIndex::build(tf.path(), None, &NoProgress).unwrap();
    assert_eq!(index.size(), ROWS.len());
    for (acc, id) in ROWS {
        assert_eq!(index.get(acc), Some(id.parse().unwrap()));
    }
    assert_eq!(index.get("NP_999999.1"), None);
    assert_eq!(index.get("np_000001.1"), None);
    assert_eq!(index.lookup("WP_000002.1").unwrap(), Some(562));
}

#[test]
fn memory_duplicates_last_wins() {
    let tsv = accession_tsv(&[("A", "1"), ("B", "2"), ("A", "3")]);
    let tf = TempFile::with_contents("mem_dup", tsv.as_bytes());
    let index = InMemoryAccessionIndex::build(tf.path(), None, &NoProgress).unwrap();
    assert_eq!(index.size(), 2);
    assert_eq!(index.get("A"), Some(3));
}

#[test]
fn memory_malformed_rows_are_skipped() {
    let tsv = "A\t1\n\nB\t2\t3\nC\t0\nD\tlabel\nE\t5\n";
    let tf = TempFile::with_contents("mem_bad", tsv.as_bytes());
    let index = InMemoryAccessionIndex::build(tf.path(), None, &NoProgress).unwrap();
    assert_eq!(index.size(), 2);
    assert_eq!(index.get("A"), Some(1));
    assert_eq!(index.get("E"), Some(5));
    for acc in ["B", "C", "D", ""] {
        assert_eq!(index.get(acc), None);
    }
}

#[test]
fn memory_non_utf8_line_is_skipped() {
    let mut bytes = b"A\t1\n".to_vec();
    bytes.extend_from_slice(b"\xff\xfe\t2\n");
    bytes.extend_from_slice(b"C\t3");
    let tf = TempFile::with_contents("mem_utf8", &bytes);
    let index = InMemoryAccessionIndex::build(tf.path(), None, &NoProgress).unwrap();
    assert_eq!(index.size(), 2);
    // last line without trailing newline still counts
    assert_eq!(index.get("C"), Some(3));
}

#[test]
fn memory_gzip_input() {
    let path = temp_file_name("mem_gz").with_extension("gz");
    {
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(accession_tsv(ROWS).as_bytes()).unwrap();
        enc.finish().unwrap();
    }
    let index = InMemoryAccessionIndex::build(&path, None, &NoProgress).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(index.size(), ROWS.len());
    assert_eq!(index.get("XP_000003.2"), Some(10090));
}

#[test]
fn memory_dispose() {
    let mut index = InMemoryAccessionIndex::from_entries([("A", 1), ("B", 0), ("C", 2)]);
    assert_eq!(index.size(), 2);
    index.dispose();
    assert!(index.is_empty());
    assert_eq!(index.get("A"), None);
    index.dispose();
    assert_eq!(index.size(), 0);
}

#[test]
fn memory_progress_is_monotone() {
    struct Recorder {
        max: AtomicU64,
        last: AtomicU64,
    }
    impl ProgressListener for Recorder {
        fn set_maximum(&self, max: u64) {
            self.max.store(max, Ordering::SeqCst);
        }
        fn set_progress(&self, pos: u64) -> std::result::Result<(), Canceled> {
            let prev = self.last.swap(pos, Ordering::SeqCst);
            assert!(pos >= prev);
            Ok(())
        }
        fn check_for_cancel(&self) -> std::result::Result<(), Canceled> {
            Ok(())
        }
    }

    let tsv = accession_tsv(ROWS);
    let tf = TempFile::with_contents("mem_progress", tsv.as_bytes());
    let rec = Recorder {
        max: AtomicU64::new(0),
        last: AtomicU64::new(0),
    };
    InMemoryAccessionIndex::build(tf.path(), None, &rec).unwrap();
    assert_eq!(rec.max.load(Ordering::SeqCst), tsv.len() as u64);
    assert_eq!(rec.last.load(Ordering::SeqCst), tsv.len() as u64);
}

// Cancels once half of the input has been consumed.
struct CancelAtHalf {
    max: AtomicU64,
    polled: AtomicU64,
}

impl CancelAtHalf {
    fn new() -> Self {
        Self {
            max: AtomicU64::new(0),
            polled: AtomicU64::new(0),
        }
    }
}

impl ProgressListener for CancelAtHalf {
    fn set_maximum(&self, max: u64) {
        self.max.store(max, Ordering::SeqCst);
    }

    fn set_progress(&self, pos: u64) -> std::result::Result<(), Canceled> {
        self.polled.fetch_add(1, Ordering::SeqCst);
        if pos * 2 >= self.max.load(Ordering::SeqCst) {
            Err(Canceled)
        } else {
            Ok(())
        }
    }

    fn check_for_cancel(&self) -> std::result::Result<(), Canceled> {
        Ok(())
    }
}

fn many_rows(n: usize) -> String {
    let rows: Vec<(String, String)> = (0..n)
        .map(|i| (format!("ACC{:06}", i), format!("{}", i + 1)))
        .collect();
    let rows: Vec<(&str, &str)> = rows.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    accession_tsv(&rows)
}

#[test]
fn memory_build_cancels() {
    let tf = TempFile::with_contents("mem_cancel", many_rows(100).as_bytes());
    let listener = CancelAtHalf::new();
    let res = InMemoryAccessionIndex::build(tf.path(), None, &listener);
    assert!(matches!(res, Err(Error::Canceled)));
    // stopped at the halfway line, not at the end
    let polled = listener.polled.load(Ordering::SeqCst);
    assert!(polled >= 49 && polled <= 51, "polled {} lines", polled);
}

#[test]
fn memory_build_cancel_flag() {
    let tf = TempFile::with_contents("mem_flag", many_rows(10).as_bytes());
    let flag = CancelFlag::new();
    flag.cancel();
    let res = InMemoryAccessionIndex::build(tf.path(), None, &flag);
    assert!(res.unwrap_err().is_canceled());
}

#[test]
fn memory_missing_file() {
    let res = InMemoryAccessionIndex::build(temp_file_name("nope"), None, &NoProgress);
    assert!(matches!(res, Err(Error::Io(_))));
}

/******************************************************************************/
// Disk index
/******************************************************************************/
#[test]
fn disk_lookup_all_configs() {
    let tsv = accession_tsv(ROWS);
    for config in all_configs() {
        let (_out, index) = build_disk(&tsv, &config);
        assert_eq!(index.size(), ROWS.len(), "{:?}", config);
        for (acc, id) in ROWS {
            assert_eq!(index.get(acc).unwrap(), Some(id.parse().unwrap()), "{:?}", config);
            // cached path answers the same
            assert_eq!(index.get(acc).unwrap(), Some(id.parse().unwrap()), "{:?}", config);
        }
        for miss in ["", "A", "NP_000001", "NP_000001.10", "ZZZ", "np_000001.1"] {
            assert_eq!(index.get(miss).unwrap(), None, "{:?} {}", config, miss);
            assert_eq!(index.lookup(miss).unwrap(), None, "{:?} {}", config, miss);
        }
        index.close();
    }
}

#[test]
fn disk_duplicates_and_malformed_rows() {
    let tsv = "A\t1\nB\t2\t3\n\nC\t0\nA\t4\nD\t5\nA\t6\n";
    for config in all_configs() {
        let (_out, index) = build_disk(tsv, &config);
        assert_eq!(index.size(), 2, "{:?}", config);
        assert_eq!(index.get("A").unwrap(), Some(6), "{:?}", config);
        assert_eq!(index.get("D").unwrap(), Some(5), "{:?}", config);
        assert_eq!(index.get("B").unwrap(), None, "{:?}", config);
        assert_eq!(index.get("C").unwrap(), None, "{:?}", config);
    }
}

#[test]
fn disk_empty_index() {
    for config in all_configs() {
        let (_out, index) = build_disk("", &config);
        assert!(index.is_empty());
        assert_eq!(index.get("A").unwrap(), None);
    }
}

#[test]
fn disk_file_layout() {
    let output = TempFile::new("layout");
    let config = StoreConfig::default();
    DiskIndexWriter::new(&config)
        .write_entries([("B", 2), ("A", 1)], output.path())
        .unwrap();
    let bytes = std::fs::read(output.path()).unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(MAGIC);
    expected.extend_from_slice(&VERSION.to_be_bytes());
    expected.extend_from_slice(&2i32.to_be_bytes());
    // header + two 9-byte records
    expected.extend_from_slice(&38u64.to_be_bytes());
    for (key, id) in [("A", 1i32), ("B", 2)] {
        expected.extend_from_slice(&(key.len() as i32).to_be_bytes());
        expected.extend_from_slice(key.as_bytes());
        expected.extend_from_slice(&id.to_be_bytes());
    }
    expected.extend_from_slice(&20u64.to_be_bytes());
    expected.extend_from_slice(&29u64.to_be_bytes());
    assert_eq!(bytes, expected);
    assert_eq!(HEADER_LEN, 20);
}

#[test]
fn disk_open_rejects_bad_files() {
    let short = TempFile::with_contents("short", b"TXMI");
    assert!(matches!(
        DiskAccessionIndex::open(short.path()),
        Err(Error::Format(_))
    ));

    let mut bad_magic = b"NOPE".to_vec();
    bad_magic.extend_from_slice(&[0u8; 16]);
    let bad_magic = TempFile::with_contents("magic", &bad_magic);
    assert!(matches!(
        DiskAccessionIndex::open(bad_magic.path()),
        Err(Error::Format(_))
    ));

    // claims one entry but has no offset table
    let mut truncated = MAGIC.to_vec();
    truncated.extend_from_slice(&VERSION.to_be_bytes());
    truncated.extend_from_slice(&1i32.to_be_bytes());
    truncated.extend_from_slice(&20u64.to_be_bytes());
    let truncated = TempFile::with_contents("trunc", &truncated);
    assert!(matches!(
        DiskAccessionIndex::open(truncated.path()),
        Err(Error::Format(_))
    ));

    assert!(matches!(
        DiskAccessionIndex::open(temp_file_name("absent")),
        Err(Error::Io(_))
    ));
}

#[test]
fn disk_build_cancels_without_output() {
    let input = TempFile::with_contents("disk_cancel", many_rows(100).as_bytes());
    let output = TempFile::new("disk_cancel_out");
    let listener = CancelAtHalf::new();
    let res = DiskIndexWriter::new(&StoreConfig::default())
        .with_chunk_entries(8)
        .write_tsv(input.path(), None, output.path(), &listener);
    assert!(res.unwrap_err().is_canceled());
    assert!(!output.path().exists());
}

#[test]
fn disk_generic_over_store() {
    let output = TempFile::new("generic");
    DiskIndexWriter::new(&StoreConfig::default())
        .write_entries([("K1", 10), ("K2", 20)], output.path())
        .unwrap();

    let mapped = DiskAccessionIndex::from_store(MappedByteStore::open(output.path()).unwrap(), 0)
        .unwrap();
    let seek = DiskAccessionIndex::from_store(SeekByteStore::open(output.path()).unwrap(), 8)
        .unwrap();
    for key in ["K0", "K1", "K2", "K3"] {
        assert_eq!(mapped.get(key).unwrap(), seek.get(key).unwrap());
    }
    assert_eq!(mapped.get("K2").unwrap(), Some(20));
}

#[test]
fn disk_concurrent_lookups() {
    let tsv = many_rows(500);
    let config = StoreConfig {
        kind: StoreKind::Seek,
        cache_size: 16,
        temp_store_in_memory: false,
    };
    let (_out, index) = build_disk(&tsv, &config);
    std::thread::scope(|s| {
        for t in 0..4 {
            let index = &index;
            s.spawn(move || {
                for i in (t..500).step_by(3) {
                    let key = format!("ACC{:06}", i);
                    assert_eq!(index.get(&key).unwrap(), Some(i as ClassId + 1));
                }
            });
        }
    });
}

#[quickcheck]
fn memory_and_disk_agree(rows: Vec<(String, i32)>, probes: Vec<String>) -> bool {
    // keys must be valid single-column accessions
    let rows: Vec<(String, i32)> = rows
        .into_iter()
        .filter(|(k, _)| !k.contains('\t') && !k.contains('\n') && !k.contains('\r'))
        .collect();

    let mem = InMemoryAccessionIndex::from_entries(rows.iter().map(|(k, v)| (k.clone(), *v)));
    let output = TempFile::new("qc_disk");
    DiskIndexWriter::new(&StoreConfig::default())
        .with_chunk_entries(3)
        .write_entries(rows.iter().map(|(k, v)| (k.as_str(), *v)), output.path())
        .unwrap();
    let disk = DiskAccessionIndex::open(output.path()).unwrap();

    let keys = rows.iter().map(|(k, _)| k.clone()).chain(probes);
    mem.size() == disk.size() && keys.into_iter().all(|k| mem.get(&k) == disk.get(&k).unwrap())
}

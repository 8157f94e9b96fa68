use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{env, process};

// Counter used for temporary file names.
static TEMP_FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a name for a temporary file using the provided name part.
pub fn temp_file_name(name_part: &str) -> PathBuf {
    let count = TEMP_FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut buf = env::temp_dir();
    buf.push(format!("taxmap_{}_{}_{}", name_part, process::id(), count));
    buf
}

/// Temporary file removed when dropped.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(name_part: &str) -> Self {
        Self {
            path: temp_file_name(name_part),
        }
    }

    pub fn with_contents(name_part: &str, contents: &[u8]) -> Self {
        let tf = Self::new(name_part);
        fs::write(&tf.path, contents).unwrap();
        tf
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Renders rows as a two column, tab delimited accession map.
pub fn accession_tsv(rows: &[(&str, &str)]) -> String {
    let mut s = String::new();
    for (acc, id) in rows {
        s.push_str(acc);
        s.push('\t');
        s.push_str(id);
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temp_names_are_unique() {
        assert_ne!(temp_file_name("x"), temp_file_name("x"));
    }

    #[test]
    fn temp_file_is_removed() {
        let p = {
            let tf = TempFile::with_contents("rm", b"abc");
            assert!(tf.path().exists());
            tf.path().to_path_buf()
        };
        assert!(!p.exists());
    }
}

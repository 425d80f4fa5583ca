//! Batch geom operations
//!
//! File discovery and parallel round-trip verification. Documents are
//! independent of each other, so each file is handled on its own worker with
//! the parameter dictionary shared read-only.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use super::GeomDocument;
use super::dictionary::ParameterDictionary;
use crate::error::{Error, Result};

/// Result of a batch geom operation
#[derive(Debug, Clone, Default)]
pub struct BatchVerifyResult {
    /// Files that survived read, write and re-read unchanged
    pub success_count: usize,
    /// Files that failed to decode, encode or compare equal
    pub fail_count: usize,
    /// One message per file, in input order
    pub results: Vec<String>,
}

/// Find all .geom files in a directory recursively
///
/// # Returns
/// A sorted list of paths to .geom files found in the directory tree.
pub fn find_geom_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut geom_files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("geom"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    geom_files.sort();
    geom_files
}

/// Read one file, write it back to memory, read that again and compare.
///
/// Returns the size of the re-encoded document.
pub fn verify_round_trip<P: AsRef<Path>>(path: P, dict: &ParameterDictionary) -> Result<u64> {
    let original = GeomDocument::read_file(path, dict)?;
    let bytes = original.to_bytes()?;
    let reread = GeomDocument::from_bytes(&bytes, dict)?;
    if reread != original {
        return Err(Error::inconsistent(
            None,
            "document changed after write and re-read",
        ));
    }
    Ok(bytes.len() as u64)
}

/// Verify many geom files in parallel
///
/// # Arguments
/// * `paths` - Files to verify
/// * `dict` - Parameter dictionary shared by every worker
/// * `progress` - Called with (files done, total, current file) as each file finishes
pub fn batch_verify<F>(paths: &[PathBuf], dict: &ParameterDictionary, progress: F) -> BatchVerifyResult
where
    F: Fn(usize, usize, &Path) + Send + Sync,
{
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let total = paths.len();

    let results: Vec<String> = paths
        .par_iter()
        .map(|path| {
            let display_path = path.display();
            let message = match verify_round_trip(path, dict) {
                Ok(size) => {
                    success_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Verified: {display_path} ({size} bytes)")
                }
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!("Round trip failed for {display_path}: {e}");
                    format!("Failed {display_path}: {e}")
                }
            };
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(current, total, path.as_path());
            message
        })
        .collect();

    BatchVerifyResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::geom::skeleton::Bone;

    #[test]
    fn test_find_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("chr").join("body");
        std::fs::create_dir_all(&nested).unwrap();

        let mut doc = GeomDocument::new();
        doc.skeleton.push_bone(Bone::new("root"));
        doc.write_file(nested.join("b.GEOM")).unwrap();
        doc.write_file(dir.path().join("a.geom")).unwrap();
        std::fs::write(dir.path().join("c.geom"), b"not a geom").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let files = find_geom_files(dir.path());
        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));

        let done = AtomicUsize::new(0);
        let result = batch_verify(&files, &ParameterDictionary::new(), |_, total, _| {
            assert_eq!(total, 3);
            done.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(result.success_count, 2);
        assert_eq!(result.fail_count, 1);
        assert_eq!(result.results.len(), 3);
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}

//! Parallel extraction: the parsed archive is shared read-only across a
//! worker pool; each worker decompresses one file at a time and writes it
//! under the output root.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::archive::{Error, Result, SgaArchive};

/// Per-file accounting returned by the workers.
#[derive(Debug, Clone)]
pub struct FileStats {
    pub path: PathBuf,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Aggregate result of one extraction run. `results` is in archive entry
/// order regardless of worker scheduling.
pub struct ExtractStats {
    pub results: Vec<Result<FileStats>>,
    pub extracted_files: usize,
    pub extracted_bytes: u64,
    pub elapsed: Duration,
}

pub struct Extractor {
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl Extractor {
    pub fn new(workers: usize) -> Extractor {
        Extractor {
            workers: workers.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag for cooperative cancellation; workers poll it between
    /// files, never mid-file.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Extracts every file into `out_root/<alias>/<path>`. Destination
    /// directories are created serially before the workers start.
    pub fn extract(&self, archive: &SgaArchive, out_root: &Path) -> Result<ExtractStats> {
        let started = Instant::now();

        let mut jobs = Vec::new();
        for entry in archive.entries()? {
            let mut out = out_root.join(&entry.drive_alias);
            for part in entry.path.split('\\') {
                if !part.is_empty() {
                    out.push(part);
                }
            }
            jobs.push((entry.file, out));
        }

        let mut seen = HashSet::new();
        for (_, out) in &jobs {
            if let Some(parent) = out.parent() {
                if seen.insert(parent.to_path_buf()) {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        log::debug!(
            "extracting {} files into {} directories with {} workers",
            jobs.len(),
            seen.len(),
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|err| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
            })?;

        let cancel = &self.cancel;
        let results: Vec<Result<FileStats>> = pool.install(|| {
            jobs.par_iter()
                .map(|(file, out)| {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(Error::Io(std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            "extraction cancelled",
                        )));
                    }
                    let clock = Instant::now();
                    let row = &archive.files[*file];
                    let data = archive.read_file(row)?;
                    let mut handle = File::create(out)?;
                    handle.write_all(&data)?;
                    Ok(FileStats {
                        path: out.clone(),
                        bytes_read: row.compressed_size as u64,
                        bytes_written: data.len() as u64,
                        elapsed: clock.elapsed(),
                    })
                })
                .collect()
        });

        let extracted_files = results.iter().filter(|r| r.is_ok()).count();
        let extracted_bytes = results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|s| s.bytes_written))
            .sum();

        Ok(ExtractStats {
            results,
            extracted_files,
            extracted_bytes,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{SgaParser, StorageType};
    use crate::essence::{SetInfo, SgaFs};

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("rsga-extract-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn sample_archive() -> SgaArchive {
        let mut fs = SgaFs::new("sample");
        fs.create_drive("d", "data").unwrap();
        fs.mkdirs("data:\\docs").unwrap();
        fs.write("data:\\docs\\readme.txt", b"read me").unwrap();
        fs.write("data:\\big.bin", &vec![7u8; 2048]).unwrap();
        fs.set_info(
            "data:\\big.bin",
            &SetInfo {
                modified: None,
                storage_type: Some(StorageType::StreamCompress),
            },
        )
        .unwrap();
        let mut out = Vec::new();
        fs.save_to(&mut out).unwrap();
        SgaParser::from_bytes(out).read().unwrap()
    }

    #[test]
    fn extracts_all_files_with_decompression() {
        let archive = sample_archive();
        let root = temp_root("all");

        let stats = Extractor::new(2).extract(&archive, &root).unwrap();
        assert_eq!(stats.extracted_files, 2);
        assert_eq!(stats.extracted_bytes, 7 + 2048);
        assert!(stats.results.iter().all(|r| r.is_ok()));

        assert_eq!(
            fs::read(root.join("data").join("big.bin")).unwrap(),
            vec![7u8; 2048]
        );
        assert_eq!(
            fs::read(root.join("data").join("docs").join("readme.txt")).unwrap(),
            b"read me"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn cancellation_turns_remaining_files_into_errors() {
        let archive = sample_archive();
        let root = temp_root("cancel");

        let extractor = Extractor::new(1);
        extractor.cancel_flag().store(true, Ordering::Relaxed);
        let stats = extractor.extract(&archive, &root).unwrap();
        assert_eq!(stats.extracted_files, 0);
        assert!(stats.results.iter().all(|r| r.is_err()));

        let _ = fs::remove_dir_all(&root);
    }
}

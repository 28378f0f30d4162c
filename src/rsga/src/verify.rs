//! Archive verification: the two header digests plus per-file CRC32
//! sweeps, serial and pooled.

use rayon::prelude::*;

use crate::archive::{ArchiveEntry, Error, Result, SgaArchive};

/// Recomputes the ToC MD5 over `[180, 180 + toc_size)`.
pub fn verify_header_md5(archive: &SgaArchive) -> Result<bool> {
    archive.verify_header(true, false)
}

/// Recomputes the file MD5 over `[180, EOF)`.
pub fn verify_file_md5(archive: &SgaArchive) -> Result<bool> {
    archive.verify_file(true, false)
}

/// Outcome of one file's CRC check.
pub struct FileCheck {
    pub entry: ArchiveEntry,
    pub ok: bool,
}

/// Checks every file in archive order. With `stop_on_error` the sweep
/// ends at the first failure, which is still included in the results.
pub fn verify_archive_files(archive: &SgaArchive, stop_on_error: bool) -> Result<Vec<FileCheck>> {
    let mut results = Vec::new();
    for entry in archive.entries()? {
        let ok = archive.verify_file_crc(&archive.files[entry.file], false)?;
        let failed = !ok;
        results.push(FileCheck { entry, ok });
        if failed && stop_on_error {
            break;
        }
    }
    Ok(results)
}

/// Fans the CRC checks out over a worker pool. Results come back in file
/// table order; a file that cannot be checked yields an `Err` entry
/// instead of aborting the batch.
pub fn par_verify_crc(archive: &SgaArchive, workers: usize) -> Result<Vec<Result<bool>>> {
    let pool = worker_pool(workers)?;
    Ok(pool.install(|| {
        archive
            .files
            .par_iter()
            .map(|row| archive.verify_file_crc(row, false))
            .collect()
    }))
}

/// Same fan-out restricted to an explicit entry list; results mirror the
/// input order.
pub fn par_verify_entries(
    archive: &SgaArchive,
    entries: &[ArchiveEntry],
    workers: usize,
) -> Result<Vec<Result<bool>>> {
    let pool = worker_pool(workers)?;
    Ok(pool.install(|| {
        entries
            .par_iter()
            .map(|entry| match archive.files.get(entry.file) {
                Some(row) => archive.verify_file_crc(row, false),
                None => Err(Error::InvalidField("file")),
            })
            .collect()
    }))
}

fn worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
}

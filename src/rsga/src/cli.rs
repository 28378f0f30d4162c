//! Entry points for the command line surface. The argument parsing and
//! the `.arciv` text format live with the CLI binary; these functions take
//! the already-structured inputs and return process exit codes.

use std::fs::OpenOptions;
use std::path::Path;

use crate::archive::{Error, SgaParser, SgaSerializer};
use crate::essence::{path, FsError, SgaFs};
use crate::manifest::{assemble, HostFilesystem, Manifest};
use crate::verify::{verify_archive_files, FileCheck};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

fn fs_error_code(err: &FsError) -> i32 {
    match err {
        FsError::Archive(Error::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn archive_error_code(err: &Error) -> i32 {
    match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

/// Assembles the manifest and writes the archive. A directory `out_path`
/// gets `<archive name>.sga` placed inside it, as the packer always did.
pub fn pack(
    manifest: &Manifest,
    host: &dyn HostFilesystem,
    out_path: &Path,
    safe_mode: bool,
) -> i32 {
    let out = if out_path.is_dir() {
        out_path.join(format!("{}.sga", manifest.name))
    } else {
        out_path.to_path_buf()
    };
    log::debug!("packing '{}' into {}", manifest.name, out.display());

    let sga = match assemble(manifest, host) {
        Ok(sga) => sga,
        Err(err) => {
            log::error!("failed to assemble '{}': {err}", manifest.name);
            return fs_error_code(&err);
        }
    };

    let result = if safe_mode {
        std::fs::File::create(&out)
            .map_err(FsError::from)
            .and_then(|mut handle| sga.save_to(&mut handle))
    } else {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&out)
            .map_err(FsError::from)
            .and_then(|mut handle| {
                SgaSerializer::new(&sga)
                    .write_direct(&mut handle)
                    .map_err(FsError::from)
            })
    };

    match result {
        Ok(()) => EXIT_OK,
        Err(err) => {
            log::error!("failed to write {}: {err}", out.display());
            EXIT_FAILURE
        }
    }
}

/// Reads an archive and writes it back out, to `out_path` or in place
/// when omitted.
pub fn repack(in_path: &Path, out_path: Option<&Path>) -> i32 {
    let mut sga = match SgaFs::open(in_path) {
        Ok(sga) => sga,
        Err(err) => {
            log::error!("failed to open {}: {err}", in_path.display());
            return fs_error_code(&err);
        }
    };

    if let Some(out) = out_path {
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    log::error!("failed to create {}: {err}", parent.display());
                    return EXIT_FAILURE;
                }
            }
        }
    }

    match sga.save(out_path) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            log::error!("failed to repack {}: {err}", in_path.display());
            EXIT_FAILURE
        }
    }
}

pub struct VerifyOptions {
    pub header: bool,
    pub data: bool,
    pub files: bool,
    pub quiet: bool,
    pub stop_on_error: bool,
    pub tree: bool,
}

impl Default for VerifyOptions {
    fn default() -> VerifyOptions {
        VerifyOptions {
            header: true,
            data: true,
            files: true,
            quiet: false,
            stop_on_error: false,
            tree: false,
        }
    }
}

/// Checks the requested digests and prints a report. `quiet` prints only
/// failures, `tree` a directory view with per-leaf results, and
/// `stop_on_error` exits at the first failure.
pub fn verify(path: &Path, options: &VerifyOptions) -> i32 {
    let archive = match SgaParser::open(path).and_then(|parser| parser.read()) {
        Ok(archive) => archive,
        Err(err) => {
            log::error!("failed to read {}: {err}", path.display());
            return archive_error_code(&err);
        }
    };

    let mut failed = false;

    if options.header {
        match archive.verify_header(true, false) {
            Ok(true) => {
                if !options.quiet {
                    println!("toc md5: ok");
                }
            }
            Ok(false) => {
                failed = true;
                println!("toc md5: FAILED");
            }
            Err(err) => {
                log::error!("{err}");
                return EXIT_FAILURE;
            }
        }
        if failed && options.stop_on_error {
            return EXIT_FAILURE;
        }
    }

    if options.data {
        match archive.verify_file(true, false) {
            Ok(true) => {
                if !options.quiet {
                    println!("file md5: ok");
                }
            }
            Ok(false) => {
                failed = true;
                println!("file md5: FAILED");
            }
            Err(err) => {
                log::error!("{err}");
                return EXIT_FAILURE;
            }
        }
        if failed && options.stop_on_error {
            return EXIT_FAILURE;
        }
    }

    if options.files {
        let checks = match verify_archive_files(&archive, options.stop_on_error) {
            Ok(checks) => checks,
            Err(err) => {
                log::error!("{err}");
                return EXIT_FAILURE;
            }
        };
        let any_failed = checks.iter().any(|check| !check.ok);
        failed |= any_failed;

        if options.tree {
            print_tree(&checks);
        } else {
            for check in &checks {
                let label =
                    path::build([check.entry.path.as_str()], Some(check.entry.drive_alias.as_str()));
                if !check.ok {
                    println!("{label}: FAILED");
                } else if !options.quiet {
                    println!("{label}: ok");
                }
            }
        }
        if any_failed && options.stop_on_error {
            return EXIT_FAILURE;
        }
    }

    if failed {
        EXIT_FAILURE
    } else {
        EXIT_OK
    }
}

fn print_tree(checks: &[FileCheck]) {
    let mut current_drive: Option<&str> = None;
    let mut current_dir: Option<String> = None;

    for check in checks {
        if current_drive != Some(check.entry.drive_alias.as_str()) {
            println!("{}:", check.entry.drive_alias);
            current_drive = Some(check.entry.drive_alias.as_str());
            current_dir = None;
        }

        let (dir, name) = path::split(&check.entry.path);
        if current_dir.as_deref() != Some(dir.as_str()) {
            if !dir.is_empty() {
                println!("  {dir}");
            }
            current_dir = Some(dir);
        }

        let indent = if current_dir.as_deref().unwrap_or("").is_empty() {
            "  "
        } else {
            "    "
        };
        println!("{indent}{name} [{}]", if check.ok { "ok" } else { "FAILED" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{OsFilesystem, StorageRule, TocEntry};
    use std::fs;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("rsga-cli-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn sample_manifest(root: &Path) -> Manifest {
        let source = root.join("input");
        fs::create_dir_all(source.join("docs")).unwrap();
        fs::write(source.join("docs").join("readme.txt"), b"read me").unwrap();
        fs::write(source.join("body.bin"), vec![3u8; 1024]).unwrap();

        let toc = TocEntry::scan(
            "data",
            "test drive",
            &source,
            vec![StorageRule {
                min_size: -1,
                max_size: 64,
                storage: Some(crate::archive::StorageType::Store),
                wildcard: "*".to_string(),
            }],
            &OsFilesystem,
        )
        .unwrap();

        Manifest {
            name: "packed".to_string(),
            tocs: vec![toc],
        }
    }

    #[test]
    fn pack_verify_and_repack_round_trip() {
        let root = temp_root("roundtrip");
        let manifest = sample_manifest(&root);

        let out = root.join("packed.sga");
        assert_eq!(pack(&manifest, &OsFilesystem, &out, true), EXIT_OK);
        assert_eq!(verify(&out, &VerifyOptions::default()), EXIT_OK);

        let repacked = root.join("repacked.sga");
        assert_eq!(repack(&out, Some(&repacked)), EXIT_OK);
        assert_eq!(verify(&repacked, &VerifyOptions::default()), EXIT_OK);

        let sga = SgaFs::open(&repacked).unwrap();
        assert_eq!(sga.read("data:\\docs\\readme.txt").unwrap(), b"read me");
        assert_eq!(sga.read("data:\\body.bin").unwrap(), vec![3u8; 1024]);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn pack_into_a_directory_names_the_archive() {
        let root = temp_root("dirout");
        let manifest = sample_manifest(&root);

        assert_eq!(pack(&manifest, &OsFilesystem, &root, true), EXIT_OK);
        assert!(root.join("packed.sga").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn verify_flags_tampering() {
        let root = temp_root("tamper");
        let manifest = sample_manifest(&root);
        let out = root.join("packed.sga");
        assert_eq!(pack(&manifest, &OsFilesystem, &out, true), EXIT_OK);

        let mut bytes = fs::read(&out).unwrap();
        bytes[204 + 60] ^= 0xFF;
        fs::write(&out, bytes).unwrap();
        assert_eq!(
            verify(
                &out,
                &VerifyOptions {
                    quiet: true,
                    ..VerifyOptions::default()
                }
            ),
            EXIT_FAILURE
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_archive_is_a_usage_error() {
        let missing = std::env::temp_dir().join("rsga-cli-definitely-missing.sga");
        assert_eq!(verify(&missing, &VerifyOptions::default()), EXIT_USAGE);
        assert_eq!(repack(&missing, None), EXIT_USAGE);
    }
}

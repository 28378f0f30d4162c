//! The structured manifest a packing run consumes: drives, per-drive
//! storage rules, and a file tree pointing at host paths. The `.arciv`
//! text syntax that produces this shape is a surface concern and lives
//! with the CLI, not here.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::archive::StorageType;
use crate::essence::{path, FsResult, SetInfo, SgaFs};

/// Storage type used when no rule claims a file.
pub const DEFAULT_STORAGE_TYPE: StorageType = StorageType::StreamCompress;

/// A packing manifest: one output archive assembled from one or more
/// drives.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: String,
    pub tocs: Vec<TocEntry>,
}

/// One drive of the output archive.
#[derive(Debug, Clone)]
pub struct TocEntry {
    pub alias: String,
    pub name: String,
    pub root_path: PathBuf,
    pub storage_rules: Vec<StorageRule>,
    pub root: ManifestFolder,
}

#[derive(Debug, Clone)]
pub struct ManifestFolder {
    pub name: String,
    pub folders: Vec<ManifestFolder>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone)]
pub struct ManifestFile {
    /// Name inside the archive.
    pub name: String,
    /// Where the content lives on the host.
    pub path: PathBuf,
    /// Per-file override; `None` defers to the drive's storage rules.
    pub storage: Option<StorageType>,
}

/// One storage-resolution rule. `-1` disables a size bound; a `None`
/// storage stands for "use the default".
#[derive(Debug, Clone)]
pub struct StorageRule {
    pub min_size: i64,
    pub max_size: i64,
    pub storage: Option<StorageType>,
    pub wildcard: String,
}

/// First rule whose size bounds contain the file and whose wildcard
/// matches wins; no match falls through to `default`.
pub fn resolve_storage_type(
    rules: &[StorageRule],
    file_path: &str,
    size: u64,
    default: StorageType,
) -> StorageType {
    for rule in rules {
        let min_ok = rule.min_size == -1 || (rule.min_size >= 0 && rule.min_size as u64 <= size);
        let max_ok = rule.max_size == -1 || (rule.max_size >= 0 && rule.max_size as u64 >= size);
        if !min_ok || !max_ok {
            continue;
        }
        if !wildcard_match(&rule.wildcard, file_path) {
            continue;
        }
        return rule.storage.unwrap_or(default);
    }
    default
}

/// Windows-style glob match: `*` and `?`, case-insensitive, matched
/// against path components from the right. A pattern without separators
/// matches the basename only.
pub fn wildcard_match(pattern: &str, file_path: &str) -> bool {
    let pattern = path::fix_case(&path::fix_separators(pattern));
    let file_path = path::fix_case(&path::fix_separators(file_path));

    let pattern_parts: Vec<&str> = pattern.split('\\').filter(|p| !p.is_empty()).collect();
    let path_parts: Vec<&str> = file_path.split('\\').filter(|p| !p.is_empty()).collect();

    if pattern_parts.is_empty() || pattern_parts.len() > path_parts.len() {
        return false;
    }
    pattern_parts
        .iter()
        .rev()
        .zip(path_parts.iter().rev())
        .all(|(pattern, text)| match_component(pattern, text))
}

fn match_component(pattern: &str, text: &str) -> bool {
    fn matches(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some((&'*', rest)) => (0..=text.len()).any(|skip| matches(rest, &text[skip..])),
            Some((&'?', rest)) => !text.is_empty() && matches(rest, &text[1..]),
            Some((&expected, rest)) => match text.split_first() {
                Some((&actual, text_rest)) => expected == actual && matches(rest, text_rest),
                None => false,
            },
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pattern, &text)
}

/// What the packer needs to know about a host file.
#[derive(Debug, Clone, Copy)]
pub struct HostStat {
    pub size: u64,
    /// UNIX seconds.
    pub modified: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    File,
    Folder,
}

/// Minimal read-only view of the host filesystem the packer runs against.
/// `walk` lists the immediate children of one directory.
pub trait HostFilesystem {
    fn open_read(&self, path: &Path) -> std::io::Result<Box<dyn Read>>;
    fn stat(&self, path: &Path) -> std::io::Result<HostStat>;
    fn walk(&self, path: &Path) -> std::io::Result<Vec<(PathBuf, HostKind)>>;
}

/// The host OS implementation.
pub struct OsFilesystem;

impl HostFilesystem for OsFilesystem {
    fn open_read(&self, path: &Path) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn stat(&self, path: &Path) -> std::io::Result<HostStat> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Ok(HostStat {
            size: metadata.len(),
            modified,
        })
    }

    fn walk(&self, path: &Path) -> std::io::Result<Vec<(PathBuf, HostKind)>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                HostKind::Folder
            } else {
                HostKind::File
            };
            entries.push((entry.path(), kind));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

impl TocEntry {
    /// Builds the drive's file tree by scanning a host directory; every
    /// file found defers to the drive's storage rules.
    pub fn scan(
        alias: &str,
        name: &str,
        root_path: &Path,
        storage_rules: Vec<StorageRule>,
        host: &dyn HostFilesystem,
    ) -> std::io::Result<TocEntry> {
        let root = scan_folder(String::new(), root_path, host)?;
        Ok(TocEntry {
            alias: alias.to_string(),
            name: name.to_string(),
            root_path: root_path.to_path_buf(),
            storage_rules,
            root,
        })
    }
}

fn scan_folder(
    name: String,
    dir: &Path,
    host: &dyn HostFilesystem,
) -> std::io::Result<ManifestFolder> {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for (entry_path, kind) in host.walk(dir)? {
        let entry_name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match kind {
            HostKind::Folder => folders.push(scan_folder(entry_name, &entry_path, host)?),
            HostKind::File => files.push(ManifestFile {
                name: entry_name,
                path: entry_path,
                storage: None,
            }),
        }
    }
    Ok(ManifestFolder {
        name,
        folders,
        files,
    })
}

/// Assembles an in-memory filesystem from the manifest, reading content
/// through the host interface and resolving storage types per rule.
pub fn assemble(manifest: &Manifest, host: &dyn HostFilesystem) -> FsResult<SgaFs> {
    let mut sga = SgaFs::new(&manifest.name);
    for toc in &manifest.tocs {
        log::debug!("assembling drive '{}' from {:?}", toc.alias, toc.root_path);
        sga.create_drive(&toc.name, &toc.alias)?;
        assemble_folder(&mut sga, toc, &toc.root, "", host)?;
    }
    Ok(sga)
}

fn assemble_folder(
    sga: &mut SgaFs,
    toc: &TocEntry,
    folder: &ManifestFolder,
    parent: &str,
    host: &dyn HostFilesystem,
) -> FsResult<()> {
    let full = if parent.is_empty() {
        folder.name.clone()
    } else {
        path::join([parent, folder.name.as_str()])
    };
    if !full.is_empty() {
        sga.mkdirs(&path::build([full.as_str()], Some(toc.alias.as_str())))?;
    }

    for file in &folder.files {
        let file_path = if full.is_empty() {
            file.name.clone()
        } else {
            path::join([full.as_str(), file.name.as_str()])
        };
        let stat = host.stat(&file.path)?;
        let storage = file.storage.unwrap_or_else(|| {
            resolve_storage_type(&toc.storage_rules, &file_path, stat.size, DEFAULT_STORAGE_TYPE)
        });

        let mut data = Vec::with_capacity(stat.size as usize);
        host.open_read(&file.path)?.read_to_end(&mut data)?;

        let target = path::build([file_path.as_str()], Some(toc.alias.as_str()));
        sga.write(&target, &data)?;
        sga.set_info(
            &target,
            &SetInfo {
                modified: Some(stat.modified),
                storage_type: Some(storage),
            },
        )?;
    }

    for sub in &folder.folders {
        assemble_folder(sga, toc, sub, &full, host)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_basenames_and_suffix_paths() {
        assert!(wildcard_match("*.txt", "docs\\readme.txt"));
        assert!(wildcard_match("*.TXT", "docs\\readme.txt"));
        assert!(!wildcard_match("*.txt", "docs\\readme.bin"));
        assert!(wildcard_match("docs\\*.txt", "data\\docs\\readme.txt"));
        assert!(!wildcard_match("art\\*.txt", "data\\docs\\readme.txt"));
        assert!(wildcard_match("re?dme.*", "readme.txt"));
        assert!(!wildcard_match("re?dme.*", "eadme.txt"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            StorageRule {
                min_size: -1,
                max_size: 256,
                storage: Some(StorageType::Store),
                wildcard: "*.txt".to_string(),
            },
            StorageRule {
                min_size: -1,
                max_size: -1,
                storage: Some(StorageType::BufferCompress),
                wildcard: "*.txt".to_string(),
            },
        ];

        assert_eq!(
            resolve_storage_type(&rules, "a.txt", 100, DEFAULT_STORAGE_TYPE),
            StorageType::Store
        );
        assert_eq!(
            resolve_storage_type(&rules, "a.txt", 1000, DEFAULT_STORAGE_TYPE),
            StorageType::BufferCompress
        );
        assert_eq!(
            resolve_storage_type(&rules, "a.bin", 100, DEFAULT_STORAGE_TYPE),
            DEFAULT_STORAGE_TYPE
        );
    }

    #[test]
    fn sentinel_bounds_disable_the_check() {
        let rule = StorageRule {
            min_size: 512,
            max_size: -1,
            storage: Some(StorageType::Store),
            wildcard: "*".to_string(),
        };
        assert_eq!(
            resolve_storage_type(&[rule.clone()], "x", 511, DEFAULT_STORAGE_TYPE),
            DEFAULT_STORAGE_TYPE
        );
        assert_eq!(
            resolve_storage_type(&[rule], "x", 512, DEFAULT_STORAGE_TYPE),
            StorageType::Store
        );
    }

    #[test]
    fn rule_without_storage_resolves_to_the_default() {
        let rules = [StorageRule {
            min_size: -1,
            max_size: -1,
            storage: None,
            wildcard: "*".to_string(),
        }];
        assert_eq!(
            resolve_storage_type(&rules, "anything", 1, DEFAULT_STORAGE_TYPE),
            DEFAULT_STORAGE_TYPE
        );
    }
}

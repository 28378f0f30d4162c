use std::cell::{Cell, OnceCell};
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::archive::{self, Crc32Hasher, PayloadReader, StorageType};

use super::*;

/// A borrowed view into the shared archive buffer. Lazy nodes hold these
/// for their entire lifetime; the buffer is immutable and never written
/// through.
#[derive(Clone)]
pub struct ByteWindow {
    data: Arc<Vec<u8>>,
    range: Range<usize>,
}

impl ByteWindow {
    pub(crate) fn new(data: Arc<Vec<u8>>, range: Range<usize>) -> ByteWindow {
        ByteWindow { data, range }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// A file still backed by the parsed archive: metadata from the ToC plus a
/// window over the stored payload.
pub struct LazyFile {
    pub name: String,
    pub storage_type: StorageType,
    pub decompressed_size: u32,
    pub modified: u32,
    pub crc32: u32,
    pub(crate) window: ByteWindow,
}

impl LazyFile {
    /// Reader over the decompressed payload.
    pub fn reader(&self) -> PayloadReader<'_> {
        if self.storage_type.is_compressed() {
            PayloadReader::Zlib(flate2::read::ZlibDecoder::new(self.window.bytes()))
        } else {
            PayloadReader::Raw(self.window.bytes())
        }
    }

    pub fn read_all(&self) -> archive::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.decompressed_size as usize);
        self.reader().read_to_end(&mut data)?;
        Ok(data)
    }
}

/// A file promoted to memory: it owns its decompressed bytes. The CRC is
/// dropped on write and recomputed on the next read of it.
pub struct MemFile {
    pub name: String,
    pub storage_type: StorageType,
    pub modified: u32,
    data: Vec<u8>,
    crc32: Cell<Option<u32>>,
}

impl MemFile {
    pub fn new(
        name: String,
        storage_type: StorageType,
        data: Vec<u8>,
        modified: u32,
        crc32: Option<u32>,
    ) -> MemFile {
        MemFile {
            name,
            storage_type,
            modified,
            data,
            crc32: Cell::new(crc32),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.crc32.set(None);
        self.modified = archive::unix_now();
    }

    pub fn crc32(&self) -> u32 {
        match self.crc32.get() {
            Some(crc) => crc,
            None => self.recalculate_crc32(),
        }
    }

    pub fn recalculate_crc32(&self) -> u32 {
        let crc = Crc32Hasher::hash(&self.data);
        self.crc32.set(Some(crc));
        crc
    }
}

/// A file node is lazy until the first mutation touches it; promotion
/// decompresses the payload into an owned buffer and never reverses.
pub enum FileNode {
    Lazy(LazyFile),
    Mem(MemFile),
}

impl FileNode {
    pub fn name(&self) -> &str {
        match self {
            FileNode::Lazy(file) => &file.name,
            FileNode::Mem(file) => &file.name,
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            FileNode::Lazy(file) => file.storage_type,
            FileNode::Mem(file) => file.storage_type,
        }
    }

    pub fn modified(&self) -> u32 {
        match self {
            FileNode::Lazy(file) => file.modified,
            FileNode::Mem(file) => file.modified,
        }
    }

    /// Decompressed size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            FileNode::Lazy(file) => file.decompressed_size as u64,
            FileNode::Mem(file) => file.data().len() as u64,
        }
    }

    pub fn crc32(&self) -> u32 {
        match self {
            FileNode::Lazy(file) => file.crc32,
            FileNode::Mem(file) => file.crc32(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, FileNode::Lazy(_))
    }

    pub fn read_all(&self) -> archive::Result<Vec<u8>> {
        match self {
            FileNode::Lazy(file) => file.read_all(),
            FileNode::Mem(file) => Ok(file.data().to_vec()),
        }
    }

    /// One-way lazy to in-memory transition; loads the payload.
    pub fn promote(&mut self) -> archive::Result<()> {
        if let FileNode::Lazy(file) = self {
            let data = file.read_all()?;
            *self = FileNode::Mem(MemFile::new(
                file.name.clone(),
                file.storage_type,
                data,
                file.modified,
                Some(file.crc32),
            ));
        }
        Ok(())
    }

    /// CRC32s the decompressed content against the stored checksum.
    pub fn verify_crc(&self, error: bool) -> archive::Result<bool> {
        match self {
            FileNode::Lazy(file) => {
                let mut reader = file.reader();
                if error {
                    Crc32Hasher::validate(&mut reader, file.crc32)?;
                    Ok(true)
                } else {
                    Crc32Hasher::check(&mut reader, file.crc32)
                }
            }
            FileNode::Mem(file) => {
                let expected = file.crc32();
                let actual = Crc32Hasher::hash(file.data());
                if actual == expected {
                    Ok(true)
                } else if error {
                    Err(archive::Error::ChecksumMismatch {
                        kind: archive::ChecksumKind::FileCrc32,
                        expected: expected.to_le_bytes().to_vec(),
                        actual: actual.to_le_bytes().to_vec(),
                        range: 0..file.data().len() as u64,
                    })
                } else {
                    Ok(false)
                }
            }
        }
    }
}

/// Child maps of a folder, keyed by case-folded basename. Values are
/// indices into the filesystem's folder and file arenas.
#[derive(Clone, Default)]
pub struct FolderChildren {
    pub folders: IndexMap<String, usize>,
    pub files: IndexMap<String, usize>,
}

impl FolderChildren {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

/// A folder backed by the archive's ToC: its children are the half-open
/// index ranges of the folder entry, resolved into maps on first access.
pub struct LazyFolder {
    /// Full path from the drive root, `""` for the root itself.
    pub path: String,
    pub subfolders: Range<usize>,
    pub files: Range<usize>,
    pub(crate) children: OnceCell<FolderChildren>,
}

/// A folder that owns its child maps.
pub struct MemFolder {
    pub path: String,
    pub children: FolderChildren,
}

impl MemFolder {
    pub fn new(path: String) -> MemFolder {
        MemFolder {
            path,
            children: FolderChildren::default(),
        }
    }
}

/// Folders follow the same lazy/in-memory split as files, but promotion
/// only copies the child index maps; payloads stay untouched.
pub enum FolderNode {
    Lazy(LazyFolder),
    Mem(MemFolder),
}

impl FolderNode {
    pub fn path(&self) -> &str {
        match self {
            FolderNode::Lazy(folder) => &folder.path,
            FolderNode::Mem(folder) => &folder.path,
        }
    }

    pub fn basename(&self) -> String {
        path::basename(self.path())
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, FolderNode::Lazy(_))
    }
}

/// A named, aliased subtree of the filesystem.
pub struct Drive {
    pub alias: String,
    pub name: String,
    pub root: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store_file(content: &[u8]) -> LazyFile {
        let data = Arc::new(content.to_vec());
        let len = data.len();
        LazyFile {
            name: "a.txt".to_string(),
            storage_type: StorageType::Store,
            decompressed_size: len as u32,
            modified: 1_600_000_000,
            crc32: Crc32Hasher::hash(content),
            window: ByteWindow::new(data, 0..len),
        }
    }

    #[test]
    fn lazy_file_reads_and_verifies() {
        let node = FileNode::Lazy(lazy_store_file(b"Hello"));
        assert_eq!(node.read_all().unwrap(), b"Hello");
        assert!(node.verify_crc(false).unwrap());
        assert!(node.verify_crc(true).is_ok());
    }

    #[test]
    fn promotion_keeps_content_and_metadata() {
        let mut node = FileNode::Lazy(lazy_store_file(b"Hello"));
        let crc = node.crc32();
        node.promote().unwrap();
        assert!(!node.is_lazy());
        assert_eq!(node.read_all().unwrap(), b"Hello");
        assert_eq!(node.crc32(), crc);
        assert_eq!(node.modified(), 1_600_000_000);
    }

    #[test]
    fn mem_file_recomputes_crc_after_write() {
        let mut node = FileNode::Lazy(lazy_store_file(b"Hello"));
        node.promote().unwrap();
        let before = node.crc32();
        if let FileNode::Mem(file) = &mut node {
            file.set_data(b"World".to_vec());
        }
        assert_ne!(node.crc32(), before);
        assert_eq!(node.crc32(), Crc32Hasher::hash(b"World"));
        assert!(node.verify_crc(false).unwrap());
    }

    #[test]
    fn corrupted_lazy_payload_fails_verification() {
        let mut file = lazy_store_file(b"Hello");
        file.crc32 ^= 1;
        let node = FileNode::Lazy(file);
        assert!(!node.verify_crc(false).unwrap());
        assert!(node.verify_crc(true).is_err());
    }
}

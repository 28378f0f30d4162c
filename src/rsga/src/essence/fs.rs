use std::cell::OnceCell;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::{
    self, GameFormat, PayloadReader, SgaArchive, SgaParser, SgaSerializer, StorageType,
};

use super::*;

/// Resolved node handle: an index into the folder or file arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Folder(usize),
    File(usize),
}

/// What `stat` reports for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<u32>,
    pub storage_type: Option<StorageType>,
    pub crc32: Option<u32>,
}

/// Settable file metadata; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetInfo {
    pub modified: Option<u32>,
    pub storage_type: Option<StorageType>,
}

/// Reader over one file's decompressed content.
pub enum FileReader<'a> {
    Lazy(PayloadReader<'a>),
    Mem(Cursor<&'a [u8]>),
}

impl Read for FileReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            FileReader::Lazy(reader) => reader.read(buf),
            FileReader::Mem(cursor) => cursor.read(buf),
        }
    }
}

/// Handle returned by the mode-string [`SgaFs::openbin`] entry point.
pub enum FileHandle<'a> {
    Read(FileReader<'a>),
    Write(FileWriter<'a>),
}

/// Writer returned by [`SgaFs::open_write`]. Content is buffered and
/// committed (truncating the file) on `finish` or drop; the commit stamps
/// the mutation time and drops the cached CRC.
pub struct FileWriter<'a> {
    node: &'a mut FileNode,
    buffer: Vec<u8>,
    committed: bool,
}

impl Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter<'_> {
    pub fn finish(self) {}

    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        if let FileNode::Mem(file) = &mut *self.node {
            file.set_data(std::mem::take(&mut self.buffer));
        }
    }
}

impl Drop for FileWriter<'_> {
    fn drop(&mut self) {
        self.commit();
    }
}

/// The unified filesystem over one or more drives.
///
/// Nodes live in two arenas indexed by the same integers the wire format
/// uses; tree edges are indices, never references, so promoting one node
/// never touches its siblings. Reads are shared; every mutating operation
/// takes `&mut self`, which makes the tree single-writer by construction.
pub struct SgaFs {
    name: String,
    game_format: GameFormat,
    drives: Vec<Drive>,
    folders: Vec<FolderNode>,
    files: Vec<FileNode>,
    source_path: Option<PathBuf>,
}

impl SgaFs {
    /// An empty in-memory filesystem.
    pub fn new(name: &str) -> SgaFs {
        SgaFs {
            name: name.to_string(),
            game_format: GameFormat::DawnOfWar,
            drives: Vec::new(),
            folders: Vec::new(),
            files: Vec::new(),
            source_path: None,
        }
    }

    pub fn with_format(mut self, format: GameFormat) -> SgaFs {
        self.game_format = format;
        self
    }

    /// Opens an archive file lazily; payloads stay in the shared source
    /// buffer until something mutates them.
    pub fn open(path: impl AsRef<Path>) -> FsResult<SgaFs> {
        SgaFs::open_with_format(path, None)
    }

    /// Like [`SgaFs::open`], with an explicit file entry layout instead of
    /// auto-detection.
    pub fn open_with_format(
        path: impl AsRef<Path>,
        format: Option<GameFormat>,
    ) -> FsResult<SgaFs> {
        let mut parser = SgaParser::open(&path)?;
        if let Some(format) = format {
            parser = parser.with_format(format);
        }
        let archive = parser.read()?;
        let mut fs = SgaFs::from_archive(&archive)?;
        fs.source_path = Some(path.as_ref().to_path_buf());
        Ok(fs)
    }

    /// Builds the lazy node graph over a parsed archive.
    pub fn from_archive(archive: &SgaArchive) -> FsResult<SgaFs> {
        let source = archive.shared_source();

        let mut files = Vec::with_capacity(archive.files.len());
        for row in &archive.files {
            let header = archive.data_header(row)?;
            let range = archive.payload_range(row)?;
            files.push(FileNode::Lazy(LazyFile {
                name: path::fix_case(&header.name),
                storage_type: row.storage_type,
                decompressed_size: row.decompressed_size,
                modified: header.modified,
                crc32: header.crc32,
                window: ByteWindow::new(Arc::clone(&source), range),
            }));
        }

        let mut folders = Vec::with_capacity(archive.folders.len());
        for row in &archive.folders {
            folders.push(FolderNode::Lazy(LazyFolder {
                path: path::fix_case(&path::fix_separators(archive.folder_path(row)?)),
                subfolders: row.subfolder_start as usize..row.subfolder_stop as usize,
                files: row.first_file as usize..row.last_file as usize,
                children: OnceCell::new(),
            }));
        }

        let drives = archive
            .drives
            .iter()
            .map(|row| Drive {
                alias: row.alias.clone(),
                name: row.name.clone(),
                root: row.root_folder as usize,
            })
            .collect();

        Ok(SgaFs {
            name: archive.header.name.clone(),
            game_format: archive.game_format,
            drives,
            folders,
            files,
            source_path: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn game_format(&self) -> GameFormat {
        self.game_format
    }

    pub fn drives(&self) -> &[Drive] {
        &self.drives
    }

    /// Drives in declaration order; unqualified lookups scan them in this
    /// order and the first match wins.
    pub fn iter_drives(&self) -> impl Iterator<Item = &Drive> {
        self.drives.iter()
    }

    pub fn create_drive(&mut self, name: &str, alias: &str) -> FsResult<usize> {
        let alias = path::fix_case(alias);
        if self.drive_index(&alias).is_some() {
            return Err(FsError::DriveExists(alias));
        }
        let root = self.folders.len();
        self.folders.push(FolderNode::Mem(MemFolder::new(String::new())));
        self.drives.push(Drive {
            alias,
            name: name.to_string(),
            root,
        });
        Ok(self.drives.len() - 1)
    }

    fn drive_index(&self, alias: &str) -> Option<usize> {
        self.drives
            .iter()
            .position(|d| path::fix_case(&d.alias) == alias)
    }

    pub(crate) fn folder_node(&self, id: usize) -> &FolderNode {
        &self.folders[id]
    }

    pub(crate) fn file_node(&self, id: usize) -> &FileNode {
        &self.files[id]
    }

    /// Child maps of a folder; computed on first access for lazy folders.
    pub(crate) fn folder_children(&self, id: usize) -> &FolderChildren {
        match &self.folders[id] {
            FolderNode::Mem(folder) => &folder.children,
            FolderNode::Lazy(folder) => folder.children.get_or_init(|| {
                let mut children = FolderChildren::default();
                for idx in folder.subfolders.clone() {
                    if let Some(node) = self.folders.get(idx) {
                        children
                            .folders
                            .insert(path::fix_case(&node.basename()), idx);
                    }
                }
                for idx in folder.files.clone() {
                    if let Some(node) = self.files.get(idx) {
                        children.files.insert(path::fix_case(node.name()), idx);
                    }
                }
                children
            }),
        }
    }

    /// Converts a lazy folder to in-memory by copying its child indices.
    /// Payloads are untouched; siblings stay lazy.
    fn promote_folder(&mut self, id: usize) {
        if self.folders[id].is_lazy() {
            let children = self.folder_children(id).clone();
            let path = self.folders[id].path().to_string();
            self.folders[id] = FolderNode::Mem(MemFolder { path, children });
        }
    }

    fn walk(&self, root: usize, rel: &str, original: &str) -> FsResult<NodeRef> {
        let mut current = NodeRef::Folder(root);
        for part in path::split_parts(rel, false) {
            let folder = match current {
                NodeRef::Folder(id) => id,
                NodeRef::File(_) => {
                    return Err(FsError::DirectoryExpected(original.to_string()))
                }
            };
            let children = self.folder_children(folder);
            let key = path::fix_case(&part);
            current = if let Some(&id) = children.folders.get(&key) {
                NodeRef::Folder(id)
            } else if let Some(&id) = children.files.get(&key) {
                NodeRef::File(id)
            } else {
                return Err(FsError::ResourceNotFound(original.to_string()));
            };
        }
        Ok(current)
    }

    /// Resolves an alias-qualified or unqualified path to a node.
    pub fn resolve(&self, p: &str) -> FsResult<NodeRef> {
        let (alias, rest) = path::parse(p);
        match alias {
            Some(alias) => {
                let index = self
                    .drive_index(&path::fix_case(alias))
                    .ok_or_else(|| FsError::ResourceNotFound(p.to_string()))?;
                self.walk(self.drives[index].root, rest, p)
            }
            None => {
                for drive in &self.drives {
                    match self.walk(drive.root, rest, p) {
                        Ok(node) => return Ok(node),
                        Err(FsError::ResourceNotFound(_)) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Err(FsError::ResourceNotFound(p.to_string()))
            }
        }
    }

    pub fn stat(&self, p: &str) -> FsResult<Stat> {
        match self.resolve(p)? {
            NodeRef::Folder(id) => Ok(Stat {
                name: self.folders[id].basename(),
                is_dir: true,
                size: 0,
                modified: None,
                storage_type: None,
                crc32: None,
            }),
            NodeRef::File(id) => {
                let file = &self.files[id];
                Ok(Stat {
                    name: file.name().to_string(),
                    is_dir: false,
                    size: file.size(),
                    modified: Some(file.modified()),
                    storage_type: Some(file.storage_type()),
                    crc32: Some(file.crc32()),
                })
            }
        }
    }

    pub fn list(&self, p: &str) -> FsResult<Vec<String>> {
        match self.resolve(p)? {
            NodeRef::File(_) => Err(FsError::DirectoryExpected(p.to_string())),
            NodeRef::Folder(id) => {
                let children = self.folder_children(id);
                Ok(children
                    .folders
                    .keys()
                    .chain(children.files.keys())
                    .cloned()
                    .collect())
            }
        }
    }

    pub fn open_read(&self, p: &str) -> FsResult<FileReader<'_>> {
        match self.resolve(p)? {
            NodeRef::Folder(_) => Err(FsError::FileExpected(p.to_string())),
            NodeRef::File(id) => Ok(match &self.files[id] {
                FileNode::Lazy(file) => FileReader::Lazy(file.reader()),
                FileNode::Mem(file) => FileReader::Mem(Cursor::new(file.data())),
            }),
        }
    }

    pub fn read(&self, p: &str) -> FsResult<Vec<u8>> {
        match self.resolve(p)? {
            NodeRef::Folder(_) => Err(FsError::FileExpected(p.to_string())),
            NodeRef::File(id) => Ok(self.files[id].read_all()?),
        }
    }

    /// Opens a file for writing, creating it when missing. A lazy file is
    /// promoted first; its folder and siblings stay lazy.
    pub fn open_write(&mut self, p: &str) -> FsResult<FileWriter<'_>> {
        let id = match self.resolve(p) {
            Ok(NodeRef::File(id)) => id,
            Ok(NodeRef::Folder(_)) => return Err(FsError::FileExpected(p.to_string())),
            Err(FsError::ResourceNotFound(_)) => self.create_file_node(p)?,
            Err(err) => return Err(err),
        };
        self.files[id].promote()?;
        Ok(FileWriter {
            node: &mut self.files[id],
            buffer: Vec::new(),
            committed: false,
        })
    }

    /// Mode-string front end over [`SgaFs::open_read`] and
    /// [`SgaFs::open_write`]: `"r"`/`"rb"` read, `"w"`/`"wb"` truncating
    /// write. Anything else is rejected.
    pub fn openbin(&mut self, p: &str, mode: &str) -> FsResult<FileHandle<'_>> {
        match mode.trim_end_matches('b') {
            "r" => Ok(FileHandle::Read(self.open_read(p)?)),
            "w" => Ok(FileHandle::Write(self.open_write(p)?)),
            _ => Err(FsError::InvalidPath(format!("{p} (mode '{mode}')"))),
        }
    }

    pub fn write(&mut self, p: &str, data: &[u8]) -> FsResult<()> {
        let mut writer = self.open_write(p)?;
        writer
            .write_all(data)
            .map_err(|err| FsError::Archive(err.into()))?;
        writer.finish();
        Ok(())
    }

    fn create_file_node(&mut self, p: &str) -> FsResult<usize> {
        // creating a node is a write: an unqualified target must name
        // exactly one drive
        let (alias, _) = path::parse(p);
        if alias.is_none() {
            self.single_drive_alias(p)?;
        }

        let (parent, child) = self.parent_and_child(p)?;
        let has_folder = self.folder_children(parent).folders.contains_key(&child);
        if has_folder {
            return Err(FsError::FileExpected(p.to_string()));
        }

        let id = self.files.len();
        self.files.push(FileNode::Mem(MemFile::new(
            child.clone(),
            StorageType::Store,
            Vec::new(),
            archive::unix_now(),
            None,
        )));
        self.promote_folder(parent);
        if let FolderNode::Mem(folder) = &mut self.folders[parent] {
            folder.children.files.insert(child, id);
        }
        Ok(id)
    }

    fn parent_and_child(&self, p: &str) -> FsResult<(usize, String)> {
        let (alias, rest) = path::parse(p);
        let (parent, child) = path::split(rest);
        if child == path::ROOT || child.is_empty() {
            return Err(FsError::InvalidPath(p.to_string()));
        }

        let parent_path = path::build([parent.as_str()], alias);
        let node = self.resolve(&parent_path).map_err(|err| match err {
            FsError::ResourceNotFound(_) => FsError::ResourceNotFound(p.to_string()),
            FsError::DirectoryExpected(_) => FsError::DirectoryExpected(p.to_string()),
            other => other,
        })?;
        match node {
            NodeRef::Folder(id) => Ok((id, path::fix_case(&child))),
            // the parent is a file; the caller's path cannot exist
            NodeRef::File(_) => Err(FsError::ResourceNotFound(p.to_string())),
        }
    }

    /// `mkdir("alias:\")` creates a drive; anywhere else it creates one
    /// folder under an existing parent.
    pub fn mkdir(&mut self, p: &str, recreate: bool) -> FsResult<()> {
        let (alias, rest) = path::parse(p);
        if let Some(alias) = alias {
            if rest == path::ROOT || rest.is_empty() {
                return match self.create_drive("", alias) {
                    Ok(_) => Ok(()),
                    Err(FsError::DriveExists(_)) if recreate => Ok(()),
                    Err(err) => Err(err),
                };
            }
        }

        let (parent, child) = self.parent_and_child(p)?;
        let (has_folder, has_file) = {
            let children = self.folder_children(parent);
            (
                children.folders.contains_key(&child),
                children.files.contains_key(&child),
            )
        };
        if has_folder {
            if recreate {
                return Ok(());
            }
            return Err(FsError::DirectoryExists(p.to_string()));
        }
        if has_file {
            return Err(FsError::DirectoryExpected(p.to_string()));
        }

        let parent_path = self.folders[parent].path().to_string();
        let full = path::join([parent_path.as_str(), child.as_str()]);
        let id = self.folders.len();
        self.folders.push(FolderNode::Mem(MemFolder::new(full)));
        self.promote_folder(parent);
        if let FolderNode::Mem(folder) = &mut self.folders[parent] {
            folder.children.folders.insert(child, id);
        }
        Ok(())
    }

    /// Creates every missing folder along the path; the drive is created
    /// too when the alias names none. Unqualified paths need exactly one
    /// drive to exist.
    pub fn mkdirs(&mut self, p: &str) -> FsResult<()> {
        let (alias, rest) = path::parse(p);
        let alias = match alias {
            Some(alias) => {
                let alias = path::fix_case(alias);
                if self.drive_index(&alias).is_none() {
                    self.create_drive("", &alias)?;
                }
                alias
            }
            None => self.single_drive_alias(p)?,
        };

        let drive = self
            .drive_index(&alias)
            .ok_or_else(|| FsError::NoDrive(p.to_string()))?;
        let mut current = self.drives[drive].root;

        for part in path::split_parts(rest, false) {
            let key = path::fix_case(&part);
            let next = {
                let children = self.folder_children(current);
                if children.files.contains_key(&key) {
                    return Err(FsError::DirectoryExpected(p.to_string()));
                }
                children.folders.get(&key).copied()
            };
            current = match next {
                Some(id) => id,
                None => {
                    let parent_path = self.folders[current].path().to_string();
                    let full = path::join([parent_path.as_str(), key.as_str()]);
                    let id = self.folders.len();
                    self.folders.push(FolderNode::Mem(MemFolder::new(full)));
                    self.promote_folder(current);
                    if let FolderNode::Mem(folder) = &mut self.folders[current] {
                        folder.children.folders.insert(key, id);
                    }
                    id
                }
            };
        }
        Ok(())
    }

    fn single_drive_alias(&self, original: &str) -> FsResult<String> {
        match self.drives.len() {
            0 => Err(FsError::NoDrive(original.to_string())),
            1 => Ok(path::fix_case(&self.drives[0].alias)),
            _ => Err(FsError::AmbiguousDrive(original.to_string())),
        }
    }

    pub fn remove(&mut self, p: &str) -> FsResult<()> {
        let (_, rest) = path::parse(p);
        if rest == path::ROOT {
            return Err(FsError::FileExpected(p.to_string()));
        }

        let (parent, child) = self.parent_and_child(p)?;
        let (has_folder, has_file) = {
            let children = self.folder_children(parent);
            (
                children.folders.contains_key(&child),
                children.files.contains_key(&child),
            )
        };
        if has_folder {
            return Err(FsError::FileExpected(p.to_string()));
        }
        if !has_file {
            return Err(FsError::ResourceNotFound(p.to_string()));
        }

        self.promote_folder(parent);
        if let FolderNode::Mem(folder) = &mut self.folders[parent] {
            folder.children.files.shift_remove(&child);
        }
        Ok(())
    }

    pub fn remove_dir(&mut self, p: &str) -> FsResult<()> {
        let (_, rest) = path::parse(p);
        if rest == path::ROOT || rest.is_empty() {
            return Err(FsError::RemoveRoot(p.to_string()));
        }

        let (parent, child) = self.parent_and_child(p)?;
        let (folder_id, has_file) = {
            let children = self.folder_children(parent);
            (
                children.folders.get(&child).copied(),
                children.files.contains_key(&child),
            )
        };
        if has_file {
            return Err(FsError::DirectoryExpected(p.to_string()));
        }
        let folder_id = folder_id.ok_or_else(|| FsError::ResourceNotFound(p.to_string()))?;
        if !self.folder_children(folder_id).is_empty() {
            return Err(FsError::DirectoryNotEmpty(p.to_string()));
        }

        self.promote_folder(parent);
        if let FolderNode::Mem(folder) = &mut self.folders[parent] {
            folder.children.folders.shift_remove(&child);
        }
        Ok(())
    }

    pub fn set_info(&mut self, p: &str, info: &SetInfo) -> FsResult<()> {
        match self.resolve(p)? {
            NodeRef::Folder(_) => Err(FsError::FileExpected(p.to_string())),
            NodeRef::File(id) => {
                self.files[id].promote()?;
                if let FileNode::Mem(file) = &mut self.files[id] {
                    if let Some(modified) = info.modified {
                        file.modified = modified;
                    }
                    if let Some(storage_type) = info.storage_type {
                        file.storage_type = storage_type;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn verify_file_crc(&self, p: &str, error: bool) -> FsResult<bool> {
        match self.resolve(p)? {
            NodeRef::Folder(_) => Err(FsError::FileExpected(p.to_string())),
            NodeRef::File(id) => Ok(self.files[id].verify_crc(error)?),
        }
    }

    /// Promotes every node, loading all lazy payloads into memory. After
    /// this no window into the original source remains, which is the
    /// precondition for saving over it.
    pub fn load_into_memory(&mut self) -> FsResult<()> {
        log::debug!("promoting {} folders and {} files", self.folders.len(), self.files.len());
        for id in 0..self.folders.len() {
            let _ = self.folder_children(id);
        }
        for id in 0..self.folders.len() {
            self.promote_folder(id);
        }
        for file in &mut self.files {
            file.promote()?;
        }
        Ok(())
    }

    /// Serializes into an arbitrary stream (safe mode: the output is only
    /// touched after the archive built successfully).
    pub fn save_to<W: Write>(&self, out: &mut W) -> FsResult<()> {
        SgaSerializer::new(self).write(out)?;
        Ok(())
    }

    /// Saves to `out`, or back onto the file the archive was opened from
    /// when `out` is `None`. An in-place save promotes everything first.
    pub fn save(&mut self, out: Option<&Path>) -> FsResult<()> {
        match out {
            Some(target) => {
                let mut handle = File::create(target)?;
                self.save_to(&mut handle)
            }
            None => {
                let target = self
                    .source_path
                    .clone()
                    .ok_or_else(|| FsError::InvalidPath("<unbacked archive>".to_string()))?;
                self.load_into_memory()?;
                let mut handle = File::create(&target)?;
                self.save_to(&mut handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_drive_fs() -> SgaFs {
        let mut fs = SgaFs::new("test");
        fs.create_drive("first", "attrib").unwrap();
        fs.create_drive("second", "data").unwrap();
        fs.mkdirs("data:\\scenarios\\mp").unwrap();
        fs.write("data:\\scenarios\\mp\\map.sgb", b"map").unwrap();
        fs.write("attrib:\\shared.txt", b"from attrib").unwrap();
        fs.write("data:\\shared.txt", b"from data").unwrap();
        fs
    }

    #[test]
    fn mkdir_on_alias_root_creates_a_drive() {
        let mut fs = SgaFs::new("test");
        fs.mkdir("data:\\", false).unwrap();
        assert_eq!(fs.drives().len(), 1);
        assert!(matches!(
            fs.mkdir("data:\\", false),
            Err(FsError::DriveExists(_))
        ));
        fs.mkdir("data:\\", true).unwrap();
        assert_eq!(fs.drives().len(), 1);
    }

    #[test]
    fn unqualified_lookup_prefers_declaration_order() {
        let fs = two_drive_fs();
        assert_eq!(fs.read("shared.txt").unwrap(), b"from attrib");
        assert_eq!(fs.read("attrib:\\shared.txt").unwrap(), b"from attrib");
        assert_eq!(fs.read("data:\\shared.txt").unwrap(), b"from data");
    }

    #[test]
    fn lookups_are_case_insensitive_and_separator_tolerant() {
        let fs = two_drive_fs();
        assert_eq!(fs.read("DATA:/Scenarios/MP/Map.SGB").unwrap(), b"map");
        let stat = fs.stat("data:\\scenarios").unwrap();
        assert!(stat.is_dir);
        assert_eq!(stat.name, "scenarios");
    }

    #[test]
    fn unqualified_writes_need_an_unambiguous_drive() {
        let mut fs = SgaFs::new("test");
        assert!(matches!(
            fs.mkdirs("\\a\\b"),
            Err(FsError::NoDrive(_))
        ));
        fs.create_drive("", "a").unwrap();
        fs.mkdirs("\\x").unwrap();
        fs.create_drive("", "b").unwrap();
        assert!(matches!(
            fs.mkdirs("\\y\\z"),
            Err(FsError::AmbiguousDrive(_))
        ));
    }

    #[test]
    fn remove_distinguishes_files_and_folders() {
        let mut fs = two_drive_fs();
        assert!(matches!(
            fs.remove("data:\\scenarios"),
            Err(FsError::FileExpected(_))
        ));
        assert!(matches!(
            fs.remove_dir("data:\\scenarios"),
            Err(FsError::DirectoryNotEmpty(_))
        ));
        fs.remove("data:\\scenarios\\mp\\map.sgb").unwrap();
        fs.remove_dir("data:\\scenarios\\mp").unwrap();
        fs.remove_dir("data:\\scenarios").unwrap();
        assert!(matches!(
            fs.read("data:\\scenarios\\mp\\map.sgb"),
            Err(FsError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut fs = two_drive_fs();
        assert!(matches!(
            fs.remove_dir("data:\\"),
            Err(FsError::RemoveRoot(_))
        ));
    }

    #[test]
    fn mkdir_over_a_file_is_directory_expected() {
        let mut fs = two_drive_fs();
        assert!(matches!(
            fs.mkdir("data:\\shared.txt", false),
            Err(FsError::DirectoryExpected(_))
        ));
    }

    #[test]
    fn open_write_truncates_and_restamps() {
        let mut fs = two_drive_fs();
        let before = fs.stat("data:\\shared.txt").unwrap();
        let mut writer = fs.open_write("data:\\shared.txt").unwrap();
        writer.write_all(b"X").unwrap();
        writer.finish();
        let after = fs.stat("data:\\shared.txt").unwrap();
        assert_eq!(fs.read("data:\\shared.txt").unwrap(), b"X");
        assert_eq!(after.size, 1);
        assert_ne!(before.crc32, after.crc32);
    }

    #[test]
    fn set_info_updates_storage_and_timestamp() {
        let mut fs = two_drive_fs();
        fs.set_info(
            "data:\\shared.txt",
            &SetInfo {
                modified: Some(42),
                storage_type: Some(StorageType::StreamCompress),
            },
        )
        .unwrap();
        let stat = fs.stat("data:\\shared.txt").unwrap();
        assert_eq!(stat.modified, Some(42));
        assert_eq!(stat.storage_type, Some(StorageType::StreamCompress));
    }

    #[test]
    fn listing_a_file_is_directory_expected() {
        let fs = two_drive_fs();
        assert!(matches!(
            fs.list("data:\\shared.txt"),
            Err(FsError::DirectoryExpected(_))
        ));
        let names = fs.list("data:\\").unwrap();
        assert!(names.contains(&"scenarios".to_string()));
        assert!(names.contains(&"shared.txt".to_string()));
    }

    #[test]
    fn openbin_routes_by_mode_string() {
        let mut fs = two_drive_fs();
        match fs.openbin("data:\\shared.txt", "rb").unwrap() {
            FileHandle::Read(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data).unwrap();
                assert_eq!(data, b"from data");
            }
            FileHandle::Write(_) => panic!("expected a reader"),
        }
        match fs.openbin("data:\\shared.txt", "w").unwrap() {
            FileHandle::Write(mut writer) => writer.write_all(b"new").unwrap(),
            FileHandle::Read(_) => panic!("expected a writer"),
        }
        assert_eq!(fs.read("data:\\shared.txt").unwrap(), b"new");
        assert!(matches!(
            fs.openbin("data:\\shared.txt", "x"),
            Err(FsError::InvalidPath(_))
        ));
    }

    #[test]
    fn verify_crc_on_mem_files() {
        let fs = two_drive_fs();
        assert!(fs.verify_file_crc("data:\\shared.txt", false).unwrap());
        assert!(matches!(
            fs.verify_file_crc("data:\\scenarios", false),
            Err(FsError::FileExpected(_))
        ));
    }
}

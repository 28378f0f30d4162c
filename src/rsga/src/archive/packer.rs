use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::essence::{path, FileNode, SgaFs};

use super::*;

/// The four ToC staging blocks plus the data block, ready to be spliced
/// into an output stream by the serializer.
pub struct TocInfo {
    pub drive_count: u16,
    pub folder_count: u16,
    pub file_count: u16,
    pub name_count: u16,
    pub drive_block: Vec<u8>,
    pub folder_block: Vec<u8>,
    pub file_block: Vec<u8>,
    pub name_block: Vec<u8>,
    pub data_block: Vec<u8>,
}

/// Disassembles a filesystem tree into staging blocks.
///
/// Emission order matches the official packer: per drive, all folder full
/// paths first (depth-first, children sorted by basename), then folder
/// entries root-first with placeholder rows rewritten once their ranges
/// are known, file entries and payloads as each folder's files are
/// reached, and file basenames appended to the name block along the way.
pub struct TocDisassembler<'a> {
    fs: &'a SgaFs,
    game_format: GameFormat,
    drive_block: Vec<u8>,
    folder_block: Vec<u8>,
    file_block: Vec<u8>,
    names: NameWriter,
    data_block: Vec<u8>,
    drive_count: u16,
    folder_count: u16,
    file_count: u16,
}

impl<'a> TocDisassembler<'a> {
    pub fn new(fs: &'a SgaFs, game_format: Option<GameFormat>) -> TocDisassembler<'a> {
        TocDisassembler {
            fs,
            game_format: game_format.unwrap_or_else(|| fs.game_format()),
            drive_block: Vec::new(),
            folder_block: Vec::new(),
            file_block: Vec::new(),
            names: NameWriter::new(),
            data_block: Vec::new(),
            drive_count: 0,
            folder_count: 0,
            file_count: 0,
        }
    }

    pub fn disassemble(mut self) -> Result<TocInfo> {
        for drive in self.fs.drives() {
            log::debug!("disassembling drive '{}'", drive.alias);
            self.emit_drive(drive.alias.clone(), drive.name.clone(), drive.root)?;
        }

        let name_count = self
            .names
            .count()
            .try_into()
            .map_err(|_| Error::TableOverflow("name"))?;

        Ok(TocInfo {
            drive_count: self.drive_count,
            folder_count: self.folder_count,
            file_count: self.file_count,
            name_count,
            drive_block: self.drive_block,
            folder_block: self.folder_block,
            file_block: self.file_block,
            name_block: self.names.block().to_vec(),
            data_block: self.data_block,
        })
    }

    /// Normalizes a name the way the blob stores it: `\` separators, no
    /// alias, no leading root, lowercase.
    fn write_name(&mut self, name: &str) -> Result<u32> {
        let name = path::fix_separators(name);
        let (_, name) = path::parse(&name);
        let name = path::fix_case(path::strip_root(name));
        if !name.is_ascii() {
            return Err(Error::InvalidField("name"));
        }
        Ok(self.names.write(&name))
    }

    fn sorted_children(&self, folder: usize) -> (Vec<usize>, Vec<usize>) {
        let children = self.fs.folder_children(folder);
        let mut folders: Vec<(&String, usize)> =
            children.folders.iter().map(|(k, &v)| (k, v)).collect();
        folders.sort_by(|a, b| a.0.cmp(b.0));
        let mut files: Vec<(&String, usize)> =
            children.files.iter().map(|(k, &v)| (k, v)).collect();
        files.sort_by(|a, b| a.0.cmp(b.0));
        (
            folders.into_iter().map(|(_, v)| v).collect(),
            files.into_iter().map(|(_, v)| v).collect(),
        )
    }

    fn emit_drive(&mut self, alias: String, name: String, root: usize) -> Result<()> {
        self.write_tree_names(root)?;

        let folder_start = self.folder_count;
        let file_start = self.file_count;
        let root_index = self.folder_count;

        let write_back = self.reserve_folder()?;
        self.emit_folder(root, write_back)?;

        let folder_end = self.folder_count;
        let file_end = self.file_count;

        self.drive_count = self
            .drive_count
            .checked_add(1)
            .ok_or(Error::TableOverflow("drive"))?;
        DriveRow {
            alias,
            name,
            first_folder: folder_start,
            last_folder: folder_end,
            first_file: file_start,
            last_file: file_end,
            root_folder: root_index,
        }
        .write_to(&mut self.drive_block)?;
        Ok(())
    }

    fn write_tree_names(&mut self, folder: usize) -> Result<()> {
        let fs = self.fs;
        self.write_name(fs.folder_node(folder).path())?;
        let (folders, _) = self.sorted_children(folder);
        for &child in &folders {
            self.write_name(fs.folder_node(child).path())?;
        }
        for child in folders {
            self.write_tree_names(child)?;
        }
        Ok(())
    }

    fn emit_folder(&mut self, folder: usize, write_back: usize) -> Result<()> {
        let fs = self.fs;
        let name_offset = self.write_name(fs.folder_node(folder).path())?;
        let (folders, files) = self.sorted_children(folder);

        let folder_start = self.folder_count;
        let mut write_backs = Vec::with_capacity(folders.len());
        for &child in &folders {
            write_backs.push((self.reserve_folder()?, child));
        }
        let folder_end = self.folder_count;

        for (child_write_back, child) in write_backs {
            self.emit_folder(child, child_write_back)?;
        }

        let file_start = self.file_count;
        for file in files {
            self.emit_file(fs.file_node(file))?;
        }
        let file_end = self.file_count;

        // the official packer zeroes the range of file-less folders
        let (first_file, last_file) = if file_start == file_end {
            (0, 0)
        } else {
            (file_start, file_end)
        };

        self.patch_folder(
            write_back,
            &FolderRow {
                name_offset,
                subfolder_start: folder_start,
                subfolder_stop: folder_end,
                first_file,
                last_file,
            },
        )
    }

    fn emit_file(&mut self, node: &FileNode) -> Result<()> {
        let name = node.name().to_string();
        let name_offset = self.write_name(&name)?;
        let data = node.read_all()?;
        let storage_type = node.storage_type();

        let (data_offset, compressed_size) =
            self.write_data(&name, node.modified(), &data, storage_type)?;

        let decompressed_size = data
            .len()
            .try_into()
            .map_err(|_| Error::TableOverflow("data"))?;

        self.file_count = self
            .file_count
            .checked_add(1)
            .ok_or(Error::TableOverflow("file"))?;
        FileRow {
            name_offset,
            storage_type,
            data_offset,
            compressed_size,
            decompressed_size,
        }
        .write_to(&mut self.file_block, self.game_format)?;
        Ok(())
    }

    /// Reserves the 264 byte data header, appends the raw or deflated
    /// payload, then rewrites the header with the checksum of the
    /// decompressed bytes. Returns the payload offset (past the header)
    /// and the stored size.
    fn write_data(
        &mut self,
        name: &str,
        modified: u32,
        data: &[u8],
        storage_type: StorageType,
    ) -> Result<(u32, u32)> {
        let header_start = self.data_block.len();
        self.data_block
            .resize(header_start + FileDataHeader::SIZE, 0);

        let header = FileDataHeader {
            name: name.to_string(),
            modified,
            crc32: Crc32Hasher::hash(data),
        };
        let mut encoded = Vec::with_capacity(FileDataHeader::SIZE);
        header.write_to(&mut encoded)?;
        self.data_block[header_start..header_start + FileDataHeader::SIZE]
            .copy_from_slice(&encoded);

        let payload_start = self.data_block.len();
        if storage_type.is_compressed() {
            // stream- and buffer-compressed payloads are written
            // identically; the distinction only matters to the engine
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
            encoder.write_all(data)?;
            let compressed = encoder.finish()?;
            self.data_block.extend_from_slice(&compressed);
        } else {
            self.data_block.extend_from_slice(data);
        }

        let data_offset = payload_start
            .try_into()
            .map_err(|_| Error::TableOverflow("data"))?;
        let compressed_size = (self.data_block.len() - payload_start)
            .try_into()
            .map_err(|_| Error::TableOverflow("data"))?;
        Ok((data_offset, compressed_size))
    }

    /// Appends a zeroed folder entry, returning its offset for the later
    /// rewrite.
    fn reserve_folder(&mut self) -> Result<usize> {
        let offset = self.folder_block.len();
        self.folder_block.resize(offset + FolderRow::SIZE, 0);
        self.folder_count = self
            .folder_count
            .checked_add(1)
            .ok_or(Error::TableOverflow("folder"))?;
        Ok(offset)
    }

    fn patch_folder(&mut self, offset: usize, row: &FolderRow) -> Result<()> {
        let mut encoded = Vec::with_capacity(FolderRow::SIZE);
        row.write_to(&mut encoded)?;
        self.folder_block[offset..offset + FolderRow::SIZE].copy_from_slice(&encoded);
        Ok(())
    }
}

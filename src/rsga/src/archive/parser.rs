use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use super::*;

/// Parses an SGA v2 archive out of a byte source.
///
/// The source is read into one shared buffer up front; every later access
/// (lazy file nodes included) is a window into that buffer, so nothing
/// keeps a handle on the file itself.
pub struct SgaParser {
    data: Arc<Vec<u8>>,
    format_hint: Option<GameFormat>,
}

impl SgaParser {
    pub fn open(path: impl AsRef<Path>) -> Result<SgaParser> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(SgaParser::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> SgaParser {
        SgaParser {
            data: Arc::new(data),
            format_hint: None,
        }
    }

    /// Drains an arbitrary byte stream into the shared buffer.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<SgaParser> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(SgaParser::from_bytes(data))
    }

    /// Forces the file entry layout instead of detecting it from the ToC.
    pub fn with_format(mut self, format: GameFormat) -> SgaParser {
        self.format_hint = Some(format);
        self
    }

    pub fn read(self) -> Result<SgaArchive> {
        let mut stream = Cursor::new(self.data.as_slice());

        read_magic(&mut stream)?;
        read_version(&mut stream)?;
        let header = ArchiveHeader::read_from(&mut stream)?;
        log::debug!(
            "archive '{}': toc_size={}, data_offset={}",
            header.name,
            header.toc_size,
            header.data_offset
        );

        stream.seek(SeekFrom::Start(TocHeader::POS))?;
        let toc = TocHeader::read_from(&mut stream)?;

        // The official packer emits the four sub-blocks in drive, folder,
        // file, name order; fan-made packers may not, so block sizes come
        // from each pointer's nearest successor instead of the layout.
        let file_block_size = block_size(&toc, toc.file, header.toc_size);
        let name_block_size = block_size(&toc, toc.name, header.toc_size);

        let game_format = determine_format(&toc, file_block_size, self.format_hint)?;
        log::debug!("file entry layout: {game_format:?}");

        let names = {
            let start = TocHeader::POS + toc.name.offset as u64;
            let end = start + name_block_size;
            if end > self.data.len() as u64 {
                return Err(Error::DataRange { start, end });
            }
            NameTable::parse(&self.data[start as usize..end as usize])
        };

        stream.seek(SeekFrom::Start(TocHeader::POS + toc.drive.offset as u64))?;
        let mut drives = Vec::with_capacity(toc.drive.count as usize);
        for _ in 0..toc.drive.count {
            drives.push(DriveRow::read_from(&mut stream)?);
        }

        stream.seek(SeekFrom::Start(TocHeader::POS + toc.folder.offset as u64))?;
        let mut folders = Vec::with_capacity(toc.folder.count as usize);
        for _ in 0..toc.folder.count {
            folders.push(FolderRow::read_from(&mut stream)?);
        }

        stream.seek(SeekFrom::Start(TocHeader::POS + toc.file.offset as u64))?;
        let mut files = Vec::with_capacity(toc.file.count as usize);
        for _ in 0..toc.file.count {
            files.push(FileRow::read_from(&mut stream, game_format)?);
        }

        log::debug!(
            "parsed {} drives, {} folders, {} files, {} name bytes",
            drives.len(),
            folders.len(),
            files.len(),
            names.size()
        );

        Ok(SgaArchive::new(
            header,
            game_format,
            drives,
            folders,
            files,
            names,
            self.data,
        ))
    }
}

/// Size in bytes of the sub-block a pointer refers to: the gap up to the
/// nearest following block, or to the end of the ToC.
fn block_size(toc: &TocHeader, pointer: TocPointer, toc_size: u32) -> u64 {
    let mut end = toc_size;
    for other in [toc.drive, toc.folder, toc.file, toc.name] {
        if other.offset > pointer.offset && other.offset < end {
            end = other.offset;
        }
    }
    end.saturating_sub(pointer.offset) as u64
}

/// Applies the §variant rule: an empty file table defaults to Dawn of War,
/// otherwise the per-entry size must match one layout exactly. An explicit
/// hint that disagrees with the table is an error rather than a fallback.
fn determine_format(
    toc: &TocHeader,
    file_block_size: u64,
    hint: Option<GameFormat>,
) -> Result<GameFormat> {
    let count = toc.file.count as u64;
    if count == 0 {
        return Ok(hint.unwrap_or(GameFormat::DawnOfWar));
    }

    if file_block_size % count != 0 {
        return Err(Error::UndeterminedGameFormat {
            size: file_block_size,
        });
    }
    let entry_size = file_block_size / count;

    match hint {
        Some(format) if format.file_entry_size() == entry_size => Ok(format),
        Some(_) => Err(Error::UndeterminedGameFormat { size: entry_size }),
        None => GameFormat::from_file_entry_size(entry_size)
            .ok_or(Error::UndeterminedGameFormat { size: entry_size }),
    }
}

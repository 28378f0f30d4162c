use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::ZlibDecoder;

use super::*;

/// Current time as UNIX seconds, the resolution the wire format stores.
pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Reader over one file payload; wraps a zlib decompressor when the file
/// is stored compressed.
pub enum PayloadReader<'a> {
    Raw(&'a [u8]),
    Zlib(ZlibDecoder<&'a [u8]>),
}

impl Read for PayloadReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            PayloadReader::Raw(slice) => slice.read(buf),
            PayloadReader::Zlib(decoder) => decoder.read(buf),
        }
    }
}

/// One file of a parsed archive, addressed for extraction and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Index into the archive's file table.
    pub file: usize,
    pub drive_alias: String,
    /// Full path below the drive root, `\`-separated.
    pub path: String,
}

const VERIFY_UNKNOWN: u8 = 0;
const VERIFY_PASS: u8 = 1;
const VERIFY_FAIL: u8 = 2;

/// A parsed SGA v2 archive.
///
/// The whole source is held in one shared buffer; the ToC tables and the
/// name buffer are immutable after parse and every payload access is a
/// window into the buffer, so any number of readers may work concurrently.
pub struct SgaArchive {
    pub header: ArchiveHeader,
    pub game_format: GameFormat,
    pub drives: Vec<DriveRow>,
    pub folders: Vec<FolderRow>,
    pub files: Vec<FileRow>,
    pub names: NameTable,
    pub(crate) source: Arc<Vec<u8>>,
    data_start: u64,
    has_data_headers: bool,
    has_exact_data_headers: bool,
    verified_header: AtomicU8,
    verified_file: AtomicU8,
}

impl SgaArchive {
    pub(crate) fn new(
        header: ArchiveHeader,
        game_format: GameFormat,
        drives: Vec<DriveRow>,
        folders: Vec<FolderRow>,
        files: Vec<FileRow>,
        names: NameTable,
        source: Arc<Vec<u8>>,
    ) -> SgaArchive {
        let data_start = header.data_offset as u64;
        let data_size = (source.len() as u64).saturating_sub(data_start);
        let expected: u64 = files
            .iter()
            .map(|f| FileDataHeader::SIZE as u64 + f.compressed_size as u64)
            .sum();
        let has_data_headers = expected <= data_size;
        let has_exact_data_headers = expected == data_size;
        if !has_data_headers {
            log::debug!("archive '{}' has no file data headers", header.name);
        }

        SgaArchive {
            header,
            game_format,
            drives,
            folders,
            files,
            names,
            source,
            data_start,
            has_data_headers,
            has_exact_data_headers,
            verified_header: AtomicU8::new(VERIFY_UNKNOWN),
            verified_file: AtomicU8::new(VERIFY_UNKNOWN),
        }
    }

    /// Whether the data block is large enough to hold a 264 byte header
    /// per file. Some archives in the wild ship without them.
    pub fn has_data_headers(&self) -> bool {
        self.has_data_headers
    }

    /// Whether the data block size matches the header-per-file layout
    /// exactly, ruling out trailing garbage masquerading as headers.
    pub fn has_exact_data_headers(&self) -> bool {
        self.has_exact_data_headers
    }

    /// The raw bytes the archive was parsed from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.source)
    }

    pub fn file_name(&self, row: &FileRow) -> Result<&str> {
        self.names.get(row.name_offset)
    }

    pub fn folder_path(&self, row: &FolderRow) -> Result<&str> {
        self.names.get(row.name_offset)
    }

    /// Absolute byte range of a file's payload within the source.
    pub(crate) fn payload_range(&self, row: &FileRow) -> Result<std::ops::Range<usize>> {
        let start = self.data_start + row.data_offset as u64;
        let end = start + row.compressed_size as u64;
        if end > self.source.len() as u64 {
            return Err(Error::DataRange { start, end });
        }
        Ok(start as usize..end as usize)
    }

    /// The stored (possibly compressed) payload bytes.
    pub fn payload(&self, row: &FileRow) -> Result<&[u8]> {
        Ok(&self.source[self.payload_range(row)?])
    }

    /// A reader yielding the decompressed payload.
    pub fn file_reader(&self, row: &FileRow) -> Result<PayloadReader<'_>> {
        let payload = self.payload(row)?;
        Ok(if row.storage_type.is_compressed() {
            PayloadReader::Zlib(ZlibDecoder::new(payload))
        } else {
            PayloadReader::Raw(payload)
        })
    }

    /// The decompressed payload as an owned buffer.
    pub fn read_file(&self, row: &FileRow) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(row.decompressed_size as usize);
        self.file_reader(row)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// The data header preceding a file payload. Archives without header
    /// blocks, and headers whose name disagrees with the ToC, yield a
    /// synthesized header with a freshly computed CRC.
    pub fn data_header(&self, row: &FileRow) -> Result<FileDataHeader> {
        let expected_name = self.file_name(row)?.to_string();

        if self.has_data_headers && row.data_offset as usize >= FileDataHeader::SIZE {
            let start = self.data_start as usize + row.data_offset as usize
                - FileDataHeader::SIZE;
            let end = start + FileDataHeader::SIZE;
            if end <= self.source.len() {
                let header = FileDataHeader::read_from(&mut Cursor::new(&self.source[start..end]))?;
                if header.name == expected_name {
                    return Ok(header);
                }
                log::debug!(
                    "file '{}' has a data header naming '{}'; regenerating",
                    expected_name,
                    header.name
                );
            }
        }

        let (crc32, _) = Crc32Hasher::hash_stream(&mut self.file_reader(row)?)?;
        Ok(FileDataHeader {
            name: expected_name,
            modified: unix_now(),
            crc32,
        })
    }

    /// CRC32 of the decompressed payload against the stored checksum.
    pub fn verify_file_crc(&self, row: &FileRow, error: bool) -> Result<bool> {
        let expected = self.data_header(row)?.crc32;
        let mut reader = self.file_reader(row)?;
        if error {
            Crc32Hasher::validate(&mut reader, expected)?;
            Ok(true)
        } else {
            Crc32Hasher::check(&mut reader, expected)
        }
    }

    /// Recomputes the ToC MD5 over `[180, 180 + toc_size)`. The source
    /// buffer is immutable, so a pass/fail result is remembered and
    /// repeated queries are O(1) unless `error` demands a fresh run.
    pub fn verify_header(&self, cached: bool, error: bool) -> Result<bool> {
        self.verify_digest(
            &self.verified_header,
            cached,
            error,
            Md5Hasher::toc(),
            Some(self.header.toc_size as u64),
            self.header.toc_md5,
        )
    }

    /// Recomputes the file MD5 over `[180, EOF)`.
    pub fn verify_file(&self, cached: bool, error: bool) -> Result<bool> {
        self.verify_digest(
            &self.verified_file,
            cached,
            error,
            Md5Hasher::file(),
            None,
            self.header.file_md5,
        )
    }

    fn verify_digest(
        &self,
        cache: &AtomicU8,
        cached: bool,
        error: bool,
        hasher: Md5Hasher,
        size: Option<u64>,
        expected: [u8; 16],
    ) -> Result<bool> {
        if cached && !error {
            match cache.load(Ordering::Relaxed) {
                VERIFY_PASS => return Ok(true),
                VERIFY_FAIL => return Ok(false),
                _ => {}
            }
        }

        let mut stream = Cursor::new(self.source.as_slice());
        let result = if error {
            hasher.validate(&mut stream, TocHeader::POS, size, &expected)?;
            true
        } else {
            hasher.check(&mut stream, TocHeader::POS, size, &expected)?
        };
        cache.store(
            if result { VERIFY_PASS } else { VERIFY_FAIL },
            Ordering::Relaxed,
        );
        Ok(result)
    }

    /// Flattens the folder tree into `(file, drive alias, full path)`
    /// entries, walking each drive depth-first with a folder's own files
    /// listed before its subfolders'.
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.files.len());
        for drive in &self.drives {
            self.collect_entries(drive, drive.root_folder as usize, &mut entries)?;
        }
        Ok(entries)
    }

    fn collect_entries(
        &self,
        drive: &DriveRow,
        folder: usize,
        entries: &mut Vec<ArchiveEntry>,
    ) -> Result<()> {
        let row = match self.folders.get(folder) {
            Some(row) => *row,
            None => return Ok(()),
        };
        let folder_path = self.folder_path(&row)?.to_string();

        for file_index in row.first_file as usize..row.last_file as usize {
            let file = match self.files.get(file_index) {
                Some(file) => file,
                None => continue,
            };
            let name = self.file_name(file)?;
            let path = if folder_path.is_empty() {
                name.to_string()
            } else {
                format!("{folder_path}\\{name}")
            };
            entries.push(ArchiveEntry {
                file: file_index,
                drive_alias: drive.alias.clone(),
                path,
            });
        }

        for sub in row.subfolder_start as usize..row.subfolder_stop as usize {
            self.collect_entries(drive, sub, entries)?;
        }
        Ok(())
    }
}

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::essence::SgaFs;

use super::*;

/// Serializes a filesystem into a v2 archive with the three-pass scheme
/// the format demands: a zero-filled skeleton, the ToC and data blocks in
/// place, then the real pointers and digests patched back in.
pub struct SgaSerializer<'a> {
    fs: &'a SgaFs,
    name: Option<String>,
    game_format: Option<GameFormat>,
}

impl<'a> SgaSerializer<'a> {
    pub fn new(fs: &'a SgaFs) -> SgaSerializer<'a> {
        SgaSerializer {
            fs,
            name: None,
            game_format: None,
        }
    }

    /// Overrides the archive display name stored in the header.
    pub fn with_name(mut self, name: &str) -> SgaSerializer<'a> {
        self.name = Some(name.to_string());
        self
    }

    /// Overrides the file entry layout to serialize with.
    pub fn with_format(mut self, format: GameFormat) -> SgaSerializer<'a> {
        self.game_format = Some(format);
        self
    }

    /// Safe-mode write: the archive is assembled in an owned buffer and
    /// only copied to `out` once every pass succeeded, so a failure leaves
    /// the destination untouched.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_direct(&mut buffer)?;
        out.write_all(buffer.get_ref())?;
        out.flush()?;
        Ok(())
    }

    /// Direct write into a readable, seekable destination. The back-patch
    /// passes re-read what was written, hence the `Read` bound; on failure
    /// the stream contents are undefined and the caller must discard them.
    pub fn write_direct<W: Read + Write + Seek>(&self, out: &mut W) -> Result<()> {
        if out.stream_position()? != 0 {
            return Err(Error::InvalidField("stream position"));
        }

        // Pass 1: skeleton with zeroed header and ToC header.
        write_magic(out)?;
        write_version(out)?;
        out.write_all(&[0u8; ArchiveHeader::SIZE])?;
        out.write_all(&[0u8; TocHeader::SIZE])?;
        debug_assert_eq!(
            out.stream_position()?,
            TocHeader::POS + TocHeader::SIZE as u64
        );

        // Pass 2: ToC sub-blocks, then the data block.
        let info = TocDisassembler::new(self.fs, self.game_format).disassemble()?;
        log::debug!(
            "writing {} drives, {} folders, {} files, {} names",
            info.drive_count,
            info.folder_count,
            info.file_count,
            info.name_count
        );

        let blocks = [
            &info.drive_block,
            &info.folder_block,
            &info.file_block,
            &info.name_block,
        ];
        let mut offsets = [0u32; 4];
        for (index, block) in blocks.iter().enumerate() {
            offsets[index] = (out.stream_position()? - TocHeader::POS)
                .try_into()
                .map_err(|_| Error::TableOverflow("toc"))?;
            out.write_all(block)?;
        }

        let toc_end = out.stream_position()?;
        let toc_size: u32 = (toc_end - TocHeader::POS)
            .try_into()
            .map_err(|_| Error::TableOverflow("toc"))?;
        let data_offset: u32 = toc_end
            .try_into()
            .map_err(|_| Error::TableOverflow("data"))?;
        out.write_all(&info.data_block)?;

        // Pass 3: real ToC header, digests, real archive header.
        out.seek(SeekFrom::Start(TocHeader::POS))?;
        TocHeader {
            drive: TocPointer {
                offset: offsets[0],
                count: info.drive_count,
            },
            folder: TocPointer {
                offset: offsets[1],
                count: info.folder_count,
            },
            file: TocPointer {
                offset: offsets[2],
                count: info.file_count,
            },
            name: TocPointer {
                offset: offsets[3],
                count: info.name_count,
            },
        }
        .write_to(out)?;

        let toc_md5 = Md5Hasher::toc().hash(out, TocHeader::POS, Some(toc_size as u64))?;
        let file_md5 = Md5Hasher::file().hash(out, TocHeader::POS, None)?;

        let name = match &self.name {
            Some(name) => name.clone(),
            None => self.fs.name().to_string(),
        };
        out.seek(SeekFrom::Start(ArchiveHeader::POS))?;
        ArchiveHeader {
            file_md5,
            name,
            toc_md5,
            toc_size,
            data_offset,
        }
        .write_to(out)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(fs: &SgaFs) -> Vec<u8> {
        let mut out = Vec::new();
        SgaSerializer::new(fs).write(&mut out).unwrap();
        out
    }

    #[test]
    fn empty_archive_round_trips() {
        let fs = SgaFs::new("empty");
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        assert_eq!(archive.header.name, "empty");
        assert_eq!(archive.header.toc_size, 24);
        assert!(archive.drives.is_empty());
        assert!(archive.verify_header(false, false).unwrap());
        assert!(archive.verify_file(false, false).unwrap());
    }

    #[test]
    fn bare_drive_round_trips() {
        let mut fs = SgaFs::new("bare");
        fs.create_drive("d", "data").unwrap();
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        assert_eq!(archive.drives.len(), 1);
        assert_eq!(archive.drives[0].alias, "data");
        // one folder: the drive root
        assert_eq!(archive.folders.len(), 1);
        assert!(archive.files.is_empty());
        assert!(archive.verify_header(false, false).unwrap());
    }

    #[test]
    fn minimal_store_archive_is_deterministic() {
        let mut fs = SgaFs::new("minimal");
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\a.txt", b"Hello").unwrap();
        let bytes = serialize(&fs);

        // 204 byte preamble, one entry per table, 7 name bytes, one data
        // header plus five payload bytes.
        let expected = 204 + 138 + 12 + 20 + 7 + FileDataHeader::SIZE + 5;
        assert_eq!(bytes.len(), expected);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        assert_eq!(archive.game_format, GameFormat::DawnOfWar);
        assert!(archive.verify_header(false, false).unwrap());
        assert!(archive.verify_file(false, false).unwrap());

        let fs = SgaFs::from_archive(&archive).unwrap();
        assert_eq!(fs.read("data:\\a.txt").unwrap(), b"Hello");
    }

    #[test]
    fn compressed_archive_round_trips() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();

        let mut fs = SgaFs::new("zlib");
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\rand.bin", &payload).unwrap();
        fs.set_info(
            "data:\\rand.bin",
            &crate::essence::SetInfo {
                modified: None,
                storage_type: Some(StorageType::StreamCompress),
            },
        )
        .unwrap();
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        let row = &archive.files[0];
        assert!(row.compressed_size >= 11);
        assert_eq!(row.decompressed_size, 4096);
        assert!(archive.verify_file_crc(row, false).unwrap());
        assert_eq!(archive.read_file(row).unwrap(), payload);
    }

    #[test]
    fn empty_file_sizes_per_storage_type() {
        let mut fs = SgaFs::new("empty-files");
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\stored.bin", b"").unwrap();
        fs.write("data:\\deflated.bin", b"").unwrap();
        fs.set_info(
            "data:\\deflated.bin",
            &crate::essence::SetInfo {
                modified: None,
                storage_type: Some(StorageType::BufferCompress),
            },
        )
        .unwrap();
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        for row in &archive.files {
            assert_eq!(row.decompressed_size, 0);
            match row.storage_type {
                StorageType::Store => assert_eq!(row.compressed_size, 0),
                // the zlib empty stream is two header bytes, an empty
                // stored block and the Adler32 trailer
                _ => assert_eq!(row.compressed_size, 8),
            }
            assert!(archive.verify_file_crc(row, false).unwrap());
        }
    }

    #[test]
    fn impossible_creatures_layout_round_trips() {
        let mut fs = SgaFs::new("ic").with_format(GameFormat::ImpossibleCreatures);
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\a.txt", b"Hello").unwrap();
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes.clone()).read().unwrap();
        assert_eq!(archive.game_format, GameFormat::ImpossibleCreatures);
        assert_eq!(archive.read_file(&archive.files[0]).unwrap(), b"Hello");

        // an explicit hint that disagrees with the table is an error
        assert!(matches!(
            SgaParser::from_bytes(bytes)
                .with_format(GameFormat::DawnOfWar)
                .read(),
            Err(Error::UndeterminedGameFormat { .. })
        ));
    }

    #[test]
    fn rewrite_without_mutation_is_byte_identical() {
        let mut fs = SgaFs::new("stable");
        fs.create_drive("main", "data").unwrap();
        fs.mkdirs("data:\\art\\units").unwrap();
        fs.write("data:\\art\\units\\mesh.whm", b"mesh bytes").unwrap();
        fs.write("data:\\readme.txt", b"hello").unwrap();
        let first = serialize(&fs);

        let archive = SgaParser::from_bytes(first.clone()).read().unwrap();
        let reloaded = SgaFs::from_archive(&archive).unwrap();
        let second = serialize(&reloaded);
        assert_eq!(first, second);
    }

    #[test]
    fn add_then_remove_leaves_the_archive_semantically_equal() {
        let mut fs = SgaFs::new("undo");
        fs.create_drive("main", "data").unwrap();
        fs.write("data:\\keep.txt", b"keep").unwrap();
        let before = serialize(&fs);

        let archive = SgaParser::from_bytes(before).read().unwrap();
        let mut fs = SgaFs::from_archive(&archive).unwrap();
        let keep_stat = fs.stat("data:\\keep.txt").unwrap();

        fs.write("data:\\extra.txt", b"extra").unwrap();
        fs.remove("data:\\extra.txt").unwrap();
        let after = serialize(&fs);

        let archive = SgaParser::from_bytes(after).read().unwrap();
        let fs = SgaFs::from_archive(&archive).unwrap();
        assert_eq!(fs.read("data:\\keep.txt").unwrap(), b"keep");
        let stat = fs.stat("data:\\keep.txt").unwrap();
        assert_eq!(stat.crc32, keep_stat.crc32);
        assert_eq!(stat.modified, keep_stat.modified);
        assert_eq!(fs.list("data:\\").unwrap(), vec!["keep.txt"]);
    }

    #[test]
    fn drive_ranges_partition_the_tables() {
        let mut fs = SgaFs::new("partition");
        fs.create_drive("a", "attrib").unwrap();
        fs.create_drive("d", "data").unwrap();
        fs.mkdirs("attrib:\\x").unwrap();
        fs.write("attrib:\\x\\one.txt", b"1").unwrap();
        fs.write("data:\\two.txt", b"2").unwrap();

        let archive = SgaParser::from_bytes(serialize(&fs)).read().unwrap();
        assert_eq!(archive.drives.len(), 2);

        let mut folder_cover = vec![false; archive.folders.len()];
        let mut file_cover = vec![false; archive.files.len()];
        for drive in &archive.drives {
            assert!(drive.first_folder <= drive.last_folder);
            assert!(drive.first_file <= drive.last_file);
            assert!((drive.first_folder..drive.last_folder).contains(&drive.root_folder));
            for index in drive.first_folder..drive.last_folder {
                assert!(!folder_cover[index as usize]);
                folder_cover[index as usize] = true;
            }
            for index in drive.first_file..drive.last_file {
                assert!(!file_cover[index as usize]);
                file_cover[index as usize] = true;
            }
        }
        assert!(folder_cover.iter().all(|&covered| covered));
        assert!(file_cover.iter().all(|&covered| covered));

        for folder in &archive.folders {
            assert!(folder.subfolder_start <= folder.subfolder_stop);
            assert!(folder.first_file <= folder.last_file);
            assert!(archive.folder_path(folder).unwrap().is_ascii());
        }
        for file in &archive.files {
            assert!(archive.file_name(file).unwrap().is_ascii());
        }
    }

    #[test]
    fn tampering_with_the_toc_breaks_the_digests_only() {
        let mut fs = SgaFs::new("tamper");
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\a.txt", b"Hello").unwrap();
        let mut bytes = serialize(&fs);

        // flip a bit inside the drive alias padding: the archive still
        // parses, both MD5s must fail, the payload CRC must not
        bytes[204 + 60] ^= 0xFF;
        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        assert!(!archive.verify_header(false, false).unwrap());
        assert!(!archive.verify_file(false, false).unwrap());
        assert!(archive.verify_file_crc(&archive.files[0], false).unwrap());
        assert!(matches!(
            archive.verify_header(false, true),
            Err(Error::ChecksumMismatch {
                kind: ChecksumKind::TocMd5,
                ..
            })
        ));
    }

    #[test]
    fn verify_results_are_cached_for_repeated_queries() {
        let mut fs = SgaFs::new("cache");
        fs.create_drive("d", "data").unwrap();
        fs.write("data:\\a.txt", b"Hello").unwrap();
        let bytes = serialize(&fs);

        let archive = SgaParser::from_bytes(bytes).read().unwrap();
        assert!(archive.verify_header(true, false).unwrap());
        assert!(archive.verify_header(true, false).unwrap());
        assert!(archive.verify_file(true, false).unwrap());
    }

    #[test]
    fn direct_write_rejects_a_mid_stream_position() {
        let fs = SgaFs::new("misuse");
        let mut cursor = Cursor::new(Vec::new());
        cursor.set_position(4);
        assert!(matches!(
            SgaSerializer::new(&fs).write_direct(&mut cursor),
            Err(Error::InvalidField("stream position"))
        ));
    }
}

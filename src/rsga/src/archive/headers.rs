use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::*;

/// Every SGA archive opens with this eight byte magic word.
pub const MAGIC: [u8; 8] = *b"_ARCHIVE";

/// `u16 major` + `u16 minor`, little-endian. This crate only speaks 2.0.
pub const VERSION: (u16, u16) = (2, 0);

pub fn read_magic<R: Read>(stream: &mut R) -> Result<()> {
    let mut found = [0u8; 8];
    stream.read_exact(&mut found)?;
    if found != MAGIC {
        return Err(Error::InvalidMagic { found });
    }
    Ok(())
}

pub fn write_magic<W: Write>(stream: &mut W) -> Result<()> {
    stream.write_all(&MAGIC)?;
    Ok(())
}

pub fn read_version<R: Read>(stream: &mut R) -> Result<()> {
    let major = stream.read_u16::<LittleEndian>()?;
    let minor = stream.read_u16::<LittleEndian>()?;
    if (major, minor) != VERSION {
        return Err(Error::VersionMismatch { major, minor });
    }
    Ok(())
}

pub fn write_version<W: Write>(stream: &mut W) -> Result<()> {
    stream.write_u16::<LittleEndian>(VERSION.0)?;
    stream.write_u16::<LittleEndian>(VERSION.1)?;
    Ok(())
}

/// Reads a fixed-capacity ASCII field, stripping the trailing NUL padding.
pub(crate) fn read_padded_ascii<R: Read>(stream: &mut R, capacity: usize) -> Result<String> {
    let mut buffer = vec![0u8; capacity];
    stream.read_exact(&mut buffer)?;
    let end = buffer
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    Ok(String::from_utf8_lossy(&buffer[..end]).into_owned())
}

/// Writes `value` into a fixed-capacity ASCII field, NUL-padding the rest.
/// The encoded length must fit the capacity.
pub(crate) fn write_padded_ascii<W: Write>(
    stream: &mut W,
    value: &str,
    capacity: usize,
    field: &'static str,
) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > capacity || !value.is_ascii() {
        return Err(Error::InvalidField(field));
    }
    stream.write_all(bytes)?;
    for _ in bytes.len()..capacity {
        stream.write_u8(0)?;
    }
    Ok(())
}

/// The 168 byte archive header, located immediately after the magic word
/// and version.
///
/// | Offset | Size | Field       | Description |
/// | ------ | ---- | ----------- | ----------- |
/// | 0      | 16   | file_md5    | MD5 over `[180, EOF)`, seeded with the file eigen. |
/// | 16     | 128  | name        | Archive display name, UTF-16 LE, NUL-padded. |
/// | 144    | 16   | toc_md5     | MD5 over `[180, 180 + toc_size)`, seeded with the ToC eigen. |
/// | 160    | 4    | toc_size    | Bytes between offset 180 and the start of the data block. |
/// | 164    | 4    | data_offset | Absolute offset of the data block. |
///
/// The table of contents always starts at offset 180; SGA v2 has no field
/// for it and no data size, the data block runs to end-of-stream.
pub struct ArchiveHeader {
    pub file_md5: [u8; 16],
    pub name: String,
    pub toc_md5: [u8; 16],
    pub toc_size: u32,
    pub data_offset: u32,
}

impl ArchiveHeader {
    pub const SIZE: usize = 168;
    /// Absolute offset of the header itself.
    pub const POS: u64 = 12;
    const NAME_CAPACITY: usize = 128;

    /// Where the table of contents begins. Fixed in SGA v2; there is no
    /// setter on purpose.
    pub fn toc_pos(&self) -> u64 {
        TocHeader::POS
    }

    pub fn read_from<R: Read>(stream: &mut R) -> Result<ArchiveHeader> {
        let mut file_md5 = [0u8; 16];
        stream.read_exact(&mut file_md5)?;

        let mut name_buffer = [0u8; Self::NAME_CAPACITY];
        stream.read_exact(&mut name_buffer)?;
        let units: Vec<u16> = name_buffer
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        let name = String::from_utf16(&units).map_err(|_| Error::InvalidField("name"))?;

        let mut toc_md5 = [0u8; 16];
        stream.read_exact(&mut toc_md5)?;
        let toc_size = stream.read_u32::<LittleEndian>()?;
        let data_offset = stream.read_u32::<LittleEndian>()?;

        Ok(ArchiveHeader {
            file_md5,
            name,
            toc_md5,
            toc_size,
            data_offset,
        })
    }

    pub fn write_to<W: Write>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.file_md5)?;

        let units: Vec<u16> = self.name.encode_utf16().collect();
        if units.len() * 2 > Self::NAME_CAPACITY {
            return Err(Error::InvalidField("name"));
        }
        for unit in &units {
            stream.write_u16::<LittleEndian>(*unit)?;
        }
        for _ in units.len() * 2..Self::NAME_CAPACITY {
            stream.write_u8(0)?;
        }

        stream.write_all(&self.toc_md5)?;
        stream.write_u32::<LittleEndian>(self.toc_size)?;
        stream.write_u32::<LittleEndian>(self.data_offset)?;
        Ok(())
    }
}

/// One `(offset, count)` pair of the ToC header. Offsets are relative to
/// offset 180, counts are entries, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocPointer {
    pub offset: u32,
    pub count: u16,
}

impl TocPointer {
    fn read_from<R: Read>(stream: &mut R) -> Result<TocPointer> {
        Ok(TocPointer {
            offset: stream.read_u32::<LittleEndian>()?,
            count: stream.read_u16::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, stream: &mut W) -> Result<()> {
        stream.write_u32::<LittleEndian>(self.offset)?;
        stream.write_u16::<LittleEndian>(self.count)?;
        Ok(())
    }
}

/// The 24 byte table-of-contents header at offset 180.
///
/// | Offset | Size | Field  |
/// | ------ | ---- | ------ |
/// | 0      | 4+2  | drive pointer |
/// | 6      | 4+2  | folder pointer |
/// | 12     | 4+2  | file pointer |
/// | 18     | 4+2  | name pointer |
///
/// The official packer lays the four sub-blocks out in this order, but
/// readers must not rely on it; fan-made packers reorder them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocHeader {
    pub drive: TocPointer,
    pub folder: TocPointer,
    pub file: TocPointer,
    pub name: TocPointer,
}

impl TocHeader {
    pub const SIZE: usize = 24;
    /// Absolute offset of the ToC header; fixed in SGA v2.
    pub const POS: u64 = 180;

    pub fn read_from<R: Read>(stream: &mut R) -> Result<TocHeader> {
        Ok(TocHeader {
            drive: TocPointer::read_from(stream)?,
            folder: TocPointer::read_from(stream)?,
            file: TocPointer::read_from(stream)?,
            name: TocPointer::read_from(stream)?,
        })
    }

    pub fn write_to<W: Write>(&self, stream: &mut W) -> Result<()> {
        self.drive.write_to(stream)?;
        self.folder.write_to(stream)?;
        self.file.write_to(stream)?;
        self.name.write_to(stream)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn magic_and_version_round_trip() {
        let mut buffer = Vec::new();
        write_magic(&mut buffer).unwrap();
        write_version(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 12);

        let mut cursor = Cursor::new(buffer);
        read_magic(&mut cursor).unwrap();
        read_version(&mut cursor).unwrap();
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cursor = Cursor::new(b"_ARCHIVF....".to_vec());
        assert!(matches!(
            read_magic(&mut cursor),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&5u16.to_le_bytes());
        buffer.extend_from_slice(&0u16.to_le_bytes());
        assert!(matches!(
            read_version(&mut Cursor::new(buffer)),
            Err(Error::VersionMismatch { major: 5, minor: 0 })
        ));
    }

    #[test]
    fn archive_header_round_trips_utf16_name() {
        let header = ArchiveHeader {
            file_md5: [1u8; 16],
            name: "Dawn Of War Test Data".to_string(),
            toc_md5: [2u8; 16],
            toc_size: 1234,
            data_offset: 5678,
        };

        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), ArchiveHeader::SIZE);

        let read = ArchiveHeader::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read.name, header.name);
        assert_eq!(read.file_md5, header.file_md5);
        assert_eq!(read.toc_md5, header.toc_md5);
        assert_eq!(read.toc_size, 1234);
        assert_eq!(read.data_offset, 5678);
    }

    #[test]
    fn oversized_archive_name_is_invalid() {
        let header = ArchiveHeader {
            file_md5: [0u8; 16],
            name: "x".repeat(65),
            toc_md5: [0u8; 16],
            toc_size: 0,
            data_offset: 0,
        };
        assert!(matches!(
            header.write_to(&mut Vec::new()),
            Err(Error::InvalidField("name"))
        ));
    }

    #[test]
    fn toc_header_round_trips() {
        let header = TocHeader {
            drive: TocPointer { offset: 24, count: 1 },
            folder: TocPointer { offset: 162, count: 3 },
            file: TocPointer { offset: 198, count: 2 },
            name: TocPointer { offset: 238, count: 5 },
        };

        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), TocHeader::SIZE);
        assert_eq!(TocHeader::read_from(&mut Cursor::new(buffer)).unwrap(), header);
    }
}

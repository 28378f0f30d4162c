mod error;
mod flags;
mod hash;
mod headers;
mod image;
mod names;
mod packer;
mod parser;
mod rows;
mod writer;

pub use error::{ChecksumKind, Error, Result};
pub use flags::{GameFormat, StorageType};
pub use hash::{Crc32Hasher, Md5Hasher, FILE_MD5_EIGEN, TOC_MD5_EIGEN};
pub use headers::{
    read_magic, read_version, write_magic, write_version, ArchiveHeader, TocHeader, TocPointer,
    MAGIC, VERSION,
};
pub use image::{ArchiveEntry, PayloadReader, SgaArchive};
pub use names::{NameTable, NameWriter};
pub use packer::{TocDisassembler, TocInfo};
pub use parser::SgaParser;
pub use rows::{DriveRow, FileDataHeader, FileRow, FolderRow, TocRow};
pub use writer::SgaSerializer;

pub(crate) use headers::{read_padded_ascii, write_padded_ascii};
pub(crate) use image::unix_now;

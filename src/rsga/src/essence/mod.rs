mod error;
mod fs;
mod node;
pub mod path;

pub use error::{FsError, FsResult};
pub use fs::{FileHandle, FileReader, FileWriter, NodeRef, SetInfo, SgaFs, Stat};
pub use node::{
    ByteWindow, Drive, FileNode, FolderChildren, FolderNode, LazyFile, LazyFolder, MemFile,
    MemFolder,
};

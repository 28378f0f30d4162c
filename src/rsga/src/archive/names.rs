use std::collections::HashMap;

use super::*;

/// The name buffer: concatenated NUL-terminated ASCII strings, referenced
/// from folder and file entries by byte offset. Folder names are full paths
/// from the drive root, stored lowercased with `\` separators; file names
/// are bare basenames.
pub struct NameTable {
    names: HashMap<u32, String>,
    size: u32,
}

impl NameTable {
    /// Indexes every string in the buffer by its starting offset. The
    /// buffer can contain garbage between reachable strings; only offsets
    /// that start a string resolve.
    pub fn parse(blob: &[u8]) -> NameTable {
        let mut names = HashMap::new();
        let mut offset = 0u32;
        for name in blob.split(|&b| b == 0) {
            names.insert(offset, String::from_utf8_lossy(name).into_owned());
            offset += name.len() as u32 + 1;
        }
        NameTable {
            names,
            size: blob.len() as u32,
        }
    }

    pub fn get(&self, offset: u32) -> Result<&str> {
        self.names
            .get(&offset)
            .map(String::as_str)
            .ok_or(Error::NameOffset(offset))
    }

    /// Size of the underlying buffer in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Builds the name buffer for a new archive, reusing offsets for duplicate
/// strings. Callers are expected to hand in names already normalized
/// (lowercase, `\` separators, no alias, no leading root).
pub struct NameWriter {
    offsets: HashMap<String, u32>,
    block: Vec<u8>,
}

impl NameWriter {
    pub fn new() -> NameWriter {
        NameWriter {
            offsets: HashMap::new(),
            block: Vec::new(),
        }
    }

    pub fn write(&mut self, name: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(name) {
            return offset;
        }
        let offset = self.block.len() as u32;
        self.offsets.insert(name.to_string(), offset);
        self.block.extend_from_slice(name.as_bytes());
        self.block.push(0);
        offset
    }

    /// Number of unique strings written so far; this is what the ToC name
    /// pointer counts.
    pub fn count(&self) -> usize {
        self.offsets.len()
    }

    pub fn block(&self) -> &[u8] {
        &self.block
    }
}

impl Default for NameWriter {
    fn default() -> Self {
        NameWriter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_indexes_strings_by_offset() {
        let table = NameTable::parse(b"\0scenarios\0scenarios\\mp\0a.txt\0");
        assert_eq!(table.get(0).unwrap(), "");
        assert_eq!(table.get(1).unwrap(), "scenarios");
        assert_eq!(table.get(11).unwrap(), "scenarios\\mp");
        assert_eq!(table.get(24).unwrap(), "a.txt");
        assert!(matches!(table.get(2), Err(Error::NameOffset(2))));
    }

    #[test]
    fn writer_deduplicates() {
        let mut writer = NameWriter::new();
        let a = writer.write("");
        let b = writer.write("scenarios");
        let c = writer.write("scenarios");
        let d = writer.write("a.txt");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(b, c);
        assert_eq!(d, 11);
        assert_eq!(writer.count(), 3);
        assert_eq!(writer.block(), b"\0scenarios\0a.txt\0");
    }

    #[test]
    fn writer_output_parses_back() {
        let mut writer = NameWriter::new();
        let offsets: Vec<u32> = ["", "art", "art\\units", "mesh.whm"]
            .iter()
            .map(|n| writer.write(n))
            .collect();
        let table = NameTable::parse(writer.block());
        assert_eq!(table.get(offsets[2]).unwrap(), "art\\units");
        assert_eq!(table.get(offsets[3]).unwrap(), "mesh.whm");
    }
}

use std::io::{Read, Seek, SeekFrom};

use md5::{Digest, Md5};

use super::*;

/// Seed absorbed into the file MD5 before any archive bytes.
pub const FILE_MD5_EIGEN: &[u8] = b"E01519D6-2DB7-4640-AF54-0A23319C56C3";
/// Seed absorbed into the ToC MD5 before any archive bytes.
pub const TOC_MD5_EIGEN: &[u8] = b"DFC9AF62-FC1B-4180-BC27-11CCE87D3EFF";

const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming MD5 over a byte range, seeded with one of the two eigen
/// strings so the file and ToC digests cannot be confused for each other.
pub struct Md5Hasher {
    eigen: &'static [u8],
    kind: ChecksumKind,
}

impl Md5Hasher {
    /// Hasher for the whole-file digest (`[180, EOF)`).
    pub fn file() -> Md5Hasher {
        Md5Hasher {
            eigen: FILE_MD5_EIGEN,
            kind: ChecksumKind::FileMd5,
        }
    }

    /// Hasher for the table-of-contents digest (`[180, 180 + toc_size)`).
    pub fn toc() -> Md5Hasher {
        Md5Hasher {
            eigen: TOC_MD5_EIGEN,
            kind: ChecksumKind::TocMd5,
        }
    }

    /// Digest `size` bytes of `stream` starting at `start`, or everything up
    /// to end-of-stream when `size` is `None`.
    pub fn hash<R: Read + Seek>(
        &self,
        stream: &mut R,
        start: u64,
        size: Option<u64>,
    ) -> Result<[u8; 16]> {
        stream.seek(SeekFrom::Start(start))?;

        let mut context = Md5::new();
        context.update(self.eigen);

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut remaining = size;
        loop {
            let want = match remaining {
                Some(0) => break,
                Some(n) => (n as usize).min(CHUNK_SIZE),
                None => CHUNK_SIZE,
            };
            let read = stream.read(&mut chunk[..want])?;
            if read == 0 {
                break;
            }
            context.update(&chunk[..read]);
            if let Some(n) = remaining.as_mut() {
                *n -= read as u64;
            }
        }

        Ok(context.finalize().into())
    }

    pub fn check<R: Read + Seek>(
        &self,
        stream: &mut R,
        start: u64,
        size: Option<u64>,
        expected: &[u8; 16],
    ) -> Result<bool> {
        Ok(self.hash(stream, start, size)? == *expected)
    }

    pub fn validate<R: Read + Seek>(
        &self,
        stream: &mut R,
        start: u64,
        size: Option<u64>,
        expected: &[u8; 16],
    ) -> Result<()> {
        let actual = self.hash(stream, start, size)?;
        if actual == *expected {
            return Ok(());
        }
        let end = match size {
            Some(n) => start + n,
            None => stream.seek(SeekFrom::End(0))?,
        };
        Err(Error::ChecksumMismatch {
            kind: self.kind,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            range: start..end,
        })
    }
}

/// Standard IEEE CRC32, exposed with the same hash/check/validate trio.
pub struct Crc32Hasher;

impl Crc32Hasher {
    pub fn hash(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// CRC of everything the reader yields; reads are chunked so compressed
    /// payloads never have to be buffered whole.
    pub fn hash_stream<R: Read>(stream: &mut R) -> Result<(u32, u64)> {
        let mut hasher = crc32fast::Hasher::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = stream.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
            total += read as u64;
        }
        Ok((hasher.finalize(), total))
    }

    pub fn check<R: Read>(stream: &mut R, expected: u32) -> Result<bool> {
        Ok(Crc32Hasher::hash_stream(stream)?.0 == expected)
    }

    pub fn validate<R: Read>(stream: &mut R, expected: u32) -> Result<()> {
        let (actual, total) = Crc32Hasher::hash_stream(stream)?;
        if actual == expected {
            return Ok(());
        }
        Err(Error::ChecksumMismatch {
            kind: ChecksumKind::FileCrc32,
            expected: expected.to_le_bytes().to_vec(),
            actual: actual.to_le_bytes().to_vec(),
            range: 0..total,
        })
    }
}

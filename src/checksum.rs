//! SHA-1 checksums over byte ranges of a file.
//!
//! The storage service identifies both whole files and individual parts of a
//! multipart upload by their SHA-1 digest. Ranges are streamed through the
//! hasher in fixed 16 KiB blocks so memory use does not depend on part size.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::planner::ByteRange;

/// Block size used when streaming a range through the hasher.
pub const CHECKSUM_BLOCK_SIZE: usize = 16 * 1024;

/// Hex-encoded SHA-1 of `range` read from `source`.
///
/// Seeks to `range.start` and reads exactly `range.len()` bytes. The cursor of
/// `source` is left wherever hashing stopped. Hitting EOF before `range.end`
/// is an `UnexpectedEof` I/O error.
pub fn sha1_range<R: Read + Seek>(source: &mut R, range: ByteRange) -> std::io::Result<String> {
    source.seek(SeekFrom::Start(range.start))?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHECKSUM_BLOCK_SIZE];
    let mut remaining = range.len();

    while remaining > 0 {
        let want = remaining.min(CHECKSUM_BLOCK_SIZE as u64) as usize;
        let n = source.read(&mut buf[..want])?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended {} bytes before byte {}",
                    remaining, range.end
                ),
            ));
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-1 of an in-memory buffer.
pub fn sha1_bytes(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Hex-encoded SHA-1 of `range` of the file at `path`.
pub fn sha1_file_range(path: &Path, range: ByteRange) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })?;
    Ok(sha1_range(&mut file, range)?)
}

/// Hex-encoded SHA-1 of the whole file at `path`.
///
/// An empty file hashes to the digest of the empty string.
pub fn sha1_file(path: &Path) -> Result<String> {
    let size = std::fs::metadata(path)?.len();
    match ByteRange::covering(size) {
        Some(range) => sha1_file_range(path, range),
        None => Ok(sha1_bytes(&[])),
    }
}

/// Async wrapper running [`sha1_file_range`] on the blocking pool.
pub async fn sha1_file_range_blocking(path: PathBuf, range: ByteRange) -> Result<String> {
    tokio::task::spawn_blocking(move || sha1_file_range(&path, range))
        .await
        .map_err(|e| Error::Other(format!("checksum task failed: {}", e)))?
}

/// Async wrapper running [`sha1_file`] on the blocking pool.
pub async fn sha1_file_blocking(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || sha1_file(&path))
        .await
        .map_err(|e| Error::Other(format!("checksum task failed: {}", e)))?
}

//! Reassembly of downloaded parts.
//!
//! Downloads never write `destination` directly. Everything lands in the
//! scratch directory first and is renamed into place only once it is
//! complete, so a failed transfer leaves an existing destination untouched.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

use super::part_path;

/// File inside `scratch` that parts are appended to before the final rename
pub fn assembled_path(scratch: &Path) -> PathBuf {
    scratch.join("assembled")
}

/// Append part files `0..part_count` from `scratch` into [`assembled_path`]
///
/// The order parts finished downloading is irrelevant. Returns the assembled
/// file and the number of bytes written.
pub async fn assemble_parts(scratch: &Path, part_count: usize) -> Result<(PathBuf, u64)> {
    let assembled = assembled_path(scratch);
    let mut output = tokio::fs::File::create(&assembled).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create '{}': {}", assembled.display(), e),
        ))
    })?;

    let mut total = 0u64;
    for index in 0..part_count {
        let path = part_path(scratch, index);
        let mut part = tokio::fs::File::open(&path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Missing part file '{}': {}", path.display(), e),
            ))
        })?;
        total += tokio::io::copy(&mut part, &mut output).await?;
    }
    output.flush().await?;
    output.sync_all().await?;

    tracing::debug!(scratch = %scratch.display(), parts = part_count, bytes = total, "Parts assembled");
    Ok((assembled, total))
}

/// Rename the finished file `staged` onto `destination` and drop the scratch directory
///
/// `staged` lives inside `scratch`, a sibling of `destination`, so the rename
/// stays on one filesystem and replaces any previous file in one step.
pub async fn promote(scratch: &Path, staged: &Path, destination: &Path) -> Result<()> {
    tokio::fs::rename(staged, destination).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to move '{}' to '{}': {}",
                staged.display(),
                destination.display(),
                e
            ),
        ))
    })?;
    remove_scratch(scratch).await
}

/// Reassemble parts `0..part_count` from `scratch` into `destination` in index order
///
/// The scratch directory is removed afterwards. Returns the number of bytes
/// written.
pub async fn coalesce_parts(scratch: &Path, part_count: usize, destination: &Path) -> Result<u64> {
    let (assembled, total) = assemble_parts(scratch, part_count).await?;
    promote(scratch, &assembled, destination).await?;

    tracing::debug!(destination = %destination.display(), parts = part_count, bytes = total, "Parts coalesced");
    Ok(total)
}

/// Remove the scratch directory and every part file in it
///
/// A directory that was never created is not an error.
pub async fn remove_scratch(scratch: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(scratch).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to remove scratch directory '{}': {}",
                scratch.display(),
                e
            ),
        ))),
    }
}

//! Download of one byte range of a remote file into a scratch part file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result, TransferError};
use crate::planner::ByteRange;
use crate::retry::with_retry;
use crate::types::{Direction, Event};

use super::{PartOutput, TaskContext};

/// Scratch directory holding the parts of `destination`: `<destination>.download`
pub fn scratch_dir_for(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".download");
    PathBuf::from(name)
}

/// Part file for `index` inside `scratch`
pub fn part_path(scratch: &Path, index: usize) -> PathBuf {
    scratch.join(format!("{}.part", index))
}

/// Create the scratch directory if missing
///
/// An existing directory is fine (sibling parts race to create it); an
/// existing non-directory at that path is fatal.
pub(crate) async fn ensure_scratch_dir(scratch: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(scratch).await {
        Ok(()) => Ok(()),
        Err(e) => match tokio::fs::metadata(scratch).await {
            Ok(meta) if !meta.is_dir() => Err(TransferError::ScratchNotDirectory {
                path: scratch.to_path_buf(),
            }
            .into()),
            _ => Err(Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create scratch directory '{}': {}",
                    scratch.display(),
                    e
                ),
            ))),
        },
    }
}

/// Downloads `range` of remote `file_id` into part file `index` next to `destination`
pub struct DownloadPartTask {
    ctx: Arc<TaskContext>,
    file_id: String,
    destination: PathBuf,
    range: ByteRange,
    index: usize,
}

impl DownloadPartTask {
    /// Create a task for one planned range
    pub fn new(
        ctx: Arc<TaskContext>,
        file_id: impl Into<String>,
        destination: impl Into<PathBuf>,
        range: ByteRange,
        index: usize,
    ) -> Self {
        Self {
            ctx,
            file_id: file_id.into(),
            destination: destination.into(),
            range,
            index,
        }
    }

    /// Position in the part sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Range of the remote file this part covers
    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub(crate) async fn run(&self) -> Result<PartOutput> {
        let result = self.download().await;

        match &result {
            Ok(_) => self.ctx.emit(Event::PartCompleted {
                direction: Direction::Download,
                index: self.index,
                bytes: self.range.len(),
            }),
            Err(e) => self.ctx.emit(Event::PartFailed {
                direction: Direction::Download,
                index: self.index,
                error: e.to_string(),
            }),
        }
        result
    }

    async fn download(&self) -> Result<PartOutput> {
        let scratch = scratch_dir_for(&self.destination);
        ensure_scratch_dir(&scratch).await?;
        let part_file = part_path(&scratch, self.index);

        tracing::debug!(
            file_id = %self.file_id,
            part = self.index,
            range = %self.range,
            "Downloading part"
        );

        let api = &self.ctx.api;
        let session = self.ctx.session.as_ref();
        let file_id = self.file_id.as_str();
        let range = self.range;
        let target = part_file.as_path();

        let written = with_retry(&self.ctx.retry, || async move {
            api.download_range(session, file_id, range, target).await
        })
        .await?;

        if written != range.len() {
            return Err(TransferError::ShortPart {
                index: self.index,
                expected: range.len(),
                actual: written,
            }
            .into());
        }

        tracing::debug!(file_id = %self.file_id, part = self.index, bytes = written, "Part downloaded");
        Ok(PartOutput::Downloaded { bytes: written })
    }
}

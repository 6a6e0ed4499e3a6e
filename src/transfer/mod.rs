//! Part tasks for multipart transfers.
//!
//! Split into focused submodules:
//! - [`context`] - Shared, read-only state every part task of one transfer sees
//! - [`upload_part`] - Checksum one byte range and upload it with retry
//! - [`download_part`] - Fetch one byte range into the scratch directory with retry
//! - [`coalesce`] - Reassemble downloaded parts in index order and clean up
//!
//! The two task kinds form a closed set ([`PartTask`]) dispatched through the
//! [`Task`] trait, so the worker pool never needs to know which kind it runs.

pub mod coalesce;
mod context;
mod download_part;
mod upload_part;


pub use context::TaskContext;
pub use download_part::{DownloadPartTask, part_path, scratch_dir_for};
pub(crate) use download_part::ensure_scratch_dir;
pub use upload_part::UploadPartTask;

use crate::error::Result;
use crate::pool::Task;

/// One part of a multipart transfer
pub enum PartTask {
    /// Upload a byte range of a local file
    Upload(UploadPartTask),
    /// Download a byte range of a remote file
    Download(DownloadPartTask),
}

/// Result of a finished part
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartOutput {
    /// Part stored by the service under this SHA-1
    Uploaded {
        /// Hex SHA-1 of the part
        sha1: String,
    },
    /// Part written to its scratch file
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
}

impl PartOutput {
    /// SHA-1 of an uploaded part
    pub fn sha1(&self) -> Option<&str> {
        match self {
            PartOutput::Uploaded { sha1 } => Some(sha1),
            PartOutput::Downloaded { .. } => None,
        }
    }
}

#[async_trait::async_trait]
impl Task for PartTask {
    type Output = PartOutput;

    fn index(&self) -> usize {
        match self {
            PartTask::Upload(task) => task.index(),
            PartTask::Download(task) => task.index(),
        }
    }

    async fn run(&self) -> Result<PartOutput> {
        match self {
            PartTask::Upload(task) => task.run().await,
            PartTask::Download(task) => task.run().await,
        }
    }
}

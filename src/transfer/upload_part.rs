//! Upload of one byte range of a local file as a large-file part.

use std::path::PathBuf;
use std::sync::Arc;

use crate::checksum::sha1_file_range_blocking;
use crate::error::Result;
use crate::planner::ByteRange;
use crate::retry::with_retry;
use crate::types::{Direction, Event};

use super::{PartOutput, TaskContext};

/// Uploads `range` of `source` as part `index + 1` of large file `file_id`
pub struct UploadPartTask {
    ctx: Arc<TaskContext>,
    file_id: String,
    source: PathBuf,
    range: ByteRange,
    index: usize,
}

impl UploadPartTask {
    /// Create a task for one planned range
    pub fn new(
        ctx: Arc<TaskContext>,
        file_id: impl Into<String>,
        source: impl Into<PathBuf>,
        range: ByteRange,
        index: usize,
    ) -> Self {
        Self {
            ctx,
            file_id: file_id.into(),
            source: source.into(),
            range,
            index,
        }
    }

    /// Position in the part sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Range of the source file this part covers
    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub(crate) async fn run(&self) -> Result<PartOutput> {
        let result = self.upload().await;

        match &result {
            Ok(_) => self.ctx.emit(Event::PartCompleted {
                direction: Direction::Upload,
                index: self.index,
                bytes: self.range.len(),
            }),
            Err(e) => self.ctx.emit(Event::PartFailed {
                direction: Direction::Upload,
                index: self.index,
                error: e.to_string(),
            }),
        }
        result
    }

    async fn upload(&self) -> Result<PartOutput> {
        // The range never changes between attempts, so hash it once.
        let sha1 = sha1_file_range_blocking(self.source.clone(), self.range).await?;
        let part_number = self.index + 1;

        tracing::debug!(
            file_id = %self.file_id,
            part = part_number,
            range = %self.range,
            sha1 = %sha1,
            "Uploading part"
        );

        let api = &self.ctx.api;
        let session = self.ctx.session.as_ref();
        let file_id = self.file_id.as_str();
        let source = self.source.as_path();
        let range = self.range;
        let local_sha1 = sha1.as_str();

        // A part URL may be single-use, so every attempt asks for a fresh one.
        let response = with_retry(&self.ctx.retry, || async move {
            let target = api.get_upload_part_url(session, file_id).await?;
            api.upload_part(&target, source, range, part_number, local_sha1)
                .await
        })
        .await?;

        let sha1 = if response.content_sha1.is_empty() {
            sha1
        } else {
            if response.content_sha1 != sha1 {
                tracing::warn!(
                    part = part_number,
                    local = %sha1,
                    remote = %response.content_sha1,
                    "Service reported a different part checksum"
                );
            }
            response.content_sha1
        };

        tracing::debug!(file_id = %self.file_id, part = part_number, "Part uploaded");
        Ok(PartOutput::Uploaded { sha1 })
    }
}

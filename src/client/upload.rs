//! Upload orchestration.

use std::path::Path;
use std::sync::Arc;

use crate::checksum::sha1_file_blocking;
use crate::error::{Error, Result};
use crate::planner::{TransferPlan, choose_part_ranges};
use crate::pool::WorkerPool;
use crate::retry::with_retry;
use crate::transfer::{PartOutput, PartTask, UploadPartTask};
use crate::types::{Direction, Event, FileInfo};

use super::Blazer;

impl Blazer {
    /// Upload `local_path` to `bucket` as `remote_name`
    ///
    /// Files under the large-file threshold go up in a single request. Larger
    /// files are split into parts uploaded by `threads` concurrent workers and
    /// committed only if every part succeeded; a failed part leaves nothing
    /// committed.
    pub async fn upload_file(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_name: &str,
        content_type: &str,
        threads: Option<usize>,
    ) -> Result<FileInfo> {
        let threads = self.resolve_threads(threads)?;

        let result = self
            .run_upload(bucket, local_path, remote_name, content_type, threads)
            .await;

        match &result {
            Ok(info) => {
                tracing::info!(file_id = %info.file_id, name = %remote_name, "Upload complete");
                self.emit_event(Event::TransferComplete {
                    direction: Direction::Upload,
                    file_id: info.file_id.clone(),
                    path: local_path.to_path_buf(),
                });
            }
            Err(e) => {
                tracing::error!(name = %remote_name, error = %e, "Upload failed");
                self.emit_event(Event::TransferFailed {
                    direction: Direction::Upload,
                    name: remote_name.to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn run_upload(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_name: &str,
        content_type: &str,
        threads: usize,
    ) -> Result<FileInfo> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to stat '{}': {}", local_path.display(), e),
                ))
            })?
            .len();
        let bucket_id = self.bucket_id(bucket).await?;

        if size < self.config.transfer.large_file_threshold() {
            self.upload_small(&bucket_id, local_path, remote_name, content_type, size)
                .await
        } else {
            self.upload_large(&bucket_id, local_path, remote_name, content_type, size, threads)
                .await
        }
    }

    async fn upload_small(
        &self,
        bucket_id: &str,
        local_path: &Path,
        remote_name: &str,
        content_type: &str,
        size: u64,
    ) -> Result<FileInfo> {
        self.emit_event(Event::TransferStarted {
            direction: Direction::Upload,
            name: remote_name.to_string(),
            total_bytes: size,
            parts: 1,
        });

        let sha1 = sha1_file_blocking(local_path.to_path_buf()).await?;
        tracing::debug!(name = %remote_name, bytes = size, sha1 = %sha1, "Uploading file");

        let api = &self.api;
        let session = self.session.as_ref();
        let sha1 = sha1.as_str();
        with_retry(&self.config.retry, || async move {
            let target = api.get_upload_url(session, bucket_id).await?;
            api.upload_file(&target, local_path, remote_name, content_type, sha1)
                .await
        })
        .await
    }

    async fn upload_large(
        &self,
        bucket_id: &str,
        local_path: &Path,
        remote_name: &str,
        content_type: &str,
        size: u64,
        threads: usize,
    ) -> Result<FileInfo> {
        // Phase 1: Open the large file and plan its parts
        let started = self
            .api
            .start_large_file(&self.session, bucket_id, remote_name, content_type)
            .await?;
        let file_id = started.file_id;
        let plan = choose_part_ranges(
            size,
            self.config.transfer.min_part_size,
            self.config.transfer.max_parts,
        );

        tracing::info!(
            file_id = %file_id,
            name = %remote_name,
            bytes = size,
            parts = plan.len(),
            threads,
            "Starting multipart upload"
        );
        self.emit_event(Event::TransferStarted {
            direction: Direction::Upload,
            name: remote_name.to_string(),
            total_bytes: size,
            parts: plan.len(),
        });

        // Phase 2: Upload every part through the pool
        let part_sha1s = match self.upload_parts(&file_id, local_path, &plan, threads).await {
            Ok(sha1s) => sha1s,
            Err(e) => {
                // Phase 3 (failure): nothing is committed; release the parts stored so far
                if let Err(cancel) = self.api.cancel_large_file(&self.session, &file_id).await {
                    tracing::warn!(file_id = %file_id, error = %cancel, "Failed to cancel large file");
                }
                return Err(e);
            }
        };

        // Phase 3: Commit only if every part made it
        self.api
            .finish_large_file(&self.session, &file_id, &part_sha1s)
            .await
    }

    /// Run one upload task per planned range; part checksums come back in part order
    async fn upload_parts(
        &self,
        file_id: &str,
        local_path: &Path,
        plan: &TransferPlan,
        threads: usize,
    ) -> Result<Vec<String>> {
        let ctx = self.task_context();
        let mut pool = WorkerPool::new(threads.min(plan.len()));
        for (index, range) in plan.iter() {
            let task = UploadPartTask::new(Arc::clone(&ctx), file_id, local_path, range, index);
            if let Err(e) = pool.submit(PartTask::Upload(task)) {
                pool.stop_now().await;
                return Err(e);
            }
        }
        let report = pool.drain_and_wait().await;

        report
            .into_outputs()?
            .into_iter()
            .map(|output| match output {
                PartOutput::Uploaded { sha1 } => Ok(sha1),
                PartOutput::Downloaded { .. } => Err(Error::Other(
                    "upload part produced a download result".to_string(),
                )),
            })
            .collect()
    }
}

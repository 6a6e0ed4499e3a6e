//! Download orchestration.
//!
//! Every download is fetched into `<destination>.download/` and renamed onto
//! `destination` only after it passed the length and checksum checks. A failed
//! download removes the scratch directory and leaves `destination` as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum::sha1_file_blocking;
use crate::error::{Result, TransferError};
use crate::planner::choose_part_ranges;
use crate::pool::WorkerPool;
use crate::retry::with_retry;
use crate::transfer::coalesce::{assemble_parts, promote, remove_scratch};
use crate::transfer::{
    DownloadPartTask, PartTask, ensure_scratch_dir, part_path, scratch_dir_for,
};
use crate::types::{Direction, Event, FileInfo};

use super::Blazer;

impl Blazer {
    /// Download file `file_id` to `destination`
    ///
    /// Files under the large-file threshold come down in a single request.
    /// Larger files are fetched as ranged parts by `threads` concurrent workers
    /// into `<destination>.download/`, then reassembled in part order. On any
    /// failure the scratch directory is removed and `destination` is not
    /// touched.
    pub async fn download_file_by_id(
        &self,
        file_id: &str,
        destination: &Path,
        threads: Option<usize>,
    ) -> Result<FileInfo> {
        let threads = self.resolve_threads(threads)?;

        let result = match self.get_file_info(file_id).await {
            Ok(info) => self
                .run_download(&info, destination, threads)
                .await
                .map(|()| info),
            Err(e) => Err(e),
        };
        self.report_download(file_id, destination, &result);
        result
    }

    /// Download a file whose metadata was already fetched with [`Blazer::get_file_info`]
    ///
    /// Same transfer as [`Blazer::download_file_by_id`] without the metadata
    /// request.
    pub async fn download_file(
        &self,
        info: &FileInfo,
        destination: &Path,
        threads: Option<usize>,
    ) -> Result<()> {
        let threads = self.resolve_threads(threads)?;

        let result = self.run_download(info, destination, threads).await;
        self.report_download(&info.file_id, destination, &result);
        result
    }

    fn report_download<T>(&self, file_id: &str, destination: &Path, result: &Result<T>) {
        match result {
            Ok(_) => {
                tracing::info!(file_id = %file_id, path = %destination.display(), "Download complete");
                self.emit_event(Event::TransferComplete {
                    direction: Direction::Download,
                    file_id: file_id.to_string(),
                    path: destination.to_path_buf(),
                });
            }
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Download failed");
                self.emit_event(Event::TransferFailed {
                    direction: Direction::Download,
                    name: file_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Download the latest version of `bucket/remote_name` in a single request
    ///
    /// Returns the number of bytes written. A failed download leaves
    /// `destination` untouched.
    pub async fn download_file_by_name(
        &self,
        bucket: &str,
        remote_name: &str,
        destination: &Path,
    ) -> Result<u64> {
        let scratch = scratch_dir_for(destination);
        ensure_scratch_dir(&scratch).await?;

        let fetched = self.fetch_by_name(bucket, remote_name, &scratch).await;
        let written = settle(&scratch, destination, fetched).await?;

        tracing::info!(bucket, name = %remote_name, bytes = written, "Download complete");
        Ok(written)
    }

    async fn fetch_by_name(
        &self,
        bucket: &str,
        remote_name: &str,
        scratch: &Path,
    ) -> Result<(PathBuf, u64)> {
        let staged = part_path(scratch, 0);

        let api = &self.api;
        let session = self.session.as_ref();
        let target = staged.as_path();
        let written = with_retry(&self.config.retry, || async move {
            api.download_by_name(session, bucket, remote_name, target)
                .await
        })
        .await?;

        Ok((staged, written))
    }

    async fn run_download(&self, info: &FileInfo, destination: &Path, threads: usize) -> Result<()> {
        let scratch = scratch_dir_for(destination);
        ensure_scratch_dir(&scratch).await?;

        let fetched = self
            .fetch_by_id(info, destination, &scratch, threads)
            .await
            .map(|staged| (staged, ()));
        settle(&scratch, destination, fetched).await
    }

    /// Fetch and verify the whole file inside `scratch`; returns the finished file
    async fn fetch_by_id(
        &self,
        info: &FileInfo,
        destination: &Path,
        scratch: &Path,
        threads: usize,
    ) -> Result<PathBuf> {
        let staged = if info.content_length < self.config.transfer.large_file_threshold() {
            self.download_small(info, scratch).await?
        } else {
            self.download_large(info, destination, scratch, threads)
                .await?
        };

        if let Some(expected) = info.known_sha1() {
            verify_sha1(&staged, destination, expected).await?;
        }
        Ok(staged)
    }

    async fn download_small(&self, info: &FileInfo, scratch: &Path) -> Result<PathBuf> {
        self.emit_event(Event::TransferStarted {
            direction: Direction::Download,
            name: info.file_name.clone(),
            total_bytes: info.content_length,
            parts: 1,
        });

        let staged = part_path(scratch, 0);
        let api = &self.api;
        let session = self.session.as_ref();
        let file_id = info.file_id.as_str();
        let target = staged.as_path();
        let written = with_retry(&self.config.retry, || async move {
            api.download(session, file_id, target).await
        })
        .await?;

        if written != info.content_length {
            return Err(TransferError::ShortPart {
                index: 0,
                expected: info.content_length,
                actual: written,
            }
            .into());
        }
        Ok(staged)
    }

    async fn download_large(
        &self,
        info: &FileInfo,
        destination: &Path,
        scratch: &Path,
        threads: usize,
    ) -> Result<PathBuf> {
        // Phase 1: Plan the parts
        let plan = choose_part_ranges(
            info.content_length,
            self.config.transfer.min_part_size,
            self.config.transfer.max_parts,
        );

        tracing::info!(
            file_id = %info.file_id,
            bytes = info.content_length,
            parts = plan.len(),
            threads,
            "Starting multipart download"
        );
        self.emit_event(Event::TransferStarted {
            direction: Direction::Download,
            name: info.file_name.clone(),
            total_bytes: info.content_length,
            parts: plan.len(),
        });

        // Phase 2: Fetch every part through the pool
        let ctx = self.task_context();
        let mut pool = WorkerPool::new(threads.min(plan.len()));
        for (index, range) in plan.iter() {
            let task =
                DownloadPartTask::new(Arc::clone(&ctx), &info.file_id, destination, range, index);
            if let Err(e) = pool.submit(PartTask::Download(task)) {
                pool.stop_now().await;
                return Err(e);
            }
        }
        let report = pool.drain_and_wait().await;

        // Phase 3: Reassemble in part order, still inside the scratch directory
        report.into_outputs()?;
        let (assembled, _) = assemble_parts(scratch, plan.len()).await?;
        Ok(assembled)
    }
}

/// Move a fetched file onto `destination`, or drop the scratch directory on failure
async fn settle<T>(
    scratch: &Path,
    destination: &Path,
    fetched: Result<(PathBuf, T)>,
) -> Result<T> {
    match fetched {
        Ok((staged, value)) => match promote(scratch, &staged, destination).await {
            Ok(()) => Ok(value),
            Err(e) => {
                discard_scratch(scratch).await;
                Err(e)
            }
        },
        Err(e) => {
            discard_scratch(scratch).await;
            Err(e)
        }
    }
}

async fn discard_scratch(scratch: &Path) {
    if let Err(e) = remove_scratch(scratch).await {
        tracing::warn!(error = %e, "Failed to clean up scratch directory");
    }
}

/// Check the fetched file against the SHA-1 the service reported
async fn verify_sha1(staged: &Path, destination: &Path, expected: &str) -> Result<()> {
    let actual = sha1_file_blocking(staged.to_path_buf()).await?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }

    Err(TransferError::ChecksumMismatch {
        path: destination.to_path_buf(),
        expected: expected.to_string(),
        actual,
    }
    .into())
}

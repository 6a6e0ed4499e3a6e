//! Core types for blazer
//!
//! Wire types mirror the storage service's JSON documents (camelCase keys).
//! [`Event`] is the progress stream published by [`crate::Blazer::subscribe`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Response of `b2_authorize_account`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeAccountResponse {
    /// Account the key belongs to
    pub account_id: String,
    /// Token for all further API calls
    pub authorization_token: String,
    /// Base URL for API calls
    pub api_url: String,
    /// Base URL for downloads
    pub download_url: String,
    /// Part size the service recommends for large files
    #[serde(default)]
    pub recommended_part_size: Option<u64>,
    /// Smallest part the service accepts
    #[serde(default)]
    pub absolute_minimum_part_size: Option<u64>,
}

/// Bucket metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket id
    pub bucket_id: String,
    /// Bucket name
    pub bucket_name: String,
    /// `allPublic`, `allPrivate`, ...
    #[serde(default)]
    pub bucket_type: String,
}

/// Response of `b2_list_buckets`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListBucketsResponse {
    /// Buckets visible to the account
    pub buckets: Vec<Bucket>,
}

/// Metadata of a stored file (one version)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// File (version) id
    pub file_id: String,
    /// Full file name within the bucket
    pub file_name: String,
    /// Bucket holding the file
    #[serde(default)]
    pub bucket_id: String,
    /// Size in bytes
    pub content_length: u64,
    /// SHA-1 of the whole file; `"none"` for files stored as multipart
    #[serde(default)]
    pub content_sha1: Option<String>,
    /// MIME type
    #[serde(default)]
    pub content_type: Option<String>,
    /// `upload`, `start`, `hide`, ...
    #[serde(default)]
    pub action: Option<String>,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub upload_timestamp: Option<i64>,
    /// Custom `X-Bz-Info-*` metadata
    #[serde(default)]
    pub file_info: HashMap<String, String>,
}

impl FileInfo {
    /// Whole-file SHA-1 if the service knows it
    ///
    /// Multipart files report `"none"`; large-file SHA-1s set by the uploader
    /// live under `large_file_sha1` in the custom metadata.
    pub fn known_sha1(&self) -> Option<&str> {
        match self.content_sha1.as_deref() {
            Some(sha1) if !sha1.is_empty() && sha1 != "none" => {
                Some(sha1.strip_prefix("unverified:").unwrap_or(sha1))
            }
            _ => self.file_info.get("large_file_sha1").map(String::as_str),
        }
    }
}

/// Short-lived upload target for a whole file or for the parts of one large file
///
/// Obtained per attempt and never reused across parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrl {
    /// Bucket id (whole-file uploads) or large file id (part uploads)
    #[serde(alias = "bucketId", alias = "fileId")]
    pub target_id: String,
    /// URL to POST the bytes to
    pub upload_url: String,
    /// Token valid for this URL only
    pub authorization_token: String,
}

/// Response of `b2_upload_part`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartResponse {
    /// Large file the part belongs to
    pub file_id: String,
    /// 1-based part number
    pub part_number: u32,
    /// Bytes received
    pub content_length: u64,
    /// SHA-1 the service computed for the part
    pub content_sha1: String,
}

/// Which way a transfer moves bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local file to the bucket
    Upload,
    /// Bucket to local file
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Event emitted during a transfer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Transfer planned and about to start
    TransferStarted {
        /// Upload or download
        direction: Direction,
        /// Remote file name (or id for downloads by id)
        name: String,
        /// Total bytes to move
        total_bytes: u64,
        /// Number of parts (1 for the unsplit path)
        parts: usize,
    },

    /// One part finished successfully
    PartCompleted {
        /// Upload or download
        direction: Direction,
        /// Part index (0-based)
        index: usize,
        /// Bytes in the part
        bytes: u64,
    },

    /// One part gave up after its retries
    PartFailed {
        /// Upload or download
        direction: Direction,
        /// Part index (0-based)
        index: usize,
        /// Error message
        error: String,
    },

    /// Transfer committed (upload) or reassembled (download)
    TransferComplete {
        /// Upload or download
        direction: Direction,
        /// Remote file id
        file_id: String,
        /// Local file involved
        path: PathBuf,
    },

    /// Transfer failed as a whole; nothing was committed or reassembled
    TransferFailed {
        /// Upload or download
        direction: Direction,
        /// Remote file name (or id)
        name: String,
        /// Error message
        error: String,
    },
}

//! # blazer
//!
//! Client library and command-line tool for B2 cloud object storage, built
//! around a parallel multipart transfer engine.
//!
//! ## How transfers work
//!
//! - Files under `2 * min_part_size` move in a single request.
//! - Larger files are split into contiguous byte ranges, one per part. A
//!   fixed pool of workers moves the parts concurrently; each part is SHA-1
//!   checksummed and retried on 5xx responses.
//! - An upload is committed only if every part succeeded. A download is
//!   reassembled in part order only if every part succeeded; otherwise its
//!   scratch files are removed.
//! - The authorization session is cached on disk for a day and shared
//!   read-only by every part of a transfer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blazer::{Blazer, Config, Credentials};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Blazer::connect(Config::default(), Credentials::discover(None)?).await?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let info = client
//!         .upload_file("backups", Path::new("db.tar"), "db.tar", "b2/x-auto", Some(8))
//!         .await?;
//!     println!("uploaded {}", info.file_id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Storage service REST client
pub mod api;
/// SHA-1 checksums over file ranges
pub mod checksum;
/// Top-level client and transfer orchestration
pub mod client;
/// Configuration types
pub mod config;
/// Account credentials file
pub mod credentials;
/// Error types
pub mod error;
/// Byte-range planning for multipart transfers
pub mod planner;
/// Fixed-size worker pool
pub mod pool;
/// Retry logic with linear backoff
pub mod retry;
/// Authorization session cache
pub mod session;
/// Upload and download part tasks
pub mod transfer;
/// Wire types and events
pub mod types;

// Re-export commonly used types
pub use api::ApiClient;
pub use client::Blazer;
pub use config::{ApiConfig, Config, RetryConfig, SessionConfig, TransferConfig};
pub use credentials::Credentials;
pub use error::{ApiError, Error, Result, TransferError};
pub use planner::{ByteRange, MAX_FILE_PARTS, MINIMUM_PART_SIZE_BYTES, TransferPlan};
pub use pool::{PoolReport, Task, TaskOutcome, WorkerPool};
pub use session::{SessionCache, SessionContext};
pub use types::{Bucket, Direction, Event, FileInfo};

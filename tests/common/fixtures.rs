//! Client fixtures and test content generators

use std::path::{Path, PathBuf};
use std::time::Duration;

use blazer::{Blazer, Config, Credentials, RetryConfig, SessionContext, TransferConfig};
use tempfile::TempDir;
use wiremock::MockServer;

/// Part size used by integration tests; files of `2 * TEST_MIN_PART_SIZE` or more go multipart
pub const TEST_MIN_PART_SIZE: u64 = 1_000;

/// Deterministic pseudo-random content of `len` bytes
pub fn generate_content(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

/// Write `data` to `name` inside `dir`
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

/// Config with small parts and millisecond retry delays
pub fn test_config(temp_dir: &TempDir, threads: usize) -> Config {
    let mut config = Config::default();
    config.transfer = TransferConfig {
        threads,
        min_part_size: TEST_MIN_PART_SIZE,
        max_parts: 10_000,
    };
    config.retry = RetryConfig {
        max_attempts: 5,
        delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter: false,
    };
    config.session.cache_path = temp_dir.path().join("session");
    config
}

/// Client talking to `server` with an already known session
pub fn create_test_client(server: &MockServer, temp_dir: &TempDir, threads: usize) -> Blazer {
    let session = SessionContext::new(
        "test-account-token",
        server.uri(),
        server.uri(),
        chrono::Utc::now().timestamp(),
    );
    Blazer::with_session(
        test_config(temp_dir, threads),
        Credentials::new("test-account", "test-key"),
        session,
    )
    .unwrap_or_else(|e| panic!("client: {}", e))
}

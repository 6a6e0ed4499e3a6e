//! HTTP client for the storage service REST API
//!
//! Thin wrappers over the `/b2api/v2` calls the transfer engine needs. Every
//! non-2xx response is turned into [`Error::Api`] carrying the service's
//! `{status, code, message}` document, so callers can classify it with
//! [`crate::retry::IsRetryable`].
//!
//! Request bodies for uploads and response bodies for downloads are streamed;
//! no part is ever held in memory as a whole.

use std::path::Path;

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::config::ApiConfig;
use crate::credentials::Credentials;
use crate::error::{ApiError, Error, Result};
use crate::planner::ByteRange;
use crate::session::SessionContext;
use crate::types::{
    AuthorizeAccountResponse, Bucket, FileInfo, ListBucketsResponse, UploadPartResponse, UploadUrl,
};

/// Path prefix of every API call
pub const API_PATH: &str = "/b2api/v2";

const HEADER_FILE_NAME: &str = "X-Bz-File-Name";
const HEADER_CONTENT_SHA1: &str = "X-Bz-Content-Sha1";
const HEADER_PART_NUMBER: &str = "X-Bz-Part-Number";

/// Client for the storage service
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    auth_url: String,
}

impl ApiClient {
    /// Build a client from the API section of the config
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange account credentials for a token and base URLs
    pub async fn authorize_account(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthorizeAccountResponse> {
        let url = format!("{}{}/b2_authorize_account", self.auth_url, API_PATH);
        tracing::debug!(account_id = %credentials.account_id, "Authorizing account");

        let response = self
            .http
            .get(&url)
            .basic_auth(&credentials.account_id, Some(&credentials.application_key))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Buckets owned by `account_id`
    pub async fn list_buckets(
        &self,
        session: &SessionContext,
        account_id: &str,
    ) -> Result<Vec<Bucket>> {
        let response: ListBucketsResponse = self
            .call(session, "b2_list_buckets", &json!({ "accountId": account_id }))
            .await?;
        Ok(response.buckets)
    }

    /// Metadata of one file version
    pub async fn get_file_info(&self, session: &SessionContext, file_id: &str) -> Result<FileInfo> {
        self.call(session, "b2_get_file_info", &json!({ "fileId": file_id }))
            .await
    }

    /// Upload target for a whole (unsplit) file
    pub async fn get_upload_url(
        &self,
        session: &SessionContext,
        bucket_id: &str,
    ) -> Result<UploadUrl> {
        self.call(session, "b2_get_upload_url", &json!({ "bucketId": bucket_id }))
            .await
    }

    /// Upload target for one part of a large file
    pub async fn get_upload_part_url(
        &self,
        session: &SessionContext,
        file_id: &str,
    ) -> Result<UploadUrl> {
        self.call(session, "b2_get_upload_part_url", &json!({ "fileId": file_id }))
            .await
    }

    /// Open a multipart upload; the returned metadata carries the new file id
    pub async fn start_large_file(
        &self,
        session: &SessionContext,
        bucket_id: &str,
        file_name: &str,
        content_type: &str,
    ) -> Result<FileInfo> {
        let body = json!({
            "bucketId": bucket_id,
            "fileName": file_name,
            "contentType": content_type,
        });
        self.call(session, "b2_start_large_file", &body).await
    }

    /// Commit a multipart upload
    ///
    /// `part_sha1s` must be ordered by part number.
    pub async fn finish_large_file(
        &self,
        session: &SessionContext,
        file_id: &str,
        part_sha1s: &[String],
    ) -> Result<FileInfo> {
        let body = json!({
            "fileId": file_id,
            "partSha1Array": part_sha1s,
        });
        self.call(session, "b2_finish_large_file", &body).await
    }

    /// Abandon a multipart upload, discarding every part uploaded so far
    pub async fn cancel_large_file(&self, session: &SessionContext, file_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(session, "b2_cancel_large_file", &json!({ "fileId": file_id }))
            .await?;
        Ok(())
    }

    /// Upload a whole file in one request
    pub async fn upload_file(
        &self,
        target: &UploadUrl,
        local_path: &Path,
        file_name: &str,
        content_type: &str,
        sha1: &str,
    ) -> Result<FileInfo> {
        let size = tokio::fs::metadata(local_path).await?.len();
        let body = file_body(local_path, 0, size).await?;

        let response = self
            .http
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header(HEADER_FILE_NAME, urlencoding::encode(file_name).as_ref())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .header(HEADER_CONTENT_SHA1, sha1)
            .body(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Upload `range` of `local_path` as part `part_number` (1-based)
    pub async fn upload_part(
        &self,
        target: &UploadUrl,
        local_path: &Path,
        range: ByteRange,
        part_number: usize,
        sha1: &str,
    ) -> Result<UploadPartResponse> {
        let body = file_body(local_path, range.start, range.len()).await?;

        let response = self
            .http
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header(HEADER_PART_NUMBER, part_number)
            .header(CONTENT_LENGTH, range.len())
            .header(HEADER_CONTENT_SHA1, sha1)
            .body(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Download `range` of a file by id into `destination`; returns bytes written
    ///
    /// `destination` is truncated first, so a retried attempt starts clean.
    pub async fn download_range(
        &self,
        session: &SessionContext,
        file_id: &str,
        range: ByteRange,
        destination: &Path,
    ) -> Result<u64> {
        let response = self
            .http
            .get(download_by_id_url(session, file_id))
            .header(AUTHORIZATION, &session.authorization_token)
            .header(RANGE, range.header_value())
            .send()
            .await?;
        write_body(check(response).await?, destination).await
    }

    /// Download a whole file by id into `destination`; returns bytes written
    pub async fn download(
        &self,
        session: &SessionContext,
        file_id: &str,
        destination: &Path,
    ) -> Result<u64> {
        let response = self
            .http
            .get(download_by_id_url(session, file_id))
            .header(AUTHORIZATION, &session.authorization_token)
            .send()
            .await?;
        write_body(check(response).await?, destination).await
    }

    /// Download the latest version of `bucket/file_name` into `destination`
    pub async fn download_by_name(
        &self,
        session: &SessionContext,
        bucket_name: &str,
        file_name: &str,
        destination: &Path,
    ) -> Result<u64> {
        let encoded_name = file_name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/file/{}/{}",
            session.download_url.trim_end_matches('/'),
            urlencoding::encode(bucket_name),
            encoded_name
        );

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &session.authorization_token)
            .send()
            .await?;
        write_body(check(response).await?, destination).await
    }

    async fn call<B, T>(&self, session: &SessionContext, operation: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!(
            "{}{}/{}",
            session.api_url.trim_end_matches('/'),
            API_PATH,
            operation
        );
        tracing::debug!(operation, "API call");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &session.authorization_token)
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

fn download_by_id_url(session: &SessionContext, file_id: &str) -> String {
    format!(
        "{}{}/b2_download_file_by_id?fileId={}",
        session.download_url.trim_end_matches('/'),
        API_PATH,
        urlencoding::encode(file_id)
    )
}

/// Pass 2xx responses through; turn anything else into [`Error::Api`]
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_body(status.as_u16(), &body).into())
}

/// Streaming request body over `len` bytes of `path` starting at `offset`
async fn file_body(path: &Path, offset: u64, len: u64) -> Result<reqwest::Body> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    Ok(reqwest::Body::wrap_stream(ReaderStream::new(file.take(len))))
}

/// Stream a response body to `destination`, returning the byte count
async fn write_body(mut response: reqwest::Response, destination: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create '{}': {}", destination.display(), e),
        ))
    })?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

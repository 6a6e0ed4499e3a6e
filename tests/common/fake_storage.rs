//! In-memory fake of the storage service REST API
//!
//! Mounted as a catch-all wiremock responder. Keeps whole files, open large
//! files and their parts in memory, checks every uploaded SHA-1, and serves
//! ranged downloads. Part uploads can be made to fail with 503 a given number
//! of times to exercise retries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use blazer::checksum::sha1_bytes;
use serde_json::{Value, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Bucket every test uploads into
pub const TEST_BUCKET: &str = "test-bucket";
/// Id of [`TEST_BUCKET`]
pub const TEST_BUCKET_ID: &str = "b-test-0001";

#[derive(Clone, Debug)]
struct StoredFile {
    name: String,
    content_type: String,
    data: Vec<u8>,
    content_sha1: String,
}

#[derive(Debug, Default)]
struct OpenLargeFile {
    name: String,
    content_type: String,
    parts: BTreeMap<u32, (Vec<u8>, String)>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    files: HashMap<String, StoredFile>,
    large_files: HashMap<String, OpenLargeFile>,
    part_url_requests: usize,
    part_uploads: usize,
    finish_calls: usize,
    cancel_calls: usize,
    ranged_downloads: usize,
    part_failures_left: usize,
}

/// Handle to a running fake storage service
#[derive(Clone)]
pub struct FakeStorage {
    base_uri: String,
    state: Arc<Mutex<State>>,
}

impl FakeStorage {
    /// Start a mock server with the fake mounted on every route
    pub async fn start() -> (MockServer, FakeStorage) {
        let server = MockServer::start().await;
        let fake = FakeStorage {
            base_uri: server.uri(),
            state: Arc::new(Mutex::new(State::default())),
        };
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// Make the next `n` part uploads answer 503
    pub fn fail_next_part_uploads(&self, n: usize) {
        self.lock().part_failures_left = n;
    }

    /// Number of `b2_get_upload_part_url` calls seen
    pub fn part_url_requests(&self) -> usize {
        self.lock().part_url_requests
    }

    /// Number of part uploads that were stored
    pub fn part_uploads(&self) -> usize {
        self.lock().part_uploads
    }

    /// Number of `b2_finish_large_file` calls seen
    pub fn finish_calls(&self) -> usize {
        self.lock().finish_calls
    }

    /// Number of `b2_cancel_large_file` calls seen
    pub fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }

    /// Number of large files started but neither finished nor cancelled
    pub fn open_large_files(&self) -> usize {
        self.lock().large_files.len()
    }

    /// Number of downloads that carried a `Range` header
    pub fn ranged_downloads(&self) -> usize {
        self.lock().ranged_downloads
    }

    /// Stored content of a committed file
    pub fn stored_content(&self, file_id: &str) -> Option<Vec<u8>> {
        self.lock().files.get(file_id).map(|f| f.data.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let method = request.method.as_str().to_string();

        match (method.as_str(), path.as_str()) {
            ("POST", "/b2api/v2/b2_list_buckets") => ok(json!({
                "buckets": [{
                    "bucketId": TEST_BUCKET_ID,
                    "bucketName": TEST_BUCKET,
                    "bucketType": "allPrivate",
                }]
            })),
            ("POST", "/b2api/v2/b2_get_upload_url") => ok(json!({
                "bucketId": TEST_BUCKET_ID,
                "uploadUrl": format!("{}/upload", self.base_uri),
                "authorizationToken": "upload-token",
            })),
            ("POST", "/upload") => self.upload_file(request),
            ("POST", "/b2api/v2/b2_start_large_file") => self.start_large_file(request),
            ("POST", "/b2api/v2/b2_get_upload_part_url") => self.get_upload_part_url(request),
            ("POST", p) if p.starts_with("/upload-part/") => {
                self.upload_part(request, &p["/upload-part/".len()..])
            }
            ("POST", "/b2api/v2/b2_finish_large_file") => self.finish_large_file(request),
            ("POST", "/b2api/v2/b2_cancel_large_file") => self.cancel_large_file(request),
            ("POST", "/b2api/v2/b2_get_file_info") => self.get_file_info(request),
            ("GET", "/b2api/v2/b2_download_file_by_id") => self.download(request),
            _ => error(404, "not_found", &format!("no route for {} {}", method, path)),
        }
    }

    fn upload_file(&self, request: &Request) -> ResponseTemplate {
        let Some(name) = header(request, "X-Bz-File-Name") else {
            return error(400, "bad_request", "missing X-Bz-File-Name");
        };
        let name = urlencoding::decode(&name)
            .map(|n| n.into_owned())
            .unwrap_or(name);
        let claimed = header(request, "X-Bz-Content-Sha1").unwrap_or_default();
        let actual = sha1_bytes(&request.body);
        if claimed != actual {
            return error(400, "bad_request", "sha1 did not match data received");
        }

        let mut state = self.lock();
        let file_id = next_file_id(&mut state);
        let file = StoredFile {
            name,
            content_type: header(request, "Content-Type").unwrap_or_default(),
            data: request.body.clone(),
            content_sha1: actual,
        };
        let info = file_info_json(&file_id, &file);
        state.files.insert(file_id, file);
        ok(info)
    }

    fn start_large_file(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return error(400, "bad_request", "invalid json");
        };
        let mut state = self.lock();
        let file_id = next_file_id(&mut state);
        let open = OpenLargeFile {
            name: body["fileName"].as_str().unwrap_or_default().to_string(),
            content_type: body["contentType"].as_str().unwrap_or_default().to_string(),
            parts: BTreeMap::new(),
        };
        let response = json!({
            "fileId": file_id,
            "fileName": open.name,
            "bucketId": TEST_BUCKET_ID,
            "contentLength": 0,
            "contentSha1": "none",
            "contentType": open.content_type,
            "action": "start",
        });
        state.large_files.insert(file_id, open);
        ok(response)
    }

    fn get_upload_part_url(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return error(400, "bad_request", "invalid json");
        };
        let file_id = body["fileId"].as_str().unwrap_or_default().to_string();

        let mut state = self.lock();
        state.part_url_requests += 1;
        if !state.large_files.contains_key(&file_id) {
            return error(400, "bad_request", "no such large file");
        }
        ok(json!({
            "fileId": file_id,
            "uploadUrl": format!("{}/upload-part/{}", self.base_uri, file_id),
            "authorizationToken": "part-token",
        }))
    }

    fn upload_part(&self, request: &Request, file_id: &str) -> ResponseTemplate {
        let mut state = self.lock();
        if state.part_failures_left > 0 {
            state.part_failures_left -= 1;
            return error(503, "service_unavailable", "too busy");
        }

        let Some(part_number) =
            header(request, "X-Bz-Part-Number").and_then(|n| n.parse::<u32>().ok())
        else {
            return error(400, "bad_request", "missing X-Bz-Part-Number");
        };
        let claimed = header(request, "X-Bz-Content-Sha1").unwrap_or_default();
        let actual = sha1_bytes(&request.body);
        if claimed != actual {
            return error(400, "bad_request", "sha1 did not match data received");
        }

        let Some(open) = state.large_files.get_mut(file_id) else {
            return error(400, "bad_request", "no such large file");
        };
        open.parts
            .insert(part_number, (request.body.clone(), actual.clone()));
        let length = request.body.len();
        state.part_uploads += 1;

        ok(json!({
            "fileId": file_id,
            "partNumber": part_number,
            "contentLength": length,
            "contentSha1": actual,
        }))
    }

    fn finish_large_file(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return error(400, "bad_request", "invalid json");
        };
        let file_id = body["fileId"].as_str().unwrap_or_default().to_string();
        let sha1s: Vec<String> = body["partSha1Array"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut state = self.lock();
        state.finish_calls += 1;
        let Some(open) = state.large_files.remove(&file_id) else {
            return error(400, "bad_request", "no such large file");
        };

        // Parts must be numbered 1..=n and listed in part-number order
        let expected: Vec<String> = open.parts.values().map(|(_, s)| s.clone()).collect();
        let numbered_from_one = open.parts.keys().copied().eq(1..=open.parts.len() as u32);
        if !numbered_from_one || expected != sha1s {
            return error(400, "bad_request", "part sha1 array does not match parts");
        }

        let data: Vec<u8> = open
            .parts
            .into_values()
            .flat_map(|(bytes, _)| bytes)
            .collect();
        let file = StoredFile {
            name: open.name,
            content_type: open.content_type,
            data,
            content_sha1: "none".to_string(),
        };
        let info = file_info_json(&file_id, &file);
        state.files.insert(file_id, file);
        ok(info)
    }

    fn cancel_large_file(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return error(400, "bad_request", "invalid json");
        };
        let file_id = body["fileId"].as_str().unwrap_or_default().to_string();

        let mut state = self.lock();
        state.cancel_calls += 1;
        match state.large_files.remove(&file_id) {
            Some(open) => ok(json!({
                "fileId": file_id,
                "fileName": open.name,
                "bucketId": TEST_BUCKET_ID,
            })),
            None => error(400, "bad_request", "no such large file"),
        }
    }

    fn get_file_info(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return error(400, "bad_request", "invalid json");
        };
        let file_id = body["fileId"].as_str().unwrap_or_default();
        let state = self.lock();
        match state.files.get(file_id) {
            Some(file) => ok(file_info_json(file_id, file)),
            None => error(404, "not_found", "file not present"),
        }
    }

    fn download(&self, request: &Request) -> ResponseTemplate {
        let file_id = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "fileId")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        let mut state = self.lock();
        let Some(file) = state.files.get(&file_id).cloned() else {
            return error(404, "not_found", "file not present");
        };

        match header(request, "Range").and_then(|r| parse_range(&r)) {
            Some((start, end)) => {
                state.ranged_downloads += 1;
                let end = end.min(file.data.len().saturating_sub(1));
                if start > end {
                    return error(416, "range_not_satisfiable", "bad range");
                }
                ResponseTemplate::new(206).set_body_bytes(file.data[start..=end].to_vec())
            }
            None => ResponseTemplate::new(200).set_body_bytes(file.data),
        }
    }
}

impl Respond for FakeStorage {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.handle(request)
    }
}

fn next_file_id(state: &mut State) -> String {
    state.next_id += 1;
    format!("4_z{:012}", state.next_id)
}

fn file_info_json(file_id: &str, file: &StoredFile) -> Value {
    json!({
        "fileId": file_id,
        "fileName": file.name,
        "bucketId": TEST_BUCKET_ID,
        "contentLength": file.data.len(),
        "contentSha1": file.content_sha1,
        "contentType": file.content_type,
        "action": "upload",
    })
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn json_body(request: &Request) -> Option<Value> {
    serde_json::from_slice(&request.body).ok()
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "status": status,
        "code": code,
        "message": message,
    }))
}

//! HTTP front end for the scan manager.
//!
//! Routes:
//! - `POST /scan` with a multipart `file` part or a JSON `{ "url": ... }`
//!   body submits a target and returns its analysis handle.
//! - `GET /scan/{id}` fetches the analysis once and returns its state,
//!   verdicts and summary.
//!
//! Request handling is split in two: [`dispatch`] is plain async code
//! over bytes, and [`serve`] adapts it to a blocking `tiny_http` loop.

pub mod multipart;

use crate::core::{
    AnalysisHandle, ScanError, ScanState, ScanTarget, TargetKind, MAX_FILE_SIZE,
};
use crate::manager::ScanManager;

use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server};

/// Largest request body read, leaving room for the multipart envelope.
pub const MAX_BODY_SIZE: u64 = MAX_FILE_SIZE + 1024 * 1024;

/// A status code and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body; `Null` means an empty body.
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            body: json!({ "error": "Not found" }),
        }
    }

    /// Maps a scan error to a response. Validation failures are the
    /// caller's fault; everything else is reported as a server error.
    pub fn from_error(err: &ScanError) -> Self {
        let status = if err.is_validation() { 400 } else { 500 };
        Self {
            status,
            body: json!({
                "error": err.user_message(),
                "detail": err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    url: Option<String>,
    target: Option<TargetBody>,
}

#[derive(Debug, Deserialize)]
struct TargetBody {
    url: String,
}

/// Routes one request.
pub async fn dispatch(
    manager: &ScanManager,
    method: &str,
    url: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("OPTIONS", _) => ApiResponse {
            status: 204,
            body: Value::Null,
        },
        ("POST", ["", "scan"]) => handle_submit(manager, content_type.unwrap_or(""), body).await,
        ("GET", ["", "scan", raw_id]) if !raw_id.is_empty() => {
            let id = match decode_analysis_id(raw_id) {
                Ok(id) => id,
                Err(e) => return ApiResponse::from_error(&e),
            };
            let kind = if query.split('&').any(|p| p == "kind=url") {
                TargetKind::Url
            } else {
                TargetKind::File
            };
            handle_status(manager, &id, kind).await
        }
        _ => ApiResponse::not_found(),
    }
}

/// Handles `POST /scan`.
pub async fn handle_submit(manager: &ScanManager, content_type: &str, body: &[u8]) -> ApiResponse {
    let target = match target_from_request(content_type, body) {
        Ok(target) => target,
        Err(e) => return ApiResponse::from_error(&e),
    };

    match manager.submit(&target).await {
        Ok(handle) => ApiResponse::ok(json!({ "handle": handle })),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Handles `GET /scan/{id}`.
pub async fn handle_status(manager: &ScanManager, id: &str, kind: TargetKind) -> ApiResponse {
    let handle = AnalysisHandle::new(id, kind, manager.provider().name());

    match manager.fetch(&handle).await {
        Ok(snapshot) => {
            let summary = snapshot.summary();
            ApiResponse::ok(json!({
                "state": ScanState::from(snapshot.status),
                "verdicts": snapshot.verdicts,
                "summary": summary,
            }))
        }
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Percent-decodes an analysis id taken from the path and checks its
/// alphabet. Provider ids are base64 or `[a-z0-9-]` strings.
fn decode_analysis_id(raw: &str) -> Result<String, ScanError> {
    let id = urlencoding::decode(raw)
        .map_err(|_| ScanError::validation("Analysis id is not valid UTF-8"))?;
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | '+' | '/' | '-'));
    if !valid {
        return Err(ScanError::validation(format!("Invalid analysis id: {:?}", raw)));
    }
    Ok(id.into_owned())
}

fn target_from_request(content_type: &str, body: &[u8]) -> Result<ScanTarget, ScanError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "multipart/form-data" => {
            let boundary = multipart::boundary_from_content_type(content_type)
                .ok_or_else(|| ScanError::validation("Missing multipart boundary"))?;
            let part = multipart::find_part(body, &boundary, "file")?;
            let target = ScanTarget::from_bytes(part.data);
            Ok(match part.filename {
                Some(name) => target.with_filename(name),
                None => target,
            })
        }
        "application/json" | "" => {
            let parsed: SubmitBody = serde_json::from_slice(body)
                .map_err(|e| ScanError::validation(format!("Invalid JSON body: {}", e)))?;
            parsed
                .url
                .or(parsed.target.map(|t| t.url))
                .map(ScanTarget::from_url)
                .ok_or_else(|| ScanError::validation("Expected a 'url' field or a 'file' upload"))
        }
        other => Err(ScanError::validation(format!(
            "Unsupported content type: {}",
            other
        ))),
    }
}

/// Serves requests until the listener shuts down.
///
/// Blocks the calling thread. Each request runs on the runtime's blocking
/// pool and drives its handler with `runtime.block_on`.
pub fn serve(server: Server, manager: Arc<ScanManager>, runtime: tokio::runtime::Handle) {
    for request in server.incoming_requests() {
        let manager = Arc::clone(&manager);
        let handle = runtime.clone();
        runtime.spawn_blocking(move || respond(request, &manager, &handle));
    }
}

fn respond(mut request: Request, manager: &ScanManager, runtime: &tokio::runtime::Handle) {
    let started = Instant::now();
    let method = request.method().as_str().to_string();
    let url = request.url().to_string();
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    let api_response = match read_body(&mut request) {
        Ok(body) => runtime.block_on(dispatch(
            manager,
            &method,
            &url,
            content_type.as_deref(),
            &body,
        )),
        Err(e) => ApiResponse::from_error(&e),
    };

    tracing::info!(
        method = %method,
        url = %url,
        status = api_response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );

    let payload = match &api_response.body {
        Value::Null => String::new(),
        body => body.to_string(),
    };
    let mut response = Response::from_string(payload).with_status_code(api_response.status);
    add_headers(&mut response);

    if let Err(e) = request.respond(response) {
        tracing::warn!(url = %url, error = %e, "Failed to write response");
    }
}

fn read_body(request: &mut Request) -> Result<Vec<u8>, ScanError> {
    let declared = request.body_length();
    read_capped(request.as_reader(), declared)
}

/// Reads at most `MAX_BODY_SIZE` bytes, rejecting larger bodies whether
/// or not their length was declared up front.
fn read_capped<R: Read>(reader: R, declared: Option<usize>) -> Result<Vec<u8>, ScanError> {
    if declared.is_some_and(|len| len as u64 > MAX_BODY_SIZE) {
        return Err(ScanError::validation("Request body too large"));
    }

    let mut body = Vec::new();
    reader.take(MAX_BODY_SIZE + 1).read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_SIZE {
        return Err(ScanError::validation("Request body too large"));
    }
    Ok(body)
}

fn add_headers<R: Read>(response: &mut Response<R>) {
    let headers: [(&str, &str); 4] = [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ];
    for (name, value) in headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockFailure, MockProvider};
    use crate::core::{AnalysisSnapshot, EngineVerdict, ProviderStatus, VerdictCategory};

    fn manager(provider: MockProvider) -> ScanManager {
        ScanManager::builder().with_provider(provider).build().unwrap()
    }

    #[tokio::test]
    async fn test_submit_url_json() {
        let manager = manager(MockProvider::new());
        let resp = dispatch(
            &manager,
            "POST",
            "/scan",
            Some("application/json"),
            br#"{"url":"https://example.com"}"#,
        )
        .await;

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["handle"]["kind"], "url");
        assert!(resp.body["handle"]["id"].as_str().unwrap().starts_with("mock-"));
    }

    #[tokio::test]
    async fn test_submit_nested_target() {
        let manager = manager(MockProvider::new());
        let resp = dispatch(
            &manager,
            "POST",
            "/scan",
            None,
            br#"{"target":{"url":"http://example.org/x"}}"#,
        )
        .await;
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_submit_multipart_file() {
        let manager = manager(MockProvider::new());
        let body = b"--b1\r\nContent-Disposition: form-data; name=\"file\"; filename=\"t.bin\"\r\n\r\nabc\r\n--b1--\r\n";
        let resp = dispatch(
            &manager,
            "POST",
            "/scan",
            Some("multipart/form-data; boundary=b1"),
            body,
        )
        .await;

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["handle"]["kind"], "file");
        assert_eq!(
            resp.body["handle"]["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_validation_is_400() {
        let manager = manager(MockProvider::new());

        for (ct, body) in [
            (Some("application/json"), &br#"{"url":"ftp://x"}"#[..]),
            (Some("application/json"), &b"{}"[..]),
            (Some("application/json"), &b"not json"[..]),
            (Some("text/plain"), &b"hello"[..]),
            (Some("multipart/form-data"), &b""[..]),
        ] {
            let resp = dispatch(&manager, "POST", "/scan", ct, body).await;
            assert_eq!(resp.status, 400, "content type {:?}", ct);
            assert!(resp.body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_500_with_generic_message() {
        let manager = manager(MockProvider::new().with_submit_failure(MockFailure::Transport));
        let resp = dispatch(
            &manager,
            "POST",
            "/scan",
            Some("application/json"),
            br#"{"url":"https://example.com"}"#,
        )
        .await;

        assert_eq!(resp.status, 500);
        assert_eq!(resp.body["error"], "Failed to analyze target");
        assert!(resp.body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_status_route() {
        let manager = manager(
            MockProvider::new().then(
                AnalysisSnapshot::new(ProviderStatus::Completed).with_verdict(
                    "EngineA",
                    EngineVerdict::new("EngineA", VerdictCategory::Suspicious),
                ),
            ),
        );
        let resp = dispatch(&manager, "GET", "/scan/abc?kind=url", None, b"").await;

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["state"], "completed");
        assert_eq!(resp.body["summary"]["overall_severity"], "suspicious");
        assert_eq!(resp.body["verdicts"]["EngineA"]["category"], "suspicious");
    }

    #[tokio::test]
    async fn test_status_failure_is_500() {
        let manager = manager(MockProvider::new().then_fail(MockFailure::Parse));
        let resp = dispatch(&manager, "GET", "/scan/abc", None, b"").await;
        assert_eq!(resp.status, 500);
    }

    #[tokio::test]
    async fn test_status_id_is_decoded_and_checked() {
        let provider = std::sync::Arc::new(MockProvider::new());
        let manager = ScanManager::builder()
            .with_arc_provider(provider.clone())
            .build()
            .unwrap();

        let resp = dispatch(&manager, "GET", "/scan/NjY0%2FZmQ%2BM2Q%3D%3D", None, b"").await;
        assert_eq!(resp.status, 200);
        assert_eq!(provider.fetch_count(), 1);

        for url in ["/scan/..%2F..%2Ffiles", "/scan/a%20b", "/scan/%FF%FE", "/scan/%2E%2E"] {
            let resp = dispatch(&manager, "GET", url, None, b"").await;
            assert_eq!(resp.status, 400, "{}", url);
        }
        assert_eq!(provider.fetch_count(), 1);
    }

    #[test]
    fn test_body_cap() {
        let limit = MAX_BODY_SIZE as usize;

        assert_eq!(read_capped(&b"small"[..], Some(5)).unwrap(), b"small");
        assert!(read_capped(&b""[..], Some(limit + 1))
            .unwrap_err()
            .is_validation());

        let oversized = vec![0u8; limit + 1];
        assert!(read_capped(oversized.as_slice(), None)
            .unwrap_err()
            .is_validation());

        let exact = vec![0u8; limit];
        assert_eq!(read_capped(exact.as_slice(), None).unwrap().len(), limit);
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let manager = manager(MockProvider::new());
        assert_eq!(dispatch(&manager, "GET", "/", None, b"").await.status, 404);
        assert_eq!(dispatch(&manager, "GET", "/scan", None, b"").await.status, 404);
        assert_eq!(dispatch(&manager, "DELETE", "/scan/x", None, b"").await.status, 404);
        assert_eq!(dispatch(&manager, "GET", "/scan/a/b", None, b"").await.status, 404);
        assert_eq!(dispatch(&manager, "OPTIONS", "/scan", None, b"").await.status, 204);
    }
}

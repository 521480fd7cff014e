//! VirusTotal scanning backend.
//!
//! This module provides a provider implementation backed by the
//! VirusTotal v3 API.
//!
//! # Requirements
//!
//! - VirusTotal API key
//! - Network access to www.virustotal.com
//!
//! # API Usage
//!
//! 1. `POST /files` (multipart) or `POST /urls` (form) to submit
//! 2. `GET /analyses/{id}` to poll the analysis
//!
//! File and URL analyses return slightly different engine entries; both
//! are decoded into [`EngineVerdict`] here.

use crate::core::{
    AnalysisHandle, AnalysisSnapshot, EngineVerdict, FileHasher, ProviderStatus, ScanError,
    ScanProvider, ScanTarget, VerdictCategory, VerdictMap, MAX_FILE_SIZE,
};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const PROVIDER: &str = "virustotal";

/// VirusTotal provider configuration.
#[derive(Debug, Clone)]
pub struct VirusTotalConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum file size to upload (public API: 32MB).
    pub max_file_size: u64,
}

impl VirusTotalConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            api_key: SecretString::new(api_key.into_boxed_str()),
            base_url: "https://www.virustotal.com/api/v3".to_string(),
            timeout: Duration::from_secs(60),
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Returns `true` if no API key was configured.
    pub fn is_anonymous(&self) -> bool {
        self.api_key.expose_secret().is_empty()
    }
}

/// VirusTotal provider implementation.
///
/// # Example
///
/// ```rust,ignore
/// use imsafe::backends::virustotal::{VirusTotalConfig, VirusTotalProvider};
///
/// let config = VirusTotalConfig::new("your-api-key");
/// let provider = VirusTotalProvider::new(config)?;
/// ```
#[derive(Debug)]
pub struct VirusTotalProvider {
    config: VirusTotalConfig,
    hasher: FileHasher,
    client: reqwest::Client,
}

impl VirusTotalProvider {
    /// Creates a new VirusTotal provider with the given configuration.
    pub fn new(config: VirusTotalConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            hasher: FileHasher::new(),
            client,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &VirusTotalConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header("x-apikey", self.config.api_key.expose_secret())
            .header("accept", "application/json")
    }

    /// Sends one request and classifies the response.
    async fn execute(
        &self,
        operation: Operation,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, ScanError> {
        let response = request
            .send()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, None, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, Some(status), e.to_string()))?;

        classify_response(operation, status, &body)
    }
}

/// Structured VirusTotal error body.
#[derive(Debug, Deserialize)]
struct VtErrorBody {
    error: VtError,
}

#[derive(Debug, Deserialize)]
struct VtError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct VtEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct VtSubmitData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VtAnalysisData {
    #[serde(default)]
    attributes: Option<VtAnalysisAttributes>,
}

#[derive(Debug, Deserialize)]
struct VtAnalysisAttributes {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Option<BTreeMap<String, VtEngineResult>>,
}

/// One engine entry. File analyses carry version/update stamps; URL
/// analyses do not.
#[derive(Debug, Deserialize)]
struct VtEngineResult {
    #[serde(default)]
    engine_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    engine_version: Option<String>,
    #[serde(default)]
    engine_update: Option<String>,
}

impl VtEngineResult {
    fn into_verdict(self, key: &str) -> EngineVerdict {
        EngineVerdict {
            engine_name: self.engine_name.unwrap_or_else(|| key.to_string()),
            category: self
                .category
                .as_deref()
                .map(VerdictCategory::from_provider)
                .unwrap_or_else(|| VerdictCategory::Other("unknown".to_string())),
            result: self.result,
            method: self.method.unwrap_or_default(),
            engine_version: self.engine_version,
            engine_update: self.engine_update,
        }
    }
}

/// Which kind of call a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    /// `POST /files` or `POST /urls`.
    Submit,
    /// `GET /analyses/{id}` and other reads.
    Fetch,
}

/// Maps an HTTP status and body onto the error taxonomy.
///
/// Credential, quota and server errors are transport failures. Only
/// submissions can be rejected: there, other 4xx responses with a
/// structured error body, and any success response that carries one, are
/// provider rejections. Every error response to a read is a transport
/// failure that keeps the provider's code and message.
pub(crate) fn classify_response(
    operation: Operation,
    status: u16,
    body: &str,
) -> Result<serde_json::Value, ScanError> {
    let structured = serde_json::from_str::<VtErrorBody>(body).ok();
    let success = (200..300).contains(&status);

    if !success {
        let message = structured
            .as_ref()
            .map(|e| format!("{}: {}", e.error.code, e.error.message))
            .unwrap_or_else(|| format!("API error: {}", status));

        return match (operation, status, structured) {
            (Operation::Submit, 400..=499, Some(e)) if !matches!(status, 401 | 403 | 429) => {
                Err(ScanError::rejected(PROVIDER, e.error.code, e.error.message))
            }
            _ => Err(ScanError::transport(PROVIDER, Some(status), message)),
        };
    }

    if let Some(e) = structured {
        return Err(match operation {
            Operation::Submit => ScanError::rejected(PROVIDER, e.error.code, e.error.message),
            Operation::Fetch => ScanError::transport(
                PROVIDER,
                Some(status),
                format!("{}: {}", e.error.code, e.error.message),
            ),
        });
    }

    serde_json::from_str(body).map_err(|e| ScanError::parse(PROVIDER, e.to_string()))
}

/// Path of one analysis. The id is a single path segment, so any `/`,
/// `+` or `=` from base64 ids is percent-encoded.
pub(crate) fn analysis_path(id: &str) -> String {
    format!("/analyses/{}", urlencoding::encode(id))
}

/// Extracts the analysis id from a submission response.
pub(crate) fn parse_submission(body: serde_json::Value) -> Result<String, ScanError> {
    let envelope: VtEnvelope<VtSubmitData> = serde_json::from_value(body)
        .map_err(|e| ScanError::parse(PROVIDER, format!("missing data.id: {}", e)))?;
    if envelope.data.id.is_empty() {
        return Err(ScanError::parse(PROVIDER, "empty analysis id"));
    }
    Ok(envelope.data.id)
}

/// Decodes an analysis response into a snapshot.
///
/// Absent `status` or `results` fields mean the data is not available
/// yet: the analysis is treated as queued with no verdicts.
pub(crate) fn parse_analysis(body: serde_json::Value) -> Result<AnalysisSnapshot, ScanError> {
    let envelope: VtEnvelope<VtAnalysisData> = serde_json::from_value(body)
        .map_err(|e| ScanError::parse(PROVIDER, format!("unexpected analysis shape: {}", e)))?;

    let Some(attributes) = envelope.data.attributes else {
        return Ok(AnalysisSnapshot::new(ProviderStatus::Queued));
    };

    let status = match attributes.status.as_deref() {
        None => ProviderStatus::Queued,
        Some(raw) => ProviderStatus::from_provider(raw).unwrap_or_else(|| {
            tracing::warn!(status = %raw, "Unrecognized analysis status, treating as in progress");
            ProviderStatus::InProgress
        }),
    };

    let verdicts: VerdictMap = attributes
        .results
        .unwrap_or_default()
        .into_iter()
        .map(|(key, entry)| {
            let verdict = entry.into_verdict(&key);
            (key, verdict)
        })
        .collect();

    Ok(AnalysisSnapshot::new(status).with_verdicts(verdicts))
}

#[async_trait]
impl ScanProvider for VirusTotalProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn submit(&self, target: &ScanTarget) -> Result<AnalysisHandle, ScanError> {
        let request = match target {
            ScanTarget::File { data, filename } => {
                let part = reqwest::multipart::Part::bytes(data.clone())
                    .file_name(filename.clone().unwrap_or_else(|| "upload.bin".to_string()));
                let form = reqwest::multipart::Form::new().part("file", part);
                self.request(reqwest::Method::POST, "/files").multipart(form)
            }
            ScanTarget::Url(url) => self
                .request(reqwest::Method::POST, "/urls")
                .form(&[("url", url.as_str())]),
        };

        let body = self.execute(Operation::Submit, request).await?;
        let id = parse_submission(body)?;

        let mut handle = AnalysisHandle::new(id, target.kind(), PROVIDER);
        if let Some(sha256) = self.hasher.hash_target(target) {
            handle = handle.with_sha256(sha256);
        }

        tracing::debug!(
            analysis_id = %handle.id,
            kind = %handle.kind,
            "VirusTotal accepted submission"
        );
        Ok(handle)
    }

    async fn fetch(&self, handle: &AnalysisHandle) -> Result<AnalysisSnapshot, ScanError> {
        let request = self.request(reqwest::Method::GET, &analysis_path(&handle.id));
        let body = self.execute(Operation::Fetch, request).await?;
        parse_analysis(body)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        // The EICAR test file is always known to VirusTotal.
        const EICAR_SHA256: &str =
            "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

        let request = self.request(reqwest::Method::GET, &format!("/files/{}", EICAR_SHA256));
        self.execute(Operation::Fetch, request).await.map(|_| ())
    }

    fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_builder() {
        let config = VirusTotalConfig::new("test-key")
            .with_base_url("http://localhost:9999/api/v3/")
            .with_max_file_size(64 * 1024 * 1024);

        assert_eq!(config.base_url, "http://localhost:9999/api/v3");
        assert_eq!(config.max_file_size, 64 * 1024 * 1024);
        assert!(!config.is_anonymous());
        assert!(VirusTotalConfig::new("").is_anonymous());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = VirusTotalConfig::new("super-secret-key");
        assert!(!format!("{:?}", config).contains("super-secret-key"));
    }

    #[test]
    fn test_classify_credentials_as_transport() {
        let body = r#"{"error":{"code":"WrongCredentialsError","message":"Wrong API key"}}"#;
        let err = classify_response(Operation::Submit, 401, body).unwrap_err();
        assert!(matches!(err, ScanError::Transport { status: Some(401), .. }));
    }

    #[test]
    fn test_classify_server_error_without_body() {
        let err =
            classify_response(Operation::Fetch, 502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ScanError::Transport { status: Some(502), .. }));
    }

    #[test]
    fn test_classify_structured_rejection() {
        let body = r#"{"error":{"code":"BadRequestError","message":"url is required"}}"#;
        match classify_response(Operation::Submit, 400, body).unwrap_err() {
            ScanError::ProviderRejected { code, message, .. } => {
                assert_eq!(code, "BadRequestError");
                assert_eq!(message, "url is required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_body_on_success() {
        let body = r#"{"error":{"code":"QuotaExceededError","message":"quota"}}"#;
        assert!(matches!(
            classify_response(Operation::Submit, 200, body),
            Err(ScanError::ProviderRejected { .. })
        ));
    }

    #[test]
    fn test_classify_fetch_errors_as_transport() {
        let body = r#"{"error":{"code":"NotFoundError","message":"Analysis \"x\" not found"}}"#;
        let err = classify_response(Operation::Fetch, 404, body).unwrap_err();
        match &err {
            ScanError::Transport { status, message, .. } => {
                assert_eq!(*status, Some(404));
                assert_eq!(message, "NotFoundError: Analysis \"x\" not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_retryable());

        let body = r#"{"error":{"code":"BadRequestError","message":"bad id"}}"#;
        assert!(matches!(
            classify_response(Operation::Fetch, 400, body),
            Err(ScanError::Transport { status: Some(400), .. })
        ));
        assert!(matches!(
            classify_response(Operation::Fetch, 200, body),
            Err(ScanError::Transport { status: Some(200), .. })
        ));
    }

    #[test]
    fn test_analysis_path_encodes_id() {
        assert_eq!(analysis_path("u-abc-123"), "/analyses/u-abc-123");
        assert_eq!(
            analysis_path("NjY0MjRlOTFj/ZmQ+M2Q=="),
            "/analyses/NjY0MjRlOTFj%2FZmQ%2BM2Q%3D%3D"
        );
    }

    #[test]
    fn test_classify_unparseable_success() {
        assert!(matches!(
            classify_response(Operation::Fetch, 200, "not json"),
            Err(ScanError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_submission() {
        let body = json!({
            "data": {
                "type": "analysis",
                "id": "u-abc-123",
                "links": { "self": "https://www.virustotal.com/api/v3/analyses/u-abc-123" }
            }
        });
        assert_eq!(parse_submission(body).unwrap(), "u-abc-123");

        let err = parse_submission(json!({ "data": {} })).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_parse_file_analysis() {
        let body = json!({
            "data": {
                "id": "NjY0MjRlOTFjMDIyYTkyNWM0NjU2NWQzYWNlMzFmZmI6MTcwMDAwMDAwMA==",
                "type": "analysis",
                "attributes": {
                    "status": "completed",
                    "date": 1700000000,
                    "stats": { "malicious": 1, "harmless": 0, "undetected": 1 },
                    "results": {
                        "Acme": {
                            "method": "blacklist",
                            "engine_name": "Acme",
                            "engine_version": "1.2",
                            "engine_update": "20240101",
                            "category": "malicious",
                            "result": "Trojan.Generic"
                        },
                        "Zeta": {
                            "method": "blacklist",
                            "engine_name": "Zeta",
                            "engine_version": null,
                            "engine_update": "20240101",
                            "category": "undetected",
                            "result": null
                        }
                    }
                }
            },
            "meta": { "file_info": { "sha256": "abc", "size": 3 } }
        });

        let snapshot = parse_analysis(body).unwrap();
        assert_eq!(snapshot.status, ProviderStatus::Completed);
        assert_eq!(snapshot.verdicts.len(), 2);

        let acme = &snapshot.verdicts["Acme"];
        assert_eq!(acme.category, VerdictCategory::Malicious);
        assert_eq!(acme.result.as_deref(), Some("Trojan.Generic"));
        assert_eq!(acme.engine_version.as_deref(), Some("1.2"));
        assert_eq!(snapshot.verdicts["Zeta"].engine_version, None);
    }

    #[test]
    fn test_parse_url_analysis_without_engine_stamps() {
        let body = json!({
            "data": {
                "attributes": {
                    "status": "completed",
                    "results": {
                        "PhishDB": { "method": "blacklist", "category": "harmless", "result": "clean" }
                    }
                }
            },
            "meta": { "url_info": { "id": "x", "url": "https://example.com" } }
        });

        let snapshot = parse_analysis(body).unwrap();
        let verdict = &snapshot.verdicts["PhishDB"];
        assert_eq!(verdict.engine_name, "PhishDB");
        assert_eq!(verdict.category, VerdictCategory::Harmless);
    }

    #[test]
    fn test_parse_queued_without_results() {
        let body = json!({ "data": { "attributes": { "status": "queued" } } });
        let snapshot = parse_analysis(body).unwrap();
        assert_eq!(snapshot.status, ProviderStatus::Queued);
        assert!(snapshot.verdicts.is_empty());

        let bare = parse_analysis(json!({ "data": {} })).unwrap();
        assert_eq!(bare.status, ProviderStatus::Queued);
    }

    #[test]
    fn test_parse_unknown_status_keeps_polling() {
        let body = json!({ "data": { "attributes": { "status": "reanalyzing", "results": {} } } });
        assert_eq!(parse_analysis(body).unwrap().status, ProviderStatus::InProgress);
    }

    #[test]
    fn test_parse_unknown_category() {
        let body = json!({
            "data": { "attributes": { "status": "completed", "results": {
                "New": { "category": "quarantined" },
                "Blank": {}
            } } }
        });
        let snapshot = parse_analysis(body).unwrap();
        assert_eq!(
            snapshot.verdicts["New"].category,
            VerdictCategory::Other("quarantined".into())
        );
        assert_eq!(
            snapshot.verdicts["Blank"].category,
            VerdictCategory::Other("unknown".into())
        );
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = parse_analysis(json!({ "data": "nope" })).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));

        let err = parse_analysis(json!({ "data": { "attributes": { "results": [1, 2] } } }))
            .unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }
}

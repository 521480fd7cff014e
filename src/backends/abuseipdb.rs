//! AbuseIPDB reputation lookups.
//!
//! Not a scanning provider: a single `GET /check` returns the abuse report
//! for one IP address, so there is no analysis to poll.

use crate::core::ScanError;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const PROVIDER: &str = "abuseipdb";

/// AbuseIPDB client configuration.
#[derive(Debug, Clone)]
pub struct AbuseIpDbConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// How far back reports are considered, in days.
    pub max_age_days: u32,
}

impl AbuseIpDbConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            api_key: SecretString::new(api_key.into_boxed_str()),
            base_url: "https://api.abuseipdb.com/api/v2".to_string(),
            timeout: Duration::from_secs(30),
            max_age_days: 30,
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

    /// Sets the report window. The API accepts 1 to 365 days.
    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = days.clamp(1, 365);
        self
    }
}

/// Abuse report for one IP address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpReport {
    /// Address the report is for.
    pub ip_address: String,
    /// Whether the address is publicly routable.
    #[serde(default)]
    pub is_public: bool,
    /// 4 or 6.
    #[serde(default)]
    pub ip_version: Option<u8>,
    /// Whether AbuseIPDB whitelists the address.
    #[serde(default)]
    pub is_whitelisted: Option<bool>,
    /// 0 to 100.
    #[serde(default)]
    pub abuse_confidence_score: u8,
    /// ISO country code.
    #[serde(default)]
    pub country_code: Option<String>,
    /// Usage type, e.g. `Data Center/Web Hosting/Transit`.
    #[serde(default)]
    pub usage_type: Option<String>,
    /// Internet service provider.
    #[serde(default)]
    pub isp: Option<String>,
    /// Domain associated with the address.
    #[serde(default)]
    pub domain: Option<String>,
    /// Reverse DNS hostnames.
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Whether the address is a Tor exit node.
    #[serde(default)]
    pub is_tor: bool,
    /// Reports received inside the window.
    #[serde(default)]
    pub total_reports: u64,
    /// Distinct reporters inside the window.
    #[serde(default)]
    pub num_distinct_users: u64,
    /// Timestamp of the latest report.
    #[serde(default)]
    pub last_reported_at: Option<String>,
    /// Individual reports, present only when requested verbosely.
    #[serde(default)]
    pub reports: Vec<AbuseReport>,
}

impl IpReport {
    /// Returns `true` if anyone has reported the address in the window.
    pub fn is_reported(&self) -> bool {
        self.total_reports > 0
    }
}

/// One user report against an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbuseReport {
    /// When the report was filed.
    #[serde(default)]
    pub reported_at: Option<String>,
    /// Reporter comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Abuse category ids.
    #[serde(default)]
    pub categories: Vec<u32>,
    /// Reporter account id.
    #[serde(default)]
    pub reporter_id: Option<u64>,
    /// Reporter country code.
    #[serde(default)]
    pub reporter_country_code: Option<String>,
    /// Reporter country name.
    #[serde(default)]
    pub reporter_country_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckEnvelope {
    data: IpReport,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    detail: String,
}

/// AbuseIPDB client.
///
/// # Example
///
/// ```rust,ignore
/// use imsafe::backends::abuseipdb::{AbuseIpDbClient, AbuseIpDbConfig};
///
/// let client = AbuseIpDbClient::new(AbuseIpDbConfig::new("your-api-key"))?;
/// let report = client.check_ip("203.0.113.7").await?;
/// println!("confidence {}", report.abuse_confidence_score);
/// ```
#[derive(Debug)]
pub struct AbuseIpDbClient {
    config: AbuseIpDbConfig,
    client: reqwest::Client,
}

impl AbuseIpDbClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: AbuseIpDbConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AbuseIpDbConfig {
        &self.config
    }

    /// Looks up the abuse report for `ip`.
    pub async fn check_ip(&self, ip: &str) -> Result<IpReport, ScanError> {
        let ip = parse_ip(ip)?;
        tracing::debug!(ip = %ip, max_age_days = self.config.max_age_days, "Checking IP reputation");

        let response = self
            .client
            .get(format!("{}/check", self.config.base_url))
            .query(&[
                ("ipAddress", ip.to_string()),
                ("maxAgeInDays", self.config.max_age_days.to_string()),
            ])
            .header("Key", self.config.api_key.expose_secret())
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, None, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, Some(status), e.to_string()))?;

        parse_check_response(status, &body)
    }
}

fn parse_ip(ip: &str) -> Result<IpAddr, ScanError> {
    ip.trim()
        .parse()
        .map_err(|_| ScanError::validation(format!("Invalid IP address: {:?}", ip)))
}

/// Maps a `/check` response to a report or an error.
pub(crate) fn parse_check_response(status: u16, body: &str) -> Result<IpReport, ScanError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.errors.into_iter().next())
            .map(|e| e.detail)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("API error: {}", status));
        return Err(ScanError::transport(PROVIDER, Some(status), message));
    }

    serde_json::from_str::<CheckEnvelope>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| ScanError::parse(PROVIDER, format!("Unexpected check response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AbuseIpDbConfig::new("k")
            .with_base_url("http://localhost:9000/api/v2/")
            .with_max_age_days(0);
        assert_eq!(config.base_url, "http://localhost:9000/api/v2");
        assert_eq!(config.max_age_days, 1);
        assert_eq!(AbuseIpDbConfig::new("k").with_max_age_days(900).max_age_days, 365);
        assert!(!format!("{:?}", AbuseIpDbConfig::new("hidden-key")).contains("hidden-key"));
    }

    #[test]
    fn test_parse_ip() {
        assert!(parse_ip("203.0.113.7").is_ok());
        assert!(parse_ip(" 2001:db8::1 ").is_ok());
        assert!(parse_ip("example.com").unwrap_err().is_validation());
        assert!(parse_ip("").unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_check_response() {
        let body = r#"{"data":{
            "ipAddress":"118.25.6.39","isPublic":true,"ipVersion":4,"isWhitelisted":false,
            "abuseConfidenceScore":100,"countryCode":"CN","usageType":"Data Center/Web Hosting/Transit",
            "isp":"Tencent Cloud Computing (Beijing) Co. Ltd","domain":"tencent.com",
            "hostnames":[],"isTor":false,"totalReports":1,"numDistinctUsers":1,
            "lastReportedAt":"2018-12-20T20:55:14+00:00",
            "reports":[{"reportedAt":"2018-12-20T20:55:14+00:00","comment":"Dec 20 20:55:14 srv206 sshd[13937]: Invalid user oracle",
                "categories":[18,22],"reporterId":1,"reporterCountryCode":"US","reporterCountryName":"United States"}]
        }}"#;

        let report = parse_check_response(200, body).unwrap();
        assert_eq!(report.ip_address, "118.25.6.39");
        assert_eq!(report.abuse_confidence_score, 100);
        assert_eq!(report.country_code.as_deref(), Some("CN"));
        assert!(report.is_reported());
        assert_eq!(report.reports[0].categories, vec![18, 22]);
    }

    #[test]
    fn test_parse_minimal_report() {
        let report = parse_check_response(200, r#"{"data":{"ipAddress":"10.0.0.1"}}"#).unwrap();
        assert!(!report.is_public);
        assert!(!report.is_reported());
        assert!(report.reports.is_empty());
    }

    #[test]
    fn test_parse_error_responses() {
        let err = parse_check_response(
            422,
            r#"{"errors":[{"detail":"The max age in days must be between 1 and 365.","status":422}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Transport { status: Some(422), ref message, .. } if message.starts_with("The max age")
        ));

        let err = parse_check_response(502, "<html>").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("API error: 502"));

        let err = parse_check_response(200, r#"{"unexpected":true}"#).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }
}

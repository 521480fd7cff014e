//! Have I Been Pwned breach lookups.
//!
//! `GET /breachedaccount/{account}` lists the breaches an email address
//! appears in. A 404 means the account is in none of them.

use crate::core::ScanError;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "hibp";

/// Have I Been Pwned client configuration.
#[derive(Debug, Clone)]
pub struct HibpConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// User agent; the API rejects requests without one.
    pub user_agent: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Ask for breach names only instead of full breach records.
    pub truncate_response: bool,
}

impl HibpConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            api_key: SecretString::new(api_key.into_boxed_str()),
            base_url: "https://haveibeenpwned.com/api/v3".to_string(),
            user_agent: format!("imsafe/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            truncate_response: true,
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Requests full breach records.
    pub fn with_full_breaches(mut self) -> Self {
        self.truncate_response = false;
        self
    }
}

/// One breach an account appeared in.
///
/// Truncated responses carry only `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Breach {
    /// Breach name, unique per breach.
    pub name: String,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Domain of the breached site.
    #[serde(default)]
    pub domain: Option<String>,
    /// Date the breach happened.
    #[serde(default)]
    pub breach_date: Option<String>,
    /// When the breach was loaded.
    #[serde(default)]
    pub added_date: Option<String>,
    /// Number of accounts in the breach.
    #[serde(default)]
    pub pwn_count: Option<u64>,
    /// HTML description.
    #[serde(default)]
    pub description: Option<String>,
    /// Kinds of data exposed.
    #[serde(default)]
    pub data_classes: Vec<String>,
    /// Whether the breach is verified.
    #[serde(default)]
    pub is_verified: Option<bool>,
    /// Whether the breach is flagged sensitive.
    #[serde(default)]
    pub is_sensitive: Option<bool>,
}

/// Have I Been Pwned client.
///
/// # Example
///
/// ```rust,ignore
/// use imsafe::backends::hibp::{HibpClient, HibpConfig};
///
/// let client = HibpClient::new(HibpConfig::new("your-api-key"))?;
/// for breach in client.breaches_for("user@example.com").await? {
///     println!("{}", breach.name);
/// }
/// ```
#[derive(Debug)]
pub struct HibpClient {
    config: HibpConfig,
    client: reqwest::Client,
}

impl HibpClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: HibpConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScanError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HibpConfig {
        &self.config
    }

    /// Lists the breaches `email` appears in. Empty if none.
    pub async fn breaches_for(&self, email: &str) -> Result<Vec<Breach>, ScanError> {
        let email = validate_email(email)?;
        tracing::debug!(truncated = self.config.truncate_response, "Looking up breached account");

        let response = self
            .client
            .get(format!("{}{}", self.config.base_url, account_path(email)))
            .query(&[("truncateResponse", self.config.truncate_response)])
            .header("hibp-api-key", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, None, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ScanError::transport(PROVIDER, Some(status), e.to_string()))?;

        let breaches = parse_breach_response(status, &body)?;
        tracing::debug!(count = breaches.len(), "Breach lookup finished");
        Ok(breaches)
    }
}

fn validate_email(email: &str) -> Result<&str, ScanError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ScanError::validation("Email address is required")),
    }
}

fn account_path(email: &str) -> String {
    format!("/breachedaccount/{}", urlencoding::encode(email))
}

/// Maps a `/breachedaccount` response to a breach list or an error.
pub(crate) fn parse_breach_response(status: u16, body: &str) -> Result<Vec<Breach>, ScanError> {
    match status {
        404 => Ok(Vec::new()),
        200..=299 => serde_json::from_str(body)
            .map_err(|e| ScanError::parse(PROVIDER, format!("Unexpected breach list: {}", e))),
        _ => {
            let message = match body.trim() {
                "" => format!("API error: {}", status),
                text => text.to_string(),
            };
            Err(ScanError::transport(PROVIDER, Some(status), message))
        }
    }
}

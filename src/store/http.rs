//! kintone REST client.

use super::{RecordQuery, RecordStore, wire};
use crate::models::{AppId, FieldSchema, Record, RecordId};
use crate::security::Credentials;
use crate::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Suffix added to domains given without one.
pub const DEFAULT_DOMAIN_SUFFIX: &str = ".cybozu.com";

const RECORDS_PATH: &str = "/k/v1/records.json";
const FORM_FIELDS_PATH: &str = "/k/v1/app/form/fields.json";

/// HTTP client timeouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl HttpConfig {
    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_millis("KINTONE_TRANSFER_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_millis("KINTONE_TRANSFER_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

fn env_millis(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Builds a blocking HTTP client with configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> Client {
    let mut builder = Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build HTTP client: {err}");
        Client::new()
    })
}

/// Normalizes a domain: strips a scheme and trailing slashes, and appends
/// [`DEFAULT_DOMAIN_SUFFIX`] to a bare sub-domain.
#[must_use]
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain)
        .trim_end_matches('/');

    if domain.contains('.') {
        domain.to_string()
    } else {
        format!("{domain}{DEFAULT_DOMAIN_SUFFIX}")
    }
}

/// [`RecordStore`] backed by the kintone REST API.
pub struct KintoneClient {
    /// Base URL, without a trailing slash.
    base_url: String,
    /// Authentication.
    credentials: Credentials,
    /// HTTP client.
    client: Client,
}

impl KintoneClient {
    /// Creates a client for a domain.
    #[must_use]
    pub fn new(domain: &str, credentials: Credentials, config: HttpConfig) -> Self {
        Self {
            base_url: format!("https://{}", normalize_domain(domain)),
            credentials,
            client: build_http_client(config),
        }
    }

    /// Sets the base URL, replacing the one derived from the domain.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        self.credentials
            .headers()
            .into_iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value))
    }

    /// Sends a request and returns the JSON body.
    ///
    /// Failures become `Network` errors for reads and `RemoteWrite` errors
    /// for writes.
    fn send(&self, builder: RequestBuilder, operation: &str, write: bool) -> Result<Value> {
        let fail = |cause: String| {
            tracing::error!(operation, error = %cause, "kintone request failed");
            if write {
                Error::RemoteWrite {
                    operation: operation.to_string(),
                    cause,
                }
            } else {
                Error::Network {
                    operation: operation.to_string(),
                    cause,
                }
            }
        };

        let response = self
            .authorized(builder)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(body);
            return Err(fail(format!("API returned status: {status} - {message}")));
        }

        response
            .json::<Value>()
            .map_err(|e| fail(format!("Invalid JSON: {e}")))
    }
}

impl RecordStore for KintoneClient {
    fn fetch_page(&self, query: &RecordQuery, offset: usize, limit: usize) -> Result<Vec<Record>> {
        let mut params = vec![
            ("app".to_string(), query.app.to_string()),
            ("query".to_string(), query.page_query(offset, limit)),
        ];
        for (i, field) in query.fields.iter().flatten().enumerate() {
            params.push((format!("fields[{i}]"), field.clone()));
        }

        tracing::debug!(app = %query.app, offset, limit, "GET records");
        let builder = self
            .client
            .get(format!("{}{RECORDS_PATH}", self.base_url))
            .query(&params);
        let body = self.send(builder, "fetch_records", false)?;
        wire::records_from_response(&body).map_err(|e| Error::Network {
            operation: "fetch_records".to_string(),
            cause: e.to_string(),
        })
    }

    fn fetch_fields(&self, app: AppId) -> Result<FieldSchema> {
        tracing::debug!(app = %app, "GET form fields");
        let builder = self
            .client
            .get(format!("{}{FORM_FIELDS_PATH}", self.base_url))
            .query(&[("app", app.to_string())]);
        let body = self.send(builder, "fetch_fields", false)?;
        wire::schema_from_form_fields(&body).map_err(|e| Error::Network {
            operation: "fetch_fields".to_string(),
            cause: e.to_string(),
        })
    }

    fn delete_batch(&self, app: AppId, ids: &[RecordId]) -> Result<()> {
        tracing::debug!(app = %app, count = ids.len(), "DELETE records");
        let builder = self
            .client
            .delete(format!("{}{RECORDS_PATH}", self.base_url))
            .json(&wire::delete_payload(app, ids));
        self.send(builder, "delete_records", true)?;
        Ok(())
    }

    fn insert_batch(&self, app: AppId, records: &[Record]) -> Result<Vec<RecordId>> {
        tracing::debug!(app = %app, count = records.len(), "POST records");
        let builder = self
            .client
            .post(format!("{}{RECORDS_PATH}", self.base_url))
            .json(&wire::insert_payload(app, records));
        let body = self.send(builder, "insert_records", true)?;
        wire::ids_from_response(&body).map_err(|e| Error::RemoteWrite {
            operation: "insert_records".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Auth;
    use secrecy::SecretString;

    fn token() -> Credentials {
        Credentials {
            auth: Auth::ApiToken(SecretString::from("t".to_string())),
            basic: None,
        }
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("example"), "example.cybozu.com");
        assert_eq!(normalize_domain("example.kintone.com"), "example.kintone.com");
        assert_eq!(
            normalize_domain("https://example.cybozu.com/"),
            "example.cybozu.com"
        );
        assert_eq!(normalize_domain(" sub "), "sub.cybozu.com");
    }

    #[test]
    fn test_base_url() {
        let client = KintoneClient::new(
            "example",
            token(),
            HttpConfig::default(),
        );
        assert_eq!(client.base_url(), "https://example.cybozu.com");

        let client = client.with_base_url("http://127.0.0.1:8080/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_timeouts_disabled_by_default() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout_ms, 0);
        assert_eq!(config.connect_timeout_ms, 0);
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        let client = KintoneClient::new(
            "example",
            token(),
            HttpConfig {
                timeout_ms: 2_000,
                connect_timeout_ms: 1_000,
            },
        )
        .with_base_url("http://127.0.0.1:9");
        let query = RecordQuery::new(AppId::new(1));
        assert!(matches!(
            client.fetch_page(&query, 0, 100),
            Err(Error::Network { .. })
        ));
        assert!(matches!(
            client.insert_batch(AppId::new(1), &[]),
            Err(Error::RemoteWrite { .. })
        ));
    }
}

// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for HarborDNS.
//
// ## Scope
//
// - One HTTP request per provider call (zone listing follows pagination)
// - Full error propagation; the applier reports failures and the next
//   reconciliation cycle recovers
// - HTTP timeout configured (30 seconds)
// - Specific error mapping for HTTP status codes (401/403, 404, 429, 5xx)
// - No retry, backoff, caching or background tasks in this crate
//
// ## Authentication
//
// Either a scoped API token (`Authorization: Bearer ...`) or the account
// email plus global API key (`X-Auth-Email` / `X-Auth-Key`).
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or Debug output
// - Construction fails fast if credentials are empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Edit DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use harbordns_core::config::ProviderConfig;
use harbordns_core::traits::{DnsProvider, DnsProviderFactory, ExistingRecord, NewRecord, Zone};
use harbordns_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Zones requested per page when listing
const ZONES_PER_PAGE: u32 = 50;

const PROVIDER: &str = "cloudflare";

/// Cloudflare API credentials
#[derive(Clone)]
pub enum Credentials {
    /// Scoped API token
    Token(String),
    /// Account email plus global API key
    GlobalKey { email: String, key: String },
}

impl Credentials {
    fn is_empty(&self) -> bool {
        match self {
            Credentials::Token(token) => token.is_empty(),
            Credentials::GlobalKey { email, key } => email.is_empty() || key.is_empty(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "api-token",
            Credentials::GlobalKey { .. } => "global-key",
        }
    }
}

// Custom Debug implementation that hides the secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())?;
        f.write_str("(<REDACTED>)")
    }
}

/// Cloudflare DNS provider
///
/// Stateless apart from the HTTP client; zone caching is owned by the
/// core applier.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose credentials.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API root, overridable for tests and proxies
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider against the public API
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the credentials are empty, or an
    /// HTTP error if the client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a custom API root
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::config("Cloudflare credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and unwrap the v4 response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Envelope<T>> {
        let response = self
            .credentials
            .authorize(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::network(format!("Cloudflare {} request failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &body, operation));
        }

        let body = response.text().await.map_err(|e| {
            Error::network(format!("Cloudflare {} response cut short: {}", operation, e))
        })?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", operation, describe(&envelope.errors)),
            ));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let request = self.client.get(self.url("/zones")).query(&[
                ("page", page.to_string()),
                ("per_page", ZONES_PER_PAGE.to_string()),
            ]);
            let envelope: Envelope<Vec<ZoneBody>> = self.send(request, "zone listing").await?;

            zones.extend(
                envelope
                    .result
                    .unwrap_or_default()
                    .into_iter()
                    .map(|z| Zone::new(z.id, z.name)),
            );

            let total_pages = envelope.result_info.map_or(1, |info| info.total_pages);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Cloudflare returned {} zone(s)", zones.len());
        Ok(zones)
    }

    async fn lookup(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: &str,
    ) -> Result<Vec<ExistingRecord>> {
        tracing::debug!(
            "Looking up {} record {} in zone {}",
            record_type,
            hostname,
            zone.name
        );

        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone.id)))
            .query(&[("name", hostname), ("type", record_type)]);
        let envelope: Envelope<Vec<RecordBody>> = self.send(request, "record lookup").await?;

        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .map(ExistingRecord::from)
            .collect())
    }

    async fn create(&self, zone: &Zone, record: &NewRecord) -> Result<ExistingRecord> {
        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone.id)))
            .json(&RecordPayload::from(record));
        let envelope: Envelope<RecordBody> = self.send(request, "record creation").await?;

        envelope
            .result
            .map(ExistingRecord::from)
            .ok_or_else(|| Error::provider(PROVIDER, "record creation returned no record"))
    }

    async fn update(&self, zone: &Zone, record_id: &str, record: &NewRecord) -> Result<ExistingRecord> {
        let request = self
            .client
            .patch(self.url(&format!("/zones/{}/dns_records/{}", zone.id, record_id)))
            .json(&RecordPayload::from(record));
        let envelope: Envelope<RecordBody> = self.send(request, "record update").await?;

        envelope
            .result
            .map(ExistingRecord::from)
            .ok_or_else(|| Error::provider(PROVIDER, "record update returned no record"))
    }

    async fn delete(&self, zone: &Zone, record_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/zones/{}/dns_records/{}", zone.id, record_id)));
        let _: Envelope<serde_json::Value> = self.send(request, "record deletion").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ZoneBody {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

impl From<RecordBody> for ExistingRecord {
    fn from(body: RecordBody) -> Self {
        ExistingRecord {
            id: body.id,
            name: body.name,
            record_type: body.record_type,
            content: body.content,
            ttl: body.ttl,
            proxied: body.proxied,
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> From<&'a NewRecord> for RecordPayload<'a> {
    fn from(record: &'a NewRecord) -> Self {
        RecordPayload {
            record_type: &record.record_type,
            name: &record.hostname,
            content: &record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error detail".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str, operation: &str) -> Error {
    // Prefer Cloudflare's own error list over the raw body
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|envelope| describe(&envelope.errors))
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Cloudflare rejected credentials during {} (status {}): {}",
            operation, status, detail
        )),
        404 => Error::not_found(format!("{} target not found: {}", operation, detail)),
        429 => Error::rate_limited(format!(
            "Cloudflare rate limit hit during {}: {}",
            operation, detail
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, detail),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", operation, status, detail),
        ),
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                api_email,
                api_key,
                base_url,
            } => {
                let credentials = match (api_token, api_email, api_key) {
                    (Some(token), _, _) if !token.is_empty() => Credentials::Token(token.clone()),
                    (_, Some(email), Some(key)) => Credentials::GlobalKey {
                        email: email.clone(),
                        key: key.clone(),
                    },
                    _ => {
                        return Err(Error::config(
                            "Cloudflare requires an API token or an email and API key",
                        ));
                    }
                };

                tracing::debug!("Cloudflare authentication: {}", credentials.kind());

                let provider = match base_url {
                    Some(url) => CloudflareProvider::with_base_url(credentials, url.clone())?,
                    None => CloudflareProvider::new(credentials)?,
                };
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// This function should be called during initialization to make the
/// Cloudflare provider available.
///
/// # Example
///
/// ```rust
/// use harbordns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// harbordns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &harbordns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn token_provider(server: &mockito::ServerGuard) -> CloudflareProvider {
        CloudflareProvider::with_base_url(Credentials::Token("test-token".to_string()), server.url())
            .unwrap()
    }

    fn zone() -> Zone {
        Zone::new("z1", "example.com")
    }

    fn new_record(content: &str) -> NewRecord {
        NewRecord {
            hostname: "app.example.com".to_string(),
            record_type: "CNAME".to_string(),
            content: content.to_string(),
            ttl: 300,
            proxied: false,
        }
    }

    fn record_json(id: &str, content: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "app.example.com",
            "type": "CNAME",
            "content": content,
            "ttl": 300,
            "proxied": false
        })
    }

    #[test]
    fn test_factory_creation() {
        let token = ProviderConfig::Cloudflare {
            api_token: Some("test_token".to_string()),
            api_email: None,
            api_key: None,
            base_url: None,
        };
        assert!(CloudflareFactory.create(&token).is_ok());

        let global_key = ProviderConfig::Cloudflare {
            api_token: None,
            api_email: Some("ops@example.com".to_string()),
            api_key: Some("key".to_string()),
            base_url: None,
        };
        assert!(CloudflareFactory.create(&global_key).is_ok());
    }

    #[test]
    fn test_factory_missing_credentials() {
        let config = ProviderConfig::Cloudflare {
            api_token: Some(String::new()),
            api_email: Some("ops@example.com".to_string()),
            api_key: None,
            base_url: None,
        };
        assert!(matches!(
            CloudflareFactory.create(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = CloudflareProvider::new(Credentials::Token(String::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_not_exposed_in_debug() {
        let provider = CloudflareProvider::new(Credentials::GlobalKey {
            email: "ops@example.com".to_string(),
            key: "secret_key_12345".to_string(),
        })
        .unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(!debug_str.contains("ops@example.com"));
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains("global-key"));
    }

    #[test]
    fn test_provider_name() {
        let provider = CloudflareProvider::new(Credentials::Token("token".to_string())).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn test_register() {
        let registry = harbordns_core::ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_provider("cloudflare"));
    }

    #[tokio::test]
    async fn list_zones_follows_pagination() {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/zones")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "errors": [],
                    "result": [{"id": "z1", "name": "example.com"}],
                    "result_info": {"page": 1, "total_pages": 2}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/zones")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "errors": [],
                    "result": [{"id": "z2", "name": "api.example.com"}],
                    "result_info": {"page": 2, "total_pages": 2}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let zones = token_provider(&server).list_zones().await.unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        assert_eq!(
            zones,
            vec![
                Zone::new("z1", "example.com"),
                Zone::new("z2", "api.example.com")
            ]
        );
    }

    #[tokio::test]
    async fn lookup_filters_by_name_and_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/zones/z1/dns_records")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "app.example.com".into()),
                Matcher::UrlEncoded("type".into(), "CNAME".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "errors": [],
                    "result": [record_json("r1", "edge.example.com")]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let records = token_provider(&server)
            .lookup(&zone(), "app.example.com", "CNAME")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].content, "edge.example.com");
        assert_eq!(records[0].ttl, 300);
    }

    #[tokio::test]
    async fn empty_lookup_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/zones/z1/dns_records")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"success": true, "errors": [], "result": []}).to_string())
            .create_async()
            .await;

        let records = token_provider(&server)
            .lookup(&zone(), "app.example.com", "CNAME")
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn create_posts_full_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/zones/z1/dns_records")
            .match_body(Matcher::Json(json!({
                "type": "CNAME",
                "name": "app.example.com",
                "content": "edge.example.com",
                "ttl": 300,
                "proxied": false
            })))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "errors": [],
                    "result": record_json("r9", "edge.example.com")
                })
                .to_string(),
            )
            .create_async()
            .await;

        let created = token_provider(&server)
            .create(&zone(), &new_record("edge.example.com"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created.id, "r9");
    }

    #[tokio::test]
    async fn update_patches_record_with_global_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/zones/z1/dns_records/r1")
            .match_header("x-auth-email", "ops@example.com")
            .match_header("x-auth-key", "secret")
            .match_body(Matcher::PartialJson(json!({"content": "new.example.com"})))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "errors": [],
                    "result": record_json("r1", "new.example.com")
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = CloudflareProvider::with_base_url(
            Credentials::GlobalKey {
                email: "ops@example.com".to_string(),
                key: "secret".to_string(),
            },
            server.url(),
        )
        .unwrap();

        let updated = provider
            .update(&zone(), "r1", &new_record("new.example.com"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(updated.content, "new.example.com");
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/zones/z1/dns_records/r1")
            .with_status(200)
            .with_body(json!({"success": true, "errors": [], "result": {"id": "r1"}}).to_string())
            .create_async()
            .await;

        token_provider(&server).delete(&zone(), "r1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let cases: [(usize, fn(&Error) -> bool); 4] = [
            (403, |e| matches!(e, Error::Authentication(_))),
            (404, |e| matches!(e, Error::NotFound(_))),
            (429, |e| matches!(e, Error::RateLimited(_))),
            (503, |e| matches!(e, Error::Provider { .. })),
        ];

        for (status, is_expected) in cases {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("DELETE", "/zones/z1/dns_records/r1")
                .with_status(status)
                .with_body(
                    json!({
                        "success": false,
                        "errors": [{"code": 1000, "message": "nope"}],
                        "result": null
                    })
                    .to_string(),
                )
                .create_async()
                .await;

            let err = token_provider(&server)
                .delete(&zone(), "r1")
                .await
                .unwrap_err();
            assert!(is_expected(&err), "status {} mapped to {:?}", status, err);
            assert!(err.to_string().contains("[1000] nope"));
        }
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/zones/z1/dns_records")
            .with_status(200)
            .with_body(
                json!({
                    "success": false,
                    "errors": [{"code": 81053, "message": "record already exists"}],
                    "result": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = token_provider(&server)
            .create(&zone(), &new_record("edge.example.com"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("record already exists"));
    }

    #[tokio::test]
    async fn garbled_body_is_a_json_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = token_provider(&server).list_zones().await.unwrap_err();
        assert!(matches!(err, Error::Json(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        // Nothing is expected to listen on the discard port
        let provider = CloudflareProvider::with_base_url(
            Credentials::Token("test-token".to_string()),
            "http://127.0.0.1:9",
        )
        .unwrap();

        let err = provider.list_zones().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {:?}", err);
    }
}

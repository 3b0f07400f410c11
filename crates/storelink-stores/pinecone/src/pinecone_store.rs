use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use storelink_core::{
    Error, LifetimeScope, Result, Stage, StoreClient, StoreConnector, StoreKind, Timeouts,
};
use tracing::{debug, info, warn};
use url::Url;

const API_KEY_HEADER: &str = "api-key";
const API_VERSION_HEADER: &str = "x-pinecone-api-version";
const MAX_INDEX_NAME_LEN: usize = 45;

#[derive(Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Project API key
    #[serde(default)]
    pub api_key: String,

    /// Name of the index to resolve and connect to
    #[serde(default)]
    pub index_name: String,

    /// Control plane base URL, used for describe calls
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "Timeouts::vector_index")]
    pub timeouts: Timeouts,
}

fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_api_version() -> String {
    "2024-07".to_string()
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            control_plane_url: default_control_plane_url(),
            api_version: default_api_version(),
            timeouts: Timeouts::vector_index(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "Pinecone API key is required".to_string(),
            ));
        }
        let name = self.index_name.trim();
        if name.is_empty() {
            return Err(Error::Configuration(
                "Pinecone index name is required".to_string(),
            ));
        }
        // Pinecone index names: lowercase alphanumerics and '-', at most 45 chars
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || name.len() > MAX_INDEX_NAME_LEN {
            return Err(Error::Configuration(format!(
                "Invalid Pinecone index name '{}': use at most {} lowercase letters, digits or '-'",
                name, MAX_INDEX_NAME_LEN
            )));
        }
        Ok(())
    }
}

/// Control plane URL describing `name`. The index path is appended to any
/// path the base already carries.
fn describe_url(control_plane_url: &str, name: &str) -> Result<Url> {
    let mut url = Url::parse(control_plane_url).map_err(|e| {
        Error::Configuration(format!("Invalid Pinecone control plane URL: {}", e))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            Error::Configuration(format!(
                "Pinecone control plane URL '{}' cannot carry a path",
                control_plane_url
            ))
        })?
        .pop_if_empty()
        .push("indexes")
        .push(name);
    Ok(url)
}

impl fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("api_key", &"***")
            .field("index_name", &self.index_name)
            .field("control_plane_url", &self.control_plane_url)
            .field("api_version", &self.api_version)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Index metadata returned by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub dimension: Option<u32>,

    #[serde(default)]
    pub metric: Option<String>,

    #[serde(default)]
    pub status: Option<IndexStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,

    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: Option<u32>,

    #[serde(default)]
    pub index_fullness: f64,

    #[serde(default)]
    pub total_vector_count: u64,

    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

pub struct PineconeConnector {
    config: PineconeConfig,
}

impl PineconeConnector {
    pub fn new(config: PineconeConfig) -> Self {
        Self { config }
    }

    fn build_http_client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(self.config.api_key.trim()).map_err(|_| {
            Error::Configuration("Pinecone API key is not a valid header value".to_string())
        })?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let version = HeaderValue::from_str(&self.config.api_version).map_err(|_| {
            Error::Configuration(format!(
                "Invalid Pinecone API version '{}'",
                self.config.api_version
            ))
        })?;
        headers.insert(API_VERSION_HEADER, version);

        let timeouts = self.config.timeouts;
        Client::builder()
            .default_headers(headers)
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.read())
            .build()
            .map_err(|e| Error::Connect(format!("Failed to create Pinecone client: {}", e)))
    }

    async fn describe_index(&self, http: &Client) -> Result<IndexDescription> {
        let url = describe_url(
            &self.config.control_plane_url,
            self.config.index_name.trim(),
        )?;

        debug!("Describing Pinecone index at {}", url);

        let response = http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Resolution(format!("Failed to describe index: {}", e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(Error::Resolution(format!(
                    "Pinecone index '{}' not found",
                    self.config.index_name
                )));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Resolution(format!(
                    "Describe index '{}' returned {}: {}",
                    self.config.index_name, status, body
                )));
            }
        }

        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| Error::Resolution(format!("Invalid describe index response: {}", e)))?;

        if description.host.trim().is_empty() {
            return Err(Error::Resolution(format!(
                "Pinecone index '{}' has no host",
                self.config.index_name
            )));
        }

        Ok(description)
    }
}

/// Data plane base URL for a described host. Hosts normally come without a
/// scheme, in which case https is assumed.
fn index_url(host: &str) -> Result<Url> {
    let host = host.trim();
    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Url::parse(&raw)
        .map_err(|e| Error::Connect(format!("Invalid Pinecone index host '{}': {}", host, e)))
}

#[async_trait]
impl StoreConnector for PineconeConnector {
    type Client = PineconeStore;

    fn kind(&self) -> StoreKind {
        StoreKind::VectorIndex
    }

    fn timeouts(&self) -> Timeouts {
        self.config.timeouts
    }

    async fn connect(&self, scope: &LifetimeScope) -> Result<PineconeStore> {
        self.config.validate()?;

        let http = self.build_http_client()?;

        info!("Resolving Pinecone index '{}'", self.config.index_name);

        let description = scope
            .run(
                Stage::Resolve,
                self.config.timeouts.read(),
                self.describe_index(&http),
            )
            .await?;

        if let Some(status) = description.status.as_ref().filter(|s| !s.ready) {
            warn!(
                "Pinecone index '{}' is not ready (state: {})",
                description.name, status.state
            );
        }

        let index_url = index_url(&description.host)?;
        info!("Connecting to Pinecone index host: {}", index_url);

        Ok(PineconeStore {
            http,
            index_url,
            description,
            closed: AtomicBool::new(false),
            timeouts: self.config.timeouts,
        })
    }
}

/// Connection to one Pinecone index's data plane
pub struct PineconeStore {
    http: Client,
    index_url: Url,
    description: IndexDescription,
    closed: AtomicBool,
    timeouts: Timeouts,
}

impl PineconeStore {
    pub fn description(&self) -> &IndexDescription {
        &self.description
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    /// HTTP client carrying the API key, for data plane requests
    pub fn http(&self) -> Result<&Client> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Connect("Pinecone client is closed".to_string()));
        }
        Ok(&self.http)
    }

    pub async fn describe_index_stats(&self) -> Result<IndexStats> {
        let url = self
            .index_url
            .join("describe_index_stats")
            .map_err(|e| Error::Connect(format!("Invalid Pinecone index URL: {}", e)))?;

        let response = self
            .http()?
            .post(url)
            .timeout(self.timeouts.read())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| Error::Connect(format!("Describe index stats failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connect(format!(
                "Describe index stats returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Connect(format!("Invalid index stats response: {}", e)))
    }
}

#[async_trait]
impl StoreClient for PineconeStore {
    fn kind(&self) -> StoreKind {
        StoreKind::VectorIndex
    }

    fn endpoint(&self) -> String {
        format!("{} ({})", self.index_url, self.description.name)
    }

    async fn ping(&self) -> Result<()> {
        let stats = self
            .describe_index_stats()
            .await
            .map_err(|e| Error::Liveness(e.to_string()))?;
        debug!(
            "Pinecone index '{}' holds {} vectors",
            self.description.name, stats.total_vector_count
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from Pinecone");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use storelink_core::ConnectionManager;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP stand-in for the control and data planes. The describe
    /// response points the data plane back at the same listener.
    struct FakePinecone {
        base: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakePinecone {
        async fn start(describe: (u16, Option<serde_json::Value>), stats_status: u16) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let describe_body = describe
                .1
                .unwrap_or_else(|| json!({"name": "media", "host": base, "status": {"ready": true, "state": "Ready"}}))
                .to_string();
            let stats_body = json!({"dimension": 1536, "indexFullness": 0.0, "totalVectorCount": 42, "namespaces": {}}).to_string();

            let seen = requests.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let request_line = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request_line.clone());

                    let (status, body) = if request_line.starts_with("GET /indexes/") {
                        (describe.0, describe_body.clone())
                    } else if request_line.starts_with("POST /describe_index_stats") {
                        (stats_status, stats_body.clone())
                    } else {
                        (404, "{}".to_string())
                    };

                    let response = format!(
                        "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { base, requests }
        }

        fn config(&self, api_key: &str) -> PineconeConfig {
            PineconeConfig {
                control_plane_url: self.base.clone(),
                ..PineconeConfig::new(api_key, "media")
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        let mut body_read = buf.len() - header_end;
        while body_read < content_length {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            body_read += n;
        }

        head.lines().next().unwrap_or_default().to_string()
    }

    #[test]
    fn test_deserialization_defaults() {
        let config: PineconeConfig =
            serde_json::from_value(json!({"api_key": "k", "index_name": "media"})).unwrap();
        assert_eq!(config.control_plane_url, "https://api.pinecone.io");
        assert_eq!(config.timeouts, Timeouts::vector_index());
        assert!(!format!("{:?}", config).contains("\"k\""));
    }

    #[test]
    fn test_index_url_assumes_https() {
        let url = index_url("media-abc123.svc.pinecone.io").unwrap();
        assert_eq!(url.as_str(), "https://media-abc123.svc.pinecone.io/");
        let url = index_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_describe_url_keeps_base_path() {
        let url = describe_url("https://proxy.internal/pinecone", "media").unwrap();
        assert_eq!(url.as_str(), "https://proxy.internal/pinecone/indexes/media");

        let url = describe_url("https://api.pinecone.io/", "media").unwrap();
        assert_eq!(url.as_str(), "https://api.pinecone.io/indexes/media");
    }

    #[test]
    fn test_describe_url_rejects_non_hierarchical_base() {
        let err = describe_url("mailto:ops@example.com", "media").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_index_name_outside_pinecone_charset_is_rejected() {
        let too_long = "a".repeat(46);
        for name in ["indexes/../admin", "../admin", "Media", "media?x=1", too_long.as_str()] {
            let err = PineconeConfig::new("key", name).validate().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{}", name);
        }
        assert!(PineconeConfig::new("key", "media-2024").validate().is_ok());
    }

    #[tokio::test]
    async fn test_traversing_index_name_skips_describe() {
        let server = FakePinecone::start((200, None), 200).await;
        let config = PineconeConfig {
            index_name: "../admin".to_string(),
            ..server.config("key")
        };
        let err = ConnectionManager::connect(&PineconeConnector::new(config))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_connect_resolves_index_then_probes_host() {
        let server = FakePinecone::start((200, None), 200).await;
        let handle = ConnectionManager::connect(&PineconeConnector::new(server.config("key")))
            .await
            .unwrap();

        assert_eq!(handle.client().description().name, "media");
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /indexes/media"));
        assert!(requests[1].starts_with("POST /describe_index_stats"));

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_describe() {
        let server = FakePinecone::start((200, None), 200).await;
        let err = ConnectionManager::connect(&PineconeConnector::new(server.config("")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_index_is_resolution_error() {
        let server = FakePinecone::start((404, Some(json!({"error": "not found"}))), 200).await;
        let err = ConnectionManager::connect(&PineconeConnector::new(server.config("key")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_index_without_host_is_resolution_error() {
        let server = FakePinecone::start((200, Some(json!({"name": "media", "host": ""}))), 200).await;
        let err = ConnectionManager::connect(&PineconeConnector::new(server.config("key")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn test_failing_stats_is_liveness_error() {
        let server = FakePinecone::start((200, None), 500).await;
        let err = ConnectionManager::connect(&PineconeConnector::new(server.config("key")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Liveness(_)));
        assert_eq!(server.requests().len(), 2);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use storelink_core::{Error, Result, StoreConfig, StoreKind};
use storelink_mongo::MongoConfig;
use storelink_pinecone::PineconeConfig;
use storelink_redis::{parse_logical_index, RedisConfig};
use tracing::debug;
use url::Url;

/// Flat settings as they appear in the environment (lowercased) or in
/// `storelink.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    pub mongo_local_uri: Option<String>,
    pub mongo_database: Option<String>,

    pub pinecone_api_key: Option<String>,
    pub pinecone_index: Option<String>,
    pub pinecone_controller_url: Option<String>,

    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: Option<String>,

    pub storelink_log: Option<String>,
    pub storelink_log_json: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// `None` when no connection URI was supplied; checking the document
    /// store then fails with a configuration error
    pub document: Option<MongoConfig>,

    /// Present when either Pinecone setting was supplied
    pub vector_index: Option<PineconeConfig>,

    /// Every cache setting has a default, so the cache is always configured
    pub cache: RedisConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load from `<config_dir>/storelink.yaml` (optional), then the process
    /// environment, which takes precedence.
    pub fn load(config_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_dir = config_dir.as_ref();
        let s = config::Config::builder()
            .add_source(
                config::File::with_name(&config_dir.join("storelink.yaml").to_string_lossy())
                    .required(false),
            )
            .add_source(config::Environment::default())
            .build()?;

        let raw: RawSettings = s.try_deserialize()?;
        Ok(Self::from_raw(raw)?)
    }

    /// Build from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let s = config::Config::builder()
            .add_source(config::Environment::default().source(Some(vars)))
            .build()?;

        let raw: RawSettings = s.try_deserialize()?;
        Ok(Self::from_raw(raw)?)
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self> {
        let document = non_empty(raw.mongo_local_uri).map(|uri| {
            let mut config = MongoConfig::new(uri);
            if let Some(database) = non_empty(raw.mongo_database) {
                config.database = database;
            }
            config
        });

        let api_key = non_empty(raw.pinecone_api_key);
        let index_name = non_empty(raw.pinecone_index);
        let vector_index = if api_key.is_some() || index_name.is_some() {
            let mut config =
                PineconeConfig::new(api_key.unwrap_or_default(), index_name.unwrap_or_default());
            if let Some(url) = non_empty(raw.pinecone_controller_url) {
                config.control_plane_url = url;
            }
            Some(config)
        } else {
            None
        };

        let mut cache = RedisConfig {
            url: non_empty(raw.redis_url),
            ..RedisConfig::default()
        };
        if let Some(host) = non_empty(raw.redis_host) {
            cache.host = host;
        }
        if let Some(port) = non_empty(raw.redis_port) {
            cache.port = port.parse().map_err(|_| {
                Error::Configuration(format!("Invalid Redis port '{}'", port))
            })?;
        }
        cache.password = raw.redis_password.unwrap_or_default();
        cache.database = raw
            .redis_db
            .as_deref()
            .map(parse_logical_index)
            .unwrap_or(0);

        let mut logging = LoggingConfig::default();
        if let Some(level) = non_empty(raw.storelink_log) {
            logging.level = level.to_lowercase();
        }
        if let Some(json) = non_empty(raw.storelink_log_json) {
            logging.json = matches!(json.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }

        debug!(
            "Resolved store settings: document={}, vector_index={}, cache=always",
            document.is_some(),
            vector_index.is_some()
        );

        Ok(Self {
            document,
            vector_index,
            cache,
            logging,
        })
    }

    /// Store kinds checked by default. The document store is always
    /// included since its URI has no default; a missing one surfaces as a
    /// configuration error from `store_config`.
    pub fn configured_stores(&self) -> Vec<StoreKind> {
        StoreKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                StoreKind::Document => true,
                StoreKind::VectorIndex => self.vector_index.is_some(),
                StoreKind::Cache => true,
            })
            .collect()
    }

    /// Backend configuration for one store kind
    pub fn store_config(&self, kind: StoreKind) -> Result<StoreConfig> {
        let config = match kind {
            StoreKind::Document => serde_json::to_value(self.document.as_ref().ok_or_else(|| {
                Error::Configuration("MONGO_LOCAL_URI is not set".to_string())
            })?)?,
            StoreKind::VectorIndex => {
                serde_json::to_value(self.vector_index.as_ref().ok_or_else(|| {
                    Error::Configuration(
                        "PINECONE_API_KEY and PINECONE_INDEX are not set".to_string(),
                    )
                })?)?
            }
            StoreKind::Cache => serde_json::to_value(&self.cache)?,
        };
        Ok(StoreConfig::new(kind, config))
    }

    /// Configuration with credentials masked, for display
    pub fn redacted(&self) -> Value {
        json!({
            "document": self.document.as_ref().map(|c| json!({
                "uri": mask_url(&c.uri),
                "database": c.database,
                "timeouts": c.timeouts,
            })),
            "vector_index": self.vector_index.as_ref().map(|c| json!({
                "api_key": if c.api_key.is_empty() { "" } else { "***" },
                "index_name": c.index_name,
                "control_plane_url": c.control_plane_url,
                "timeouts": c.timeouts,
            })),
            "cache": {
                "url": self.cache.url.as_deref().map(mask_url),
                "host": self.cache.host,
                "port": self.cache.port,
                "password": if self.cache.password.is_empty() { "" } else { "***" },
                "database": self.cache.database,
                "pool": self.cache.pool,
                "timeouts": self.cache.timeouts,
            },
            "logging": self.logging,
        })
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(&self.redacted())?)
    }
}

/// Replace the password in a URL's userinfo, if any
fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "<unparsable>".to_string(),
    }
}

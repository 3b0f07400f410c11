use ::async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, FromRedisValue, IntoConnectionInfo};
use serde::{Deserialize, Serialize};
use storelink_core::{
    Error, LifetimeScope, Result, Stage, StoreClient, StoreConnector, StoreKind, Timeouts,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Full connection URL (redis:// or rediss://). When set, host, port,
    /// password and database are taken from it instead.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty means no AUTH
    #[serde(default)]
    pub password: String,

    /// Logical database index
    #[serde(default = "default_database")]
    pub database: i64,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default = "Timeouts::cache")]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_size")]
    pub max_size: u32,

    #[serde(default = "default_min_idle")]
    pub min_idle: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_database() -> i64 {
    0
}

fn default_max_size() -> u32 {
    10
}

fn default_min_idle() -> u32 {
    2
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            database: 0,
            pool: PoolConfig::default(),
            timeouts: Timeouts::cache(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 2,
        }
    }
}

/// Parse a logical database index, falling back to 0 when it is not a number.
pub fn parse_logical_index(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    match raw.parse::<i64>() {
        Ok(index) if index >= 0 => index,
        _ => {
            warn!(
                "Ignoring invalid Redis logical database '{}', using 0",
                raw
            );
            0
        }
    }
}

impl RedisConfig {
    /// Resolve the driver connection info, from `url` when present
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        match &self.url {
            Some(url) if !url.trim().is_empty() => Self::info_from_url(url.trim()),
            _ => {
                let mut info = format!("redis://{}:{}", self.host, self.port)
                    .into_connection_info()
                    .map_err(|e| {
                        Error::Configuration(format!("Invalid Redis address: {}", e))
                    })?;
                info.redis.db = self.database;
                if !self.password.is_empty() {
                    info.redis.password = Some(self.password.clone());
                }
                Ok(info)
            }
        }
    }

    fn info_from_url(raw: &str) -> Result<ConnectionInfo> {
        let mut parsed = Url::parse(raw)
            .map_err(|e| Error::Configuration(format!("Invalid Redis URL: {}", e)))?;

        let database = parse_logical_index(parsed.path().trim_start_matches('/'));
        parsed.set_path("");

        let mut info = parsed
            .as_str()
            .into_connection_info()
            .map_err(|e| Error::Configuration(format!("Invalid Redis URL: {}", e)))?;
        info.redis.db = database;
        Ok(info)
    }
}

fn describe(info: &ConnectionInfo) -> String {
    let addr = match &info.addr {
        ConnectionAddr::Tcp(host, port) => format!("redis://{}:{}", host, port),
        ConnectionAddr::TcpTls { host, port, .. } => format!("rediss://{}:{}", host, port),
        other => format!("{:?}", other),
    };
    format!("{}/{}", addr, info.redis.db)
}

pub struct RedisConnector {
    config: RedisConfig,
}

impl RedisConnector {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    type Client = RedisStore;

    fn kind(&self) -> StoreKind {
        StoreKind::Cache
    }

    fn timeouts(&self) -> Timeouts {
        self.config.timeouts
    }

    async fn connect(&self, scope: &LifetimeScope) -> Result<RedisStore> {
        let info = self.config.connection_info()?;
        let endpoint = describe(&info);
        let timeouts = self.config.timeouts;
        let pool_config = self.config.pool;

        info!(
            "Connecting to Redis: {} (pool max={}, min_idle={})",
            endpoint, pool_config.max_size, pool_config.min_idle
        );

        let manager = RedisConnectionManager::new(info)
            .map_err(|e| Error::Connect(format!("Failed to create Redis client: {}", e)))?;

        let pool = scope
            .run(Stage::Connect, timeouts.connect(), async {
                Pool::builder()
                    .max_size(pool_config.max_size)
                    .min_idle(Some(pool_config.min_idle))
                    .connection_timeout(timeouts.connect())
                    .build(manager)
                    .await
                    .map_err(|e| Error::Connect(format!("Failed to connect to Redis: {}", e)))
            })
            .await?;

        debug!("Redis pool established for {}", endpoint);

        Ok(RedisStore {
            pool: Mutex::new(Some(pool)),
            endpoint,
            timeouts,
        })
    }
}

/// Pooled Redis client
pub struct RedisStore {
    pool: Mutex<Option<Pool<RedisConnectionManager>>>,
    endpoint: String,
    timeouts: Timeouts,
}

impl RedisStore {
    /// The connection pool. Fails once the store has been disconnected.
    pub async fn pool(&self) -> Result<Pool<RedisConnectionManager>> {
        self.pool
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Connect("Redis client is closed".to_string()))
    }

    /// Check out a connection, bounded by the write timeout
    pub async fn connection(&self) -> Result<PooledConnection<'static, RedisConnectionManager>> {
        let pool = self.pool().await?;
        let limit = self.timeouts.write();
        match tokio::time::timeout(limit, pool.get_owned()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(Error::Connect(format!(
                "Failed to get Redis connection: {}",
                e
            ))),
            Err(_) => Err(Error::Timeout {
                stage: Stage::Connect,
                after: limit,
            }),
        }
    }

    /// Run one command, waiting at most the read timeout for the reply
    pub async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let mut conn = self.connection().await?;
        let limit = self.timeouts.read();
        match tokio::time::timeout(limit, cmd.query_async::<_, T>(&mut *conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::Connect(format!("Redis command failed: {}", e))),
            Err(_) => Err(Error::Timeout {
                stage: Stage::Probe,
                after: limit,
            }),
        }
    }
}

#[async_trait]
impl StoreClient for RedisStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Cache
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn ping(&self) -> Result<()> {
        let reply: String = self
            .query(&redis::cmd("PING"))
            .await
            .map_err(|e| Error::Liveness(format!("Redis PING failed: {}", e)))?;

        if reply != "PONG" {
            return Err(Error::Liveness(format!(
                "Unexpected PING reply from Redis: {}",
                reply
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from Redis");
        // Idle connections close once the last checked-out one is returned
        if self.pool.lock().await.take().is_none() {
            debug!("Redis pool already released");
        }
        Ok(())
    }
}

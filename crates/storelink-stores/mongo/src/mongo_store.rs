use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};
use storelink_core::{
    Error, LifetimeScope, Result, Stage, StoreClient, StoreConnector, StoreKind, Timeouts,
};
use tracing::{debug, info};

/// Logical database used by the consumer application
pub const DEFAULT_DATABASE: &str = "project-consumer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection string (mongodb:// or mongodb+srv://)
    pub uri: String,

    /// Logical database selected on the client
    #[serde(default = "default_database")]
    pub database: String,

    /// Application name reported to the server
    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default = "Timeouts::document")]
    pub timeouts: Timeouts,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl MongoConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: default_database(),
            app_name: None,
            timeouts: Timeouts::document(),
        }
    }
}

pub struct MongoConnector {
    config: MongoConfig,
}

impl MongoConnector {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }

    async fn client_options(&self) -> Result<ClientOptions> {
        let uri = self.config.uri.trim();
        if uri.is_empty() {
            return Err(Error::Configuration(
                "MongoDB connection URI is required".to_string(),
            ));
        }

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| Error::Configuration(format!("Invalid MongoDB URI: {}", e)))?;

        let timeouts = self.config.timeouts;
        options.connect_timeout = Some(timeouts.connect());
        options.server_selection_timeout = Some(timeouts.connect());
        if let Some(app_name) = &self.config.app_name {
            options.app_name = Some(app_name.clone());
        }

        Ok(options)
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    type Client = MongoStore;

    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn timeouts(&self) -> Timeouts {
        self.config.timeouts
    }

    async fn connect(&self, scope: &LifetimeScope) -> Result<MongoStore> {
        let options = scope
            .run(
                Stage::Configure,
                self.config.timeouts.connect(),
                self.client_options(),
            )
            .await?;

        let hosts = options
            .hosts
            .iter()
            .map(|host| host.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let endpoint = format!("mongodb://{}/{}", hosts, self.config.database);

        info!("Connecting to MongoDB: {}", endpoint);

        let client = Client::with_options(options)
            .map_err(|e| Error::Connect(format!("Failed to create MongoDB client: {}", e)))?;
        let database = client.database(&self.config.database);

        Ok(MongoStore {
            client,
            database,
            endpoint,
        })
    }
}

/// MongoDB client with the application's logical database selected
pub struct MongoStore {
    client: Client,
    database: Database,
    endpoint: String,
}

impl MongoStore {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StoreClient for MongoStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::Liveness(format!("MongoDB ping failed: {}", e)))?;
        debug!("MongoDB ping succeeded");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from MongoDB");
        self.client.clone().shutdown().await;
        Ok(())
    }
}

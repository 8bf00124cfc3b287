use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use aws_config::{BehaviorVersion, Region};
use datakit_config::shared::Settings;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::info;

use crate::crm::CrmClient;
use crate::error::ConnectorError;
use crate::warehouse::WarehouseClient;

/// Cached factories for every external system a pipeline talks to.
///
/// Constructed once from the loaded [`Settings`] and shared across the
/// process; each factory builds its client on first use and returns the
/// identical client on every later call. Connection and auth errors surface
/// from the client's own operations, unchanged and unretried.
pub struct Connectors {
    settings: Arc<Settings>,
    postgres: OnceLock<PgPool>,
    s3: OnceCell<Arc<aws_sdk_s3::Client>>,
    warehouse: OnceLock<Option<Arc<WarehouseClient>>>,
    crm: OnceLock<Option<Arc<CrmClient>>>,
    sqlite: Mutex<HashMap<PathBuf, Arc<SqlitePool>>>,
}

impl Connectors {
    pub fn new(settings: Arc<Settings>) -> Connectors {
        Connectors {
            settings,
            postgres: OnceLock::new(),
            s3: OnceCell::new(),
            warehouse: OnceLock::new(),
            crm: OnceLock::new(),
            sqlite: Mutex::new(HashMap::new()),
        }
    }

    /// The shared Postgres pool.
    ///
    /// The pool connects lazily, so building it never touches the network;
    /// the first query does.
    pub fn postgres_pool(&self) -> &PgPool {
        self.postgres.get_or_init(|| {
            let config = &self.settings.postgres;

            info!(dsn = %config.redacted_dsn(), "creating postgres pool");

            PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect_lazy_with(config.with_db())
        })
    }

    /// The shared S3 client, built with the static credentials from the
    /// `storage` section.
    pub async fn s3_client(&self) -> Result<Arc<aws_sdk_s3::Client>, ConnectorError> {
        self.s3
            .get_or_try_init(|| async {
                let config = self
                    .settings
                    .storage
                    .as_ref()
                    .ok_or(ConnectorError::NotConfigured("storage"))?;

                let credentials = aws_sdk_s3::config::Credentials::new(
                    config.access_key.clone(),
                    config.secret_key.expose_secret().to_owned(),
                    None,
                    None,
                    "static",
                );

                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .credentials_provider(credentials)
                    .load()
                    .await;

                info!(bucket = %config.bucket, region = %config.region, "creating s3 client");

                Ok(Arc::new(aws_sdk_s3::Client::new(&sdk_config)))
            })
            .await
            .cloned()
    }

    /// The shared SQL warehouse client.
    pub fn warehouse(&self) -> Result<Arc<WarehouseClient>, ConnectorError> {
        self.warehouse
            .get_or_init(|| {
                self.settings
                    .warehouse
                    .as_ref()
                    .map(|config| Arc::new(WarehouseClient::new(config)))
            })
            .clone()
            .ok_or(ConnectorError::NotConfigured("warehouse"))
    }

    /// The shared CRM client.
    pub fn crm(&self) -> Result<Arc<CrmClient>, ConnectorError> {
        self.crm
            .get_or_init(|| {
                self.settings
                    .crm
                    .as_ref()
                    .map(|config| Arc::new(CrmClient::new(config)))
            })
            .clone()
            .ok_or(ConnectorError::NotConfigured("crm"))
    }

    /// A lazily-connecting SQLite pool for `path`, cached per path.
    ///
    /// Creates the parent directory when missing; the database file itself is
    /// created on first connect.
    pub fn sqlite_pool(&self, path: &Path) -> Result<Arc<SqlitePool>, ConnectorError> {
        let mut pools = self.sqlite.lock().expect("sqlite pool lock poisoned");

        if let Some(pool) = pools.get(path) {
            return Ok(Arc::clone(pool));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "creating sqlite pool");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = Arc::new(SqlitePoolOptions::new().connect_lazy_with(options));
        pools.insert(path.to_owned(), Arc::clone(&pool));

        Ok(pool)
    }
}

//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides:
//! - import helpers: save_student / save_tutor / save_preference
//! - the read-side collaborator traits: `PreferenceSource`,
//!   `StudentDirectory`, `TutorDirectory`
//!
//! Supports in-memory, local (surrealkv) and cloud (WebSocket) connections.

use crate::error::StateError;
use crate::identity::StudentKey;
use crate::migrations;
use crate::schema::{key_column, CountRow, PreferenceRow, StudentRow, TutorRow};
use crate::storage_traits::{
    PreferenceRecord, PreferenceSource, StorageResult, StudentDirectory, StudentRecord, TutorId,
    TutorDirectory, TutorRecord,
};
use crate::Result;
use crate::StorageError;
use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

const DEFAULT_NAMESPACE: &str = "tutormatch";
const DEFAULT_DATABASE: &str = "main";
const LOCAL_DB_PATH: &str = ".tutormatch/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "tutormatch")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "tutormatch")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for tutormatch
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Connect to SurrealDB Cloud
    ///
    /// # Example
    /// ```ignore
    /// let config = CloudConfig::new(
    ///     "wss://xxx.aws-use1.surrealdb.cloud",
    ///     "your_username",
    ///     "your_password",
    /// );
    /// let handle = SurrealHandle::setup_cloud(config).await?;
    /// ```
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB Cloud connected and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, persists locally under `.tutormatch/db`.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect_url(&url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await;
        }

        std::fs::create_dir_all(LOCAL_DB_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                LOCAL_DB_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", LOCAL_DB_PATH);
        info!(
            "No cloud config or SURREALDB_URL found, using local persistence: {}",
            url
        );
        Self::connect_url(&url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    async fn connect_url(url: &str, namespace: &str, database: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;
        Ok(handle)
    }

    async fn init_schema(&self) -> Result<()> {
        migrations::init_schema(&self.db)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))
    }

    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }

    // ========== Student Operations ==========

    /// Register a student. An existing student with the same normalized
    /// identity keeps its `student_id`; only the display fields change.
    #[instrument(skip(self, record), fields(student = %record.key()))]
    pub async fn save_student(&self, record: &StudentRecord) -> Result<StudentRecord> {
        let row = StudentRow::from(record);

        if let Some(existing) = self.find_student_row(&row.student_key).await? {
            debug!("Updating existing student");
            let mut result = self
                .db
                .query("UPDATE students SET name = $name, class_section = $class WHERE student_key = $key")
                .bind(("name", row.name.clone()))
                .bind(("class", row.class_section.clone()))
                .bind(("key", row.student_key.clone()))
                .await?;
            let updated: Vec<StudentRow> = result.take(0)?;
            return Ok(updated
                .into_iter()
                .next()
                .unwrap_or(existing)
                .into());
        }

        let created: Option<StudentRow> = self.db.create("students").content(row).await?;
        created
            .map(StudentRecord::from)
            .ok_or_else(|| StateError::Query("Failed to create student".to_string()))
    }

    async fn find_student_row(&self, student_key: &str) -> Result<Option<StudentRow>> {
        let mut result = self
            .db
            .query("SELECT * FROM students WHERE student_key = $key")
            .bind(("key", student_key.to_string()))
            .await?;
        let rows: Vec<StudentRow> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    // ========== Tutor Operations ==========

    /// Create or update a tutor by id
    #[instrument(skip(self, record), fields(tutor_id = %record.tutor_id))]
    pub async fn save_tutor(&self, record: &TutorRecord) -> Result<TutorRecord> {
        let row = TutorRow::from(record);

        let mut result = self
            .db
            .query("SELECT * FROM tutors WHERE tutor_id = $id")
            .bind(("id", row.tutor_id.clone()))
            .await?;
        let existing: Vec<TutorRow> = result.take(0)?;

        if !existing.is_empty() {
            debug!("Updating existing tutor");
            self.db
                .query("UPDATE tutors SET name = $name, category = $category WHERE tutor_id = $id")
                .bind(("name", row.name.clone()))
                .bind(("category", row.category.clone()))
                .bind(("id", row.tutor_id.clone()))
                .await?
                .check()?;
            return Ok(row.into());
        }

        let created: Option<TutorRow> = self.db.create("tutors").content(row).await?;
        created
            .map(TutorRecord::from)
            .ok_or_else(|| StateError::Query("Failed to create tutor".to_string()))
    }

    // ========== Preference Operations ==========

    /// Append a preference submission; earlier submissions are kept.
    #[instrument(skip(self, record), fields(student = %record.key()))]
    pub async fn save_preference(&self, record: &PreferenceRecord) -> Result<PreferenceRecord> {
        let mut result = self
            .db
            .query("SELECT count() AS n FROM preferences GROUP ALL")
            .await?;
        let counts: Vec<CountRow> = result.take(0)?;
        let seq = counts.first().map(|c| c.n).unwrap_or(0);

        let row = PreferenceRow::from_record(record, seq);
        let created: Option<PreferenceRow> = self.db.create("preferences").content(row).await?;
        created
            .map(PreferenceRecord::from)
            .ok_or_else(|| StateError::Query("Failed to create preference".to_string()))
    }
}

fn backend(err: surrealdb::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl PreferenceSource for SurrealHandle {
    async fn list_preferences(&self) -> StorageResult<Vec<PreferenceRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM preferences ORDER BY seq ASC")
            .await
            .map_err(backend)?;
        let rows: Vec<PreferenceRow> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(PreferenceRecord::from).collect())
    }
}

#[async_trait]
impl StudentDirectory for SurrealHandle {
    async fn resolve(&self, key: &StudentKey) -> StorageResult<Option<StudentRecord>> {
        let row = self
            .find_student_row(&key_column(key))
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(StudentRecord::from))
    }

    async fn list_students(&self) -> StorageResult<Vec<StudentRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM students ORDER BY class_section, name")
            .await
            .map_err(backend)?;
        let rows: Vec<StudentRow> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(StudentRecord::from).collect())
    }
}

#[async_trait]
impl TutorDirectory for SurrealHandle {
    async fn list_tutors(&self) -> StorageResult<Vec<TutorRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM tutors ORDER BY tutor_id")
            .await
            .map_err(backend)?;
        let rows: Vec<TutorRow> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(TutorRecord::from).collect())
    }

    async fn get_tutor(&self, tutor_id: &TutorId) -> StorageResult<Option<TutorRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM tutors WHERE tutor_id = $id")
            .bind(("id", tutor_id.0.clone()))
            .await
            .map_err(backend)?;
        let rows: Vec<TutorRow> = result.take(0).map_err(backend)?;
        Ok(rows.into_iter().next().map(TutorRecord::from))
    }
}

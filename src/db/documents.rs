use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AppError;

/// The six independently persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Students,
    Schedule,
    PendingRequests,
    ConfirmedLessons,
    PendingReschedules,
    PendingCancels,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Students,
        Collection::Schedule,
        Collection::PendingRequests,
        Collection::ConfirmedLessons,
        Collection::PendingReschedules,
        Collection::PendingCancels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Schedule => "schedule",
            Collection::PendingRequests => "pending_requests",
            Collection::ConfirmedLessons => "confirmed_lessons",
            Collection::PendingReschedules => "pending_reschedules",
            Collection::PendingCancels => "pending_cancels",
        }
    }
}

/// A document body together with the version it was read at. Version 0 means absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Whole-document storage with compare-and-swap replacement.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, collection: Collection) -> Result<Versioned<Option<String>>, AppError>;

    /// Replaces the document only if it is still at `expected_version`.
    /// Returns `false` when another writer got there first.
    async fn replace(
        &self,
        collection: Collection,
        body: &str,
        expected_version: i64,
    ) -> Result<bool, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

pub struct SqliteDocuments {
    db: SqlitePool,
}

impl SqliteDocuments {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Each connection to an in-memory database is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations").run(&db).await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocuments {
    async fn load(&self, collection: Collection) -> Result<Versioned<Option<String>>, AppError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT body, version FROM documents WHERE name = ?")
                .bind(collection.name())
                .fetch_optional(&self.db)
                .await?;

        Ok(match row {
            Some((body, version)) => Versioned {
                value: Some(body),
                version,
            },
            None => Versioned {
                value: None,
                version: 0,
            },
        })
    }

    async fn replace(
        &self,
        collection: Collection,
        body: &str,
        expected_version: i64,
    ) -> Result<bool, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO documents (name, body, version, updated_at)
                VALUES (?1, ?2, 1, ?3)
                ON CONFLICT(name) DO NOTHING
                "#,
            )
            .bind(collection.name())
            .bind(body)
            .bind(&now)
            .execute(&self.db)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE documents
                SET body = ?1, version = version + 1, updated_at = ?2
                WHERE name = ?3 AND version = ?4
                "#,
            )
            .bind(body)
            .bind(&now)
            .bind(collection.name())
            .bind(expected_version)
            .execute(&self.db)
            .await?
        };

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("select 1").execute(&self.db).await?;
        Ok(())
    }
}

/// One `<collection>.json` file per collection, the legacy on-disk layout.
pub struct JsonDirDocuments {
    dir: PathBuf,
    versions: Mutex<HashMap<Collection, i64>>,
}

impl JsonDirDocuments {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Using JSON document directory {}", dir.display());
        Ok(Self {
            dir,
            versions: Mutex::new(HashMap::new()),
        })
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    async fn read_file(path: &Path) -> Result<Option<String>, AppError> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for JsonDirDocuments {
    async fn load(&self, collection: Collection) -> Result<Versioned<Option<String>>, AppError> {
        let mut versions = self.versions.lock().await;
        let body = Self::read_file(&self.path(collection)).await?;
        let version = *versions
            .entry(collection)
            .or_insert(if body.is_some() { 1 } else { 0 });
        Ok(Versioned {
            value: body,
            version,
        })
    }

    async fn replace(
        &self,
        collection: Collection,
        body: &str,
        expected_version: i64,
    ) -> Result<bool, AppError> {
        let mut versions = self.versions.lock().await;
        let path = self.path(collection);

        let current = match versions.get(&collection) {
            Some(v) => *v,
            None => {
                if Self::read_file(&path).await?.is_some() { 1 } else { 0 }
            }
        };
        if current != expected_version {
            return Ok(false);
        }

        atomic_write(&path, body).await?;
        versions.insert(collection, current + 1);
        Ok(true)
    }

    async fn ping(&self) -> Result<(), AppError> {
        tokio::fs::metadata(&self.dir).await?;
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn atomic_write(path: &Path, content: &str) -> Result<(), AppError> {
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, content).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

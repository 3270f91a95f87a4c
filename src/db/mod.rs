pub mod documents;
pub mod repository;

use std::sync::Arc;

use crate::config::StoreLocation;
use crate::error::AppError;

pub use documents::{Collection, DocumentStore, JsonDirDocuments, SqliteDocuments, Versioned};
pub use repository::{Document, Repository};

pub async fn open(location: &StoreLocation) -> Result<Repository, AppError> {
    let docs: Arc<dyn DocumentStore> = match location {
        StoreLocation::Sqlite(url) => Arc::new(SqliteDocuments::connect(url).await?),
        StoreLocation::JsonDir(dir) => Arc::new(JsonDirDocuments::open(dir.clone()).await?),
    };
    Ok(Repository::new(docs))
}

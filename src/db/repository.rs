use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::db::documents::{Collection, DocumentStore, Versioned};
use crate::error::AppError;
use crate::models::{
    ConfirmedLessons, PendingCancellations, PendingRequests, PendingReschedules, Profiles,
    ScheduleTemplate,
};

/// Optimistic writes give up after this many lost races.
const MAX_WRITE_ATTEMPTS: usize = 16;

/// A typed view of one persisted collection.
pub trait Document: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    const COLLECTION: Collection;
}

impl Document for Profiles {
    const COLLECTION: Collection = Collection::Students;
}

impl Document for ScheduleTemplate {
    const COLLECTION: Collection = Collection::Schedule;
}

impl Document for PendingRequests {
    const COLLECTION: Collection = Collection::PendingRequests;
}

impl Document for ConfirmedLessons {
    const COLLECTION: Collection = Collection::ConfirmedLessons;
}

impl Document for PendingReschedules {
    const COLLECTION: Collection = Collection::PendingReschedules;
}

impl Document for PendingCancellations {
    const COLLECTION: Collection = Collection::PendingCancels;
}

#[derive(Clone)]
pub struct Repository {
    docs: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.docs.ping().await
    }

    /// Snapshot of a collection. An absent document reads as its default.
    pub async fn read<D: Document>(&self) -> Result<D, AppError> {
        Ok(self.load::<D>().await?.value)
    }

    /// Read-modify-write of one whole document.
    ///
    /// `mutate` runs against a fresh copy on every attempt and must be free of
    /// side effects outside the document. An `Err` from it aborts without writing.
    pub async fn update<D, R, F>(&self, mut mutate: F) -> Result<R, AppError>
    where
        D: Document,
        R: Send,
        F: FnMut(&mut D) -> Result<R, AppError> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (Versioned { mut value, version }, original) = self.load_raw::<D>().await?;
            let out = mutate(&mut value)?;

            let body = serde_json::to_string_pretty(&value)?;
            if original.as_deref() == Some(body.as_str()) {
                return Ok(out);
            }

            if self.docs.replace(D::COLLECTION, &body, version).await? {
                return Ok(out);
            }
            debug!(
                "write conflict on {} (attempt {}), retrying",
                D::COLLECTION.name(),
                attempt
            );
            tokio::task::yield_now().await;
        }

        Err(AppError::Conflict(format!(
            "gave up writing {} after {} attempts",
            D::COLLECTION.name(),
            MAX_WRITE_ATTEMPTS
        )))
    }

    async fn load<D: Document>(&self) -> Result<Versioned<D>, AppError> {
        Ok(self.load_raw::<D>().await?.0)
    }

    async fn load_raw<D: Document>(&self) -> Result<(Versioned<D>, Option<String>), AppError> {
        let raw = self.docs.load(D::COLLECTION).await?;
        let value = match raw.value.as_deref() {
            Some(body) if !body.trim().is_empty() => serde_json::from_str(body)?,
            _ => D::default(),
        };
        Ok((
            Versioned {
                value,
                version: raw.version,
            },
            raw.value,
        ))
    }
}

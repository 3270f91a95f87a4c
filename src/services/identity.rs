use std::collections::HashMap;
use std::sync::RwLock;

use tracing::info;

use crate::db::Repository;
use crate::error::AppError;
use crate::models::{ConfirmedLessons, PendingRequests, Profiles, StudentId, StudentProfile};

/// Recovers a student's name and grade from whichever record still has them.
///
/// Lookup order is the in-memory cache, the profile collection, the most recent
/// confirmed lesson, then the most recent booking request. A hit from a later
/// source is written back to the profile collection and the cache.
pub struct IdentityResolver {
    repo: Repository,
    cache: RwLock<HashMap<StudentId, StudentProfile>>,
}

impl IdentityResolver {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, student_id: StudentId) -> Result<Option<StudentProfile>, AppError> {
        if let Some(profile) = self.cached(student_id) {
            return Ok(Some(profile));
        }

        let profiles: Profiles = self.repo.read().await?;
        if let Some(profile) = profiles.get(&student_id) {
            self.remember(student_id, profile.clone());
            return Ok(Some(profile.clone()));
        }

        let recovered = match self.from_lessons(student_id).await? {
            Some(profile) => Some(profile),
            None => self.from_requests(student_id).await?,
        };

        let Some(profile) = recovered else {
            return Ok(None);
        };

        info!("recovered profile of student {} from booking records", student_id);
        let stored = self
            .repo
            .update::<Profiles, _, _>(|profiles| {
                Ok(profiles
                    .entry(student_id)
                    .or_insert_with(|| profile.clone())
                    .clone())
            })
            .await?;
        self.remember(student_id, stored.clone());
        Ok(Some(stored))
    }

    /// Like [`resolve`](Self::resolve) but a miss is a `ProfileMissing` error.
    pub async fn require(&self, student_id: StudentId) -> Result<StudentProfile, AppError> {
        self.resolve(student_id).await?.ok_or(AppError::ProfileMissing)
    }

    /// Explicit registration or edit. The only path that replaces a cached entry.
    pub async fn update_profile(
        &self,
        student_id: StudentId,
        profile: StudentProfile,
    ) -> Result<(), AppError> {
        self.repo
            .update::<Profiles, _, _>(|profiles| {
                profiles.insert(student_id, profile.clone());
                Ok(())
            })
            .await?;
        self.remember(student_id, profile);
        info!("saved profile of student {}", student_id);
        Ok(())
    }

    fn cached(&self, student_id: StudentId) -> Option<StudentProfile> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&student_id)
            .cloned()
    }

    fn remember(&self, student_id: StudentId, profile: StudentProfile) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(student_id, profile);
    }

    async fn from_lessons(&self, student_id: StudentId) -> Result<Option<StudentProfile>, AppError> {
        let lessons: ConfirmedLessons = self.repo.read().await?;
        Ok(lessons
            .values()
            .filter(|l| l.student_id == student_id)
            .max_by_key(|l| l.lesson_datetime)
            .map(|l| StudentProfile {
                name: l.student_name.clone(),
                grade: l.grade.clone(),
            }))
    }

    async fn from_requests(&self, student_id: StudentId) -> Result<Option<StudentProfile>, AppError> {
        let requests: PendingRequests = self.repo.read().await?;
        Ok(requests
            .values()
            .filter(|r| r.student_id == student_id)
            .max_by_key(|r| r.created_at)
            .map(|r| StudentProfile {
                name: r.student_name.clone(),
                grade: r.grade.clone(),
            }))
    }
}

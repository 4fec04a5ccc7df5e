use async_trait::async_trait;
use checkin_core::Clock;
use checkin_core::model::{
    AnswerDraft, AnswerRecord, CheckinDraft, CheckinRecord, ClassId, ClassMember, ClassSession,
    Classroom, Enrollment, QuestionNo, SessionKey, SessionStatus, StudentProfile, StudentUid,
};
use std::sync::Arc;
use thiserror::Error;

use crate::feed::SessionWatch;
use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Classes, class rosters and per-user enrollments.
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Persist or replace a classroom document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the class cannot be stored.
    async fn upsert_class(&self, class: &Classroom) -> Result<(), StorageError>;

    /// Fetch a classroom by id. Returns `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_class(&self, id: &ClassId) -> Result<Option<Classroom>, StorageError>;

    /// Write a roster entry under the class.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn put_member(&self, member: &ClassMember) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(
        &self,
        uid: &StudentUid,
        class_id: &ClassId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn put_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// All enrollments of a user, ordered by class id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_enrollments(&self, uid: &StudentUid) -> Result<Vec<Enrollment>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, uid: &StudentUid) -> Result<Option<StudentProfile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &StudentProfile) -> Result<(), StorageError>;
}

/// Check-in session documents.
///
/// Writes are instructor-side; the client only reads, but fixtures and the
/// demo seeder need them.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ClassSession>, StorageError>;

    /// Sessions of a class with the given status, ordered by check-in number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_sessions(
        &self,
        class_id: &ClassId,
        status: SessionStatus,
    ) -> Result<Vec<ClassSession>, StorageError>;

    /// Persist or replace a session and notify its watchers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &ClassSession) -> Result<(), StorageError>;

    /// Remove a session. Deleting a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_session(&self, key: &SessionKey) -> Result<(), StorageError>;
}

/// Per-session roster of checked-in students.
#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_checkin(
        &self,
        key: &SessionKey,
        uid: &StudentUid,
    ) -> Result<Option<CheckinRecord>, StorageError>;

    /// Write a check-in, stamping it with the store's clock.
    ///
    /// An existing record for the same student is replaced; callers enforce
    /// single submission by reading first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn put_checkin(&self, draft: CheckinDraft) -> Result<CheckinRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_checkins(&self, key: &SessionKey) -> Result<Vec<CheckinRecord>, StorageError>;
}

/// Per-question answer sets.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Write an answer, replacing any earlier answer by the same student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answer cannot be stored.
    async fn put_answer(&self, draft: AnswerDraft) -> Result<AnswerRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_answer(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
        uid: &StudentUid,
    ) -> Result<Option<AnswerRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_answers(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
    ) -> Result<Vec<AnswerRecord>, StorageError>;
}

/// Change notifications for a single session document.
#[async_trait]
pub trait SessionFeed: Send + Sync {
    /// Start watching a session. Changes written after this returns are
    /// delivered in store order. A backend may also deliver the current state
    /// first, so consumers must tolerate repeated snapshots.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the watch cannot be registered.
    async fn watch_session(&self, key: &SessionKey) -> Result<SessionWatch, StorageError>;
}

/// Device-local key/value cache that survives restarts.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub classes: Arc<dyn ClassRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub roster: Arc<dyn RosterRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub feed: Arc<dyn SessionFeed>,
    pub cache: Arc<dyn LocalCache>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn in_memory_with_clock(clock: Clock) -> Self {
        Self::from_memory(InMemoryRepository::with_clock(clock))
    }

    /// Wrap an existing in-memory repository so tests can keep a handle to it.
    #[must_use]
    pub fn from_memory(repo: InMemoryRepository) -> Self {
        Self {
            classes: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            roster: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            feed: Arc::new(repo.clone()),
            cache: Arc::new(repo),
        }
    }
}

//! Shared error types for the services crate.
//!
//! Precondition failures are final for the attempt and are shown to the
//! student as-is. `Transport` wraps a failed store call and is the only
//! variant worth retrying (for example when the student taps submit again).

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AttendanceClient::check_in`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckinError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid check-in number")]
    SessionNotFound,
    #[error("this check-in session is closed")]
    SessionClosed,
    #[error("invalid check-in code")]
    InvalidCode,
    #[error("you have already checked in for this session")]
    AlreadyCheckedIn,
    #[error("user profile not found")]
    ProfileMissing,
    #[error(transparent)]
    Transport(#[from] StorageError),
}

impl CheckinError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckinError::Transport(_))
    }
}

/// Errors emitted by `AnswerSubmitter::submit_answer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("{0}")]
    Validation(String),
    #[error("this question is no longer being shown")]
    StaleQuestion,
    #[error("user profile not found")]
    ProfileMissing,
    #[error(transparent)]
    Transport(#[from] StorageError),
}

impl AnswerError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnswerError::Transport(_))
    }
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("{0}")]
    Validation(String),
    #[error("class not found")]
    ClassNotFound,
    #[error("you are already registered for this class")]
    AlreadyEnrolled,
    #[error("user profile not found")]
    ProfileMissing,
    #[error(transparent)]
    Transport(#[from] StorageError),
}

impl EnrollmentError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnrollmentError::Transport(_))
    }
}

/// Errors emitted by `SessionRecoveryCoordinator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecoveryError {
    #[error(transparent)]
    Transport(#[from] StorageError),
}

impl RecoveryError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecoveryError::Transport(_))
    }
}

/// Errors emitted while bootstrapping services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServicesInitError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::StudentUid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("profile has no student id")]
    MissingStudentId,

    #[error("profile has no name")]
    MissingName,
}

/// Student profile stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub uid: StudentUid,
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// The parts of a profile that are copied onto roster and answer records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentIdentity {
    pub student_id: String,
    pub display_name: String,
}

impl StudentProfile {
    /// `"{first} {last}"`, trimmed so a missing half does not leave a stray space.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }

    /// Resolve the identity written onto records.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` when the student id or both name parts are blank.
    pub fn identity(&self) -> Result<StudentIdentity, ProfileError> {
        let student_id = self.student_id.trim();
        if student_id.is_empty() {
            return Err(ProfileError::MissingStudentId);
        }
        let display_name = self.display_name();
        if display_name.is_empty() {
            return Err(ProfileError::MissingName);
        }
        Ok(StudentIdentity {
            student_id: student_id.to_owned(),
            display_name,
        })
    }
}

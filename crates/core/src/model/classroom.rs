use serde::{Deserialize, Serialize};

use crate::model::ids::{ClassId, StudentUid};

/// Classroom document at `classroom/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: ClassId,
    pub name: String,
    pub code: Option<String>,
}

impl Classroom {
    /// Label shown in class lists: the public code, falling back to the id.
    #[must_use]
    pub fn label(&self) -> &str {
        self.code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.id.as_str())
    }
}

/// Status of a student's membership, stored at `users/{uid}/classroom/{class}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Registered,
    /// Any status code this client does not understand.
    Other(i64),
}

impl EnrollmentStatus {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            EnrollmentStatus::Registered => 2,
            EnrollmentStatus::Other(code) => code,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => EnrollmentStatus::Registered,
            other => EnrollmentStatus::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub uid: StudentUid,
    pub class_id: ClassId,
    pub status: EnrollmentStatus,
}

/// Class roster entry at `classroom/{class}/students/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMember {
    pub class_id: ClassId,
    pub uid: StudentUid,
    pub student_id: String,
    pub display_name: String,
}

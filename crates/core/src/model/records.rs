use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionNo, SessionKey, StudentUid};
use crate::model::profile::StudentIdentity;

/// Roster entry written when a student checks in to a session.
///
/// Stored at `classroom/{class}/checkin/{no}/students/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub session: SessionKey,
    pub uid: StudentUid,
    pub student_id: String,
    pub display_name: String,
    pub submitted_at: DateTime<Utc>,
    pub remark: String,
}

/// A check-in waiting for the store to assign its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinDraft {
    pub session: SessionKey,
    pub uid: StudentUid,
    pub student_id: String,
    pub display_name: String,
    pub remark: String,
}

impl CheckinDraft {
    #[must_use]
    pub fn new(
        session: SessionKey,
        uid: StudentUid,
        identity: StudentIdentity,
        remark: impl Into<String>,
    ) -> Self {
        Self {
            session,
            uid,
            student_id: identity.student_id,
            display_name: identity.display_name,
            remark: remark.into().trim().to_owned(),
        }
    }

    #[must_use]
    pub fn stamp(self, submitted_at: DateTime<Utc>) -> CheckinRecord {
        CheckinRecord {
            session: self.session,
            uid: self.uid,
            student_id: self.student_id,
            display_name: self.display_name,
            submitted_at,
            remark: self.remark,
        }
    }
}

/// A student's answer to one broadcast question.
///
/// Stored at `.../checkin/{no}/answers/{question}/students/{uid}`; a later
/// answer from the same student replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub session: SessionKey,
    pub question_no: QuestionNo,
    pub uid: StudentUid,
    pub student_id: String,
    pub display_name: String,
    pub answer_text: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerDraft {
    pub session: SessionKey,
    pub question_no: QuestionNo,
    pub uid: StudentUid,
    pub student_id: String,
    pub display_name: String,
    pub answer_text: String,
}

impl AnswerDraft {
    #[must_use]
    pub fn new(
        session: SessionKey,
        question_no: QuestionNo,
        uid: StudentUid,
        identity: StudentIdentity,
        answer_text: impl Into<String>,
    ) -> Self {
        Self {
            session,
            question_no,
            uid,
            student_id: identity.student_id,
            display_name: identity.display_name,
            answer_text: answer_text.into(),
        }
    }

    #[must_use]
    pub fn stamp(self, submitted_at: DateTime<Utc>) -> AnswerRecord {
        AnswerRecord {
            session: self.session,
            question_no: self.question_no,
            uid: self.uid,
            student_id: self.student_id,
            display_name: self.display_name,
            answer_text: self.answer_text,
            submitted_at,
        }
    }
}

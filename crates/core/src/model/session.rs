use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionNo, SessionKey};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("access code cannot be empty")]
    EmptyAccessCode,

    #[error("unknown session status code: {0}")]
    UnknownStatus(i64),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Whether a check-in session accepts new check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    /// Numeric code used by the document store (`status == 1` is open).
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            SessionStatus::Open => 1,
            SessionStatus::Closed => 2,
        }
    }

    /// Parse a stored status code.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownStatus` for codes other than 0, 1 or 2.
    pub fn from_code(code: i64) -> Result<Self, SessionError> {
        match code {
            1 => Ok(SessionStatus::Open),
            0 | 2 => Ok(SessionStatus::Closed),
            other => Err(SessionError::UnknownStatus(other)),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Question embedded in a session document.
///
/// Number and text may be missing while the instructor is still composing it;
/// only a complete, visible question is ever broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_no: Option<QuestionNo>,
    pub text: Option<String>,
    pub visible: bool,
}

impl Question {
    #[must_use]
    pub fn new(question_no: Option<QuestionNo>, text: Option<String>, visible: bool) -> Self {
        Self {
            question_no,
            text,
            visible,
        }
    }

    /// A complete question that is currently visible.
    #[must_use]
    pub fn shown(question_no: QuestionNo, text: impl Into<String>) -> Self {
        Self::new(Some(question_no), Some(text.into()), true)
    }

    /// Returns the same question with visibility switched off.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Applies the broadcast rule: visible, numbered, and with non-empty text.
    #[must_use]
    pub fn broadcast(&self) -> Option<BroadcastQuestion> {
        if !self.visible {
            return None;
        }
        let question_no = self.question_no?;
        let text = self.text.as_deref().filter(|t| !t.is_empty())?;
        Some(BroadcastQuestion {
            question_no,
            text: text.to_owned(),
        })
    }
}

/// The question as shown to students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastQuestion {
    pub question_no: QuestionNo,
    pub text: String,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One instructor-opened attendance window of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    key: SessionKey,
    status: SessionStatus,
    access_code: String,
    opened_at: DateTime<Utc>,
    current_question: Option<Question>,
}

impl ClassSession {
    /// Open a new session with the given access code.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyAccessCode` if the code is blank.
    pub fn open(
        key: SessionKey,
        access_code: impl Into<String>,
        opened_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        Self::from_persisted(key, SessionStatus::Open, access_code, opened_at, None)
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyAccessCode` if the code is blank.
    pub fn from_persisted(
        key: SessionKey,
        status: SessionStatus,
        access_code: impl Into<String>,
        opened_at: DateTime<Utc>,
        current_question: Option<Question>,
    ) -> Result<Self, SessionError> {
        let access_code = access_code.into();
        if access_code.trim().is_empty() {
            return Err(SessionError::EmptyAccessCode);
        }
        Ok(Self {
            key,
            status,
            access_code,
            opened_at,
            current_question,
        })
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    #[must_use]
    pub fn access_code(&self) -> &str {
        &self.access_code
    }

    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// Exact, case-sensitive comparison against the session's access code.
    #[must_use]
    pub fn code_matches(&self, supplied: &str) -> bool {
        self.access_code == supplied
    }

    /// The question students should currently see, if any.
    #[must_use]
    pub fn broadcast(&self) -> Option<BroadcastQuestion> {
        self.current_question.as_ref().and_then(Question::broadcast)
    }

    /// Close the session. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.status = SessionStatus::Closed;
    }

    pub fn set_question(&mut self, question: Option<Question>) {
        self.current_question = question;
    }
}

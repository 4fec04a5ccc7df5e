use std::sync::Arc;

use checkin_core::model::{AnswerDraft, AnswerRecord, CheckinNo, ClassId, QuestionNo, SessionKey};
use storage::repository::{AnswerRepository, ProfileRepository};

use crate::error::AnswerError;
use crate::identity::{Caller, IdentityProvider, resolve_caller};
use crate::subscription::QuestionBoard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub class_id: ClassId,
    pub checkin_no: CheckinNo,
    pub question_no: QuestionNo,
    pub text: String,
}

impl AnswerRequest {
    #[must_use]
    pub fn new(
        class_id: ClassId,
        checkin_no: CheckinNo,
        question_no: QuestionNo,
        text: impl Into<String>,
    ) -> Self {
        Self {
            class_id,
            checkin_no,
            question_no,
            text: text.into(),
        }
    }
}

/// Records answers to the question currently shown on this client.
#[derive(Clone)]
pub struct AnswerSubmitter {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    answers: Arc<dyn AnswerRepository>,
    board: QuestionBoard,
}

impl AnswerSubmitter {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        answers: Arc<dyn AnswerRepository>,
        board: QuestionBoard,
    ) -> Self {
        Self {
            identity,
            profiles,
            answers,
            board,
        }
    }

    /// Submit an answer. A repeated submission replaces the earlier answer.
    ///
    /// The text is stored as typed; only the emptiness check trims it.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::Validation` for blank text, `StaleQuestion` when
    /// the question is not the one currently shown, `ProfileMissing` without
    /// a resolvable profile, and `Transport` when a store call fails.
    pub async fn submit_answer(&self, request: AnswerRequest) -> Result<AnswerRecord, AnswerError> {
        if request.text.trim().is_empty() {
            return Err(AnswerError::Validation("please enter an answer".into()));
        }
        let key = SessionKey::new(request.class_id, request.checkin_no);
        if !self.board.is_showing(&key, request.question_no) {
            return Err(AnswerError::StaleQuestion);
        }

        let Caller::Resolved(uid, identity) =
            resolve_caller(self.identity.as_ref(), self.profiles.as_ref()).await?
        else {
            return Err(AnswerError::ProfileMissing);
        };

        let record = self
            .answers
            .put_answer(AnswerDraft::new(
                key,
                request.question_no,
                uid,
                identity,
                request.text,
            ))
            .await?;
        tracing::info!(
            session = %record.session,
            question_no = %record.question_no,
            uid = %record.uid,
            "answer recorded"
        );
        Ok(record)
    }
}

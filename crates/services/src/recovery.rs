use std::sync::Arc;

use checkin_core::model::{CheckinRecord, ClassId, SessionKey, SessionStatus};
use storage::repository::SessionRepository;

use crate::error::RecoveryError;
use crate::pointer::PointerStore;
use crate::subscription::{ClientState, EventCallback, QuestionSubscription, Subscription};

/// Restores and maintains the question subscription across restarts.
///
/// On resume the last session recorded in the local cache is re-subscribed
/// before any user interaction, so a question the instructor is already
/// showing reaches a relaunched client.
pub struct SessionRecoveryCoordinator {
    questions: Arc<QuestionSubscription>,
    pointer: PointerStore,
    sessions: Arc<dyn SessionRepository>,
    on_event: EventCallback,
}

impl SessionRecoveryCoordinator {
    #[must_use]
    pub fn new(
        questions: Arc<QuestionSubscription>,
        pointer: PointerStore,
        sessions: Arc<dyn SessionRepository>,
        on_event: EventCallback,
    ) -> Self {
        Self {
            questions,
            pointer,
            sessions,
            on_event,
        }
    }

    /// Re-subscribe to the remembered session of `class_id`, if any.
    ///
    /// The session is not checked for existence: a deleted or closed session
    /// simply never shows a question. An unreadable pointer counts as absent.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryError::Transport` if the feed cannot be established;
    /// the client then stays idle.
    pub async fn resume(&self, class_id: &ClassId) -> Result<Option<Subscription>, RecoveryError> {
        let pointer = match self.pointer.load().await {
            Ok(pointer) => pointer,
            Err(err) => {
                tracing::warn!(
                    class_id = %class_id,
                    error = %err,
                    "could not read recovery pointer"
                );
                return Ok(None);
            }
        };
        let Some(key) = pointer.session_in(class_id) else {
            tracing::debug!(class_id = %class_id, "no session to resume");
            return Ok(None);
        };
        tracing::info!(session = %key, "resuming question subscription");
        let subscription = self.questions.subscribe(key, Arc::clone(&self.on_event)).await?;
        Ok(Some(subscription))
    }

    /// Follow the session the student just checked in to.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryError::Transport` if the feed cannot be established.
    pub async fn follow_checkin(
        &self,
        record: &CheckinRecord,
    ) -> Result<Subscription, RecoveryError> {
        Ok(self
            .questions
            .subscribe(record.session.clone(), Arc::clone(&self.on_event))
            .await?)
    }

    /// Scan the class's open sessions and switch to the highest-priority
    /// visible question.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryError::Transport` if listing or subscribing fails.
    pub async fn refresh_open_sessions(
        &self,
        class_id: &ClassId,
    ) -> Result<Option<SessionKey>, RecoveryError> {
        let open = self
            .sessions
            .list_sessions(class_id, SessionStatus::Open)
            .await?;
        Ok(self
            .questions
            .adopt_open_sessions(class_id, &open, Arc::clone(&self.on_event))
            .await?)
    }

    /// Stop listening and forget known sessions.
    pub async fn leave(&self) {
        self.questions.reset().await;
        tracing::info!("left question feed");
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.questions.state()
    }
}

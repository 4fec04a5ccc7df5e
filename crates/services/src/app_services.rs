use std::sync::Arc;
use std::time::Duration;

use storage::repository::Storage;

use crate::Clock;
use crate::answers::AnswerSubmitter;
use crate::attendance::AttendanceClient;
use crate::enrollment::EnrollmentService;
use crate::error::ServicesInitError;
use crate::identity::IdentityProvider;
use crate::pointer::PointerStore;
use crate::recovery::SessionRecoveryCoordinator;
use crate::subscription::{EventCallback, QuestionSubscription};

/// Wires the client-facing services over one storage backend.
///
/// All services share a single question subscription, so the answer path and
/// the recovery coordinator see the same client state.
#[derive(Clone)]
pub struct ClassroomServices {
    storage: Storage,
    attendance: Arc<AttendanceClient>,
    questions: Arc<QuestionSubscription>,
    answers: Arc<AnswerSubmitter>,
    recovery: Arc<SessionRecoveryCoordinator>,
    enrollment: Arc<EnrollmentService>,
}

impl ClassroomServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `ServicesInitError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        poll_interval: Duration,
        identity: Arc<dyn IdentityProvider>,
        on_event: EventCallback,
    ) -> Result<Self, ServicesInitError> {
        let storage = Storage::sqlite(db_url, clock, poll_interval).await?;
        Ok(Self::from_storage(storage, identity, on_event))
    }

    #[must_use]
    pub fn in_memory(identity: Arc<dyn IdentityProvider>, on_event: EventCallback) -> Self {
        Self::from_storage(Storage::in_memory(), identity, on_event)
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        identity: Arc<dyn IdentityProvider>,
        on_event: EventCallback,
    ) -> Self {
        let pointer = PointerStore::new(Arc::clone(&storage.cache));
        let questions = Arc::new(QuestionSubscription::new(
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.feed),
        ));
        let attendance = Arc::new(AttendanceClient::new(
            Arc::clone(&identity),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.roster),
            pointer.clone(),
        ));
        let answers = Arc::new(AnswerSubmitter::new(
            Arc::clone(&identity),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.answers),
            questions.board(),
        ));
        let recovery = Arc::new(SessionRecoveryCoordinator::new(
            Arc::clone(&questions),
            pointer,
            Arc::clone(&storage.sessions),
            on_event,
        ));
        let enrollment = Arc::new(EnrollmentService::new(
            identity,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.classes),
        ));

        Self {
            storage,
            attendance,
            questions,
            answers,
            recovery,
            enrollment,
        }
    }

    /// Raw repositories, for seeding and inspection.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn attendance(&self) -> Arc<AttendanceClient> {
        Arc::clone(&self.attendance)
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionSubscription> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn answers(&self) -> Arc<AnswerSubmitter> {
        Arc::clone(&self.answers)
    }

    #[must_use]
    pub fn recovery(&self) -> Arc<SessionRecoveryCoordinator> {
        Arc::clone(&self.recovery)
    }

    #[must_use]
    pub fn enrollment(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollment)
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use checkin_core::model::{BroadcastQuestion, QuestionNo, SessionKey};

use super::tracker::QuestionEvent;

/// Where a client stands in the subscribe / show / hide cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClientState {
    #[default]
    Idle,
    Subscribed(SessionKey),
    QuestionHidden(SessionKey),
    QuestionVisible(SessionKey, BroadcastQuestion),
}

impl ClientState {
    #[must_use]
    pub fn session(&self) -> Option<&SessionKey> {
        match self {
            ClientState::Idle => None,
            ClientState::Subscribed(key)
            | ClientState::QuestionHidden(key)
            | ClientState::QuestionVisible(key, _) => Some(key),
        }
    }

    /// The question currently on screen, if any.
    #[must_use]
    pub fn shown_question(&self) -> Option<(&SessionKey, &BroadcastQuestion)> {
        match self {
            ClientState::QuestionVisible(key, question) => Some((key, question)),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct BoardInner {
    state: ClientState,
    owner: Option<u64>,
}

/// Per-client record of the active subscription's state.
///
/// Only the subscription that attached last may move the state, so a stale
/// task can never overwrite what a newer subscription reported.
#[derive(Clone, Default)]
pub struct QuestionBoard {
    inner: Arc<Mutex<BoardInner>>,
}

impl QuestionBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.lock().state.clone()
    }

    /// Whether `question_no` of `key` is the question this client was last shown.
    #[must_use]
    pub fn is_showing(&self, key: &SessionKey, question_no: QuestionNo) -> bool {
        matches!(
            self.lock().state.shown_question(),
            Some((shown_key, question)) if shown_key == key && question.question_no == question_no
        )
    }

    pub(crate) fn attach(&self, owner: u64, key: SessionKey) {
        let mut inner = self.lock();
        inner.owner = Some(owner);
        inner.state = ClientState::Subscribed(key);
    }

    pub(crate) fn apply(&self, owner: u64, event: &QuestionEvent) {
        let mut inner = self.lock();
        if inner.owner != Some(owner) {
            return;
        }
        inner.state = match event {
            QuestionEvent::Shown { session, question } => {
                ClientState::QuestionVisible(session.clone(), question.clone())
            }
            QuestionEvent::Hidden { session } => ClientState::QuestionHidden(session.clone()),
        };
    }

    pub(crate) fn detach(&self, owner: u64) {
        let mut inner = self.lock();
        if inner.owner == Some(owner) {
            inner.owner = None;
            inner.state = ClientState::Idle;
        }
    }
}

use checkin_core::model::{BroadcastQuestion, ClassSession, SessionKey};

/// Show/hide notification raised to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionEvent {
    Shown {
        session: SessionKey,
        question: BroadcastQuestion,
    },
    Hidden {
        session: SessionKey,
    },
}

impl QuestionEvent {
    #[must_use]
    pub fn session(&self) -> &SessionKey {
        match self {
            QuestionEvent::Shown { session, .. } | QuestionEvent::Hidden { session } => session,
        }
    }
}

/// Edge detector over session snapshots.
///
/// Starts hidden. Fires `Shown` when a complete visible question appears or is
/// replaced by a different one, and `Hidden` when it goes away (including the
/// session document being deleted). Repeated identical snapshots fire nothing.
#[derive(Debug, Default)]
pub struct VisibilityTracker {
    shown: Option<BroadcastQuestion>,
}

impl VisibilityTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        key: &SessionKey,
        snapshot: Option<&ClassSession>,
    ) -> Option<QuestionEvent> {
        let next = snapshot.and_then(ClassSession::broadcast);
        match (&self.shown, next) {
            (Some(prev), Some(next)) if *prev == next => None,
            (_, Some(next)) => {
                self.shown = Some(next.clone());
                Some(QuestionEvent::Shown {
                    session: key.clone(),
                    question: next,
                })
            }
            (Some(_), None) => {
                self.shown = None;
                Some(QuestionEvent::Hidden {
                    session: key.clone(),
                })
            }
            (None, None) => None,
        }
    }

    #[must_use]
    pub fn shown(&self) -> Option<&BroadcastQuestion> {
        self.shown.as_ref()
    }
}

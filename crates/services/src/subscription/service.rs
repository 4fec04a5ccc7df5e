use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use checkin_core::model::{ClassId, ClassSession, SessionKey};
use storage::repository::{SessionFeed, SessionRepository, StorageError};

use super::board::{ClientState, QuestionBoard};
use super::handle::{EventCallback, Subscription};
use super::tracker::VisibilityTracker;

/// Keeps at most one live question subscription per client.
pub struct QuestionSubscription {
    sessions: Arc<dyn SessionRepository>,
    feed: Arc<dyn SessionFeed>,
    board: QuestionBoard,
    current: tokio::sync::Mutex<Option<Subscription>>,
    known: Mutex<BTreeSet<SessionKey>>,
}

impl QuestionSubscription {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>, feed: Arc<dyn SessionFeed>) -> Self {
        Self {
            sessions,
            feed,
            board: QuestionBoard::new(),
            current: tokio::sync::Mutex::new(None),
            known: Mutex::new(BTreeSet::new()),
        }
    }

    fn known(&self) -> MutexGuard<'_, BTreeSet<SessionKey>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn board(&self) -> QuestionBoard {
        self.board.clone()
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.board.state()
    }

    /// The live subscription, if any.
    pub async fn current(&self) -> Option<Subscription> {
        self.current.lock().await.clone()
    }

    /// Subscribe to `key`, replacing any earlier subscription.
    ///
    /// The watch is registered before the session is point-read so no write
    /// between the two is lost. The earlier subscription is cancelled before
    /// the new one delivers anything; if the watch cannot be registered the
    /// earlier subscription is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the feed rejects the watch.
    pub async fn subscribe(
        &self,
        key: SessionKey,
        on_event: EventCallback,
    ) -> Result<Subscription, StorageError> {
        let mut current = self.current.lock().await;
        let watch = self.feed.watch_session(&key).await?;
        let initial = match self.sessions.get_session(&key).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(
                    session = %key,
                    error = %err,
                    "initial session read failed; waiting for feed"
                );
                None
            }
        };

        if let Some(previous) = current.take() {
            previous.cancel();
        }
        self.known().insert(key.clone());

        let subscription = Subscription::spawn(self.board.clone(), initial, watch, on_event);
        tracing::info!(session = %key, "subscribed to question feed");
        *current = Some(subscription.clone());
        Ok(subscription)
    }

    /// Cancel the live subscription and return to idle.
    pub async fn cancel(&self) {
        if let Some(previous) = self.current.lock().await.take() {
            previous.cancel();
        }
    }

    /// Cancel and forget every session seen so far.
    pub async fn reset(&self) {
        self.cancel().await;
        self.known().clear();
    }

    /// Adopt the highest-priority visible question among newly reported
    /// sessions of `class_id`.
    ///
    /// Closed sessions, sessions of another class and sessions already seen
    /// are skipped. A new session counts if its snapshot shows a complete
    /// question. Among those and the session currently showing a question,
    /// the lowest check-in number wins; the client switches to it if it is
    /// not already subscribed there. Reported sessions are only marked as
    /// seen once the switch succeeds, so a failed call can be retried.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if switching subscriptions fails.
    pub async fn adopt_open_sessions(
        &self,
        class_id: &ClassId,
        sessions: &[ClassSession],
        on_event: EventCallback,
    ) -> Result<Option<SessionKey>, StorageError> {
        let fresh: Vec<&ClassSession> = {
            let known = self.known();
            sessions
                .iter()
                .filter(|session| &session.key().class_id == class_id && session.is_open())
                .filter(|session| !known.contains(session.key()))
                .collect()
        };
        let candidates: Vec<SessionKey> = fresh
            .iter()
            .filter(|session| {
                VisibilityTracker::new()
                    .observe(session.key(), Some(**session))
                    .is_some()
            })
            .map(|session| session.key().clone())
            .collect();

        let adopted = self.switch_to_lowest(candidates, on_event).await?;
        self.known()
            .extend(fresh.into_iter().map(|session| session.key().clone()));
        Ok(adopted)
    }

    async fn switch_to_lowest(
        &self,
        candidates: Vec<SessionKey>,
        on_event: EventCallback,
    ) -> Result<Option<SessionKey>, StorageError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let showing = self
            .board
            .state()
            .shown_question()
            .map(|(key, _)| key.clone());
        let Some(winner) = candidates.into_iter().chain(showing).min() else {
            return Ok(None);
        };

        let already = self
            .current()
            .await
            .is_some_and(|sub| sub.is_active() && sub.key() == &winner);
        if !already {
            tracing::info!(session = %winner, "switching to session with visible question");
            self.subscribe(winner.clone(), on_event).await?;
        }
        Ok(Some(winner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use checkin_core::model::{CheckinNo, Question, QuestionNo};
    use checkin_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use storage::{InMemoryRepository, SessionWatch};
    use tokio::sync::mpsc;

    use crate::subscription::QuestionEvent;

    /// Refuses the first `refusals` watches, then delegates to the repository.
    struct FlakyFeed {
        repo: InMemoryRepository,
        refusals: AtomicUsize,
    }

    #[async_trait]
    impl SessionFeed for FlakyFeed {
        async fn watch_session(&self, key: &SessionKey) -> Result<SessionWatch, StorageError> {
            let refuse = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refuse {
                return Err(StorageError::Connection("offline".into()));
            }
            self.repo.watch_session(key).await
        }
    }

    fn class_id() -> ClassId {
        ClassId::new("C1").unwrap()
    }

    fn key(no: u32) -> SessionKey {
        SessionKey::new(class_id(), CheckinNo::new(no))
    }

    fn session(no: u32, question: Option<(u32, &str)>) -> ClassSession {
        let mut session = ClassSession::open(key(no), "ABCD", fixed_now()).unwrap();
        session.set_question(question.map(|(q, text)| Question::shown(QuestionNo::new(q), text)));
        session
    }

    fn collector() -> (EventCallback, mpsc::UnboundedReceiver<QuestionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move |event: QuestionEvent| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    fn manager(repo: &InMemoryRepository) -> QuestionSubscription {
        QuestionSubscription::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<QuestionEvent>) -> QuestionEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn initial_visible_question_is_delivered() {
        let repo = InMemoryRepository::new();
        repo.upsert_session(&session(7, Some((2, "2+2=?")))).await.unwrap();
        let questions = manager(&repo);
        let (callback, mut rx) = collector();

        questions.subscribe(key(7), callback).await.unwrap();
        assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));
        assert!(questions.board().is_showing(&key(7), QuestionNo::new(2)));
    }

    #[tokio::test]
    async fn resubscribing_cancels_previous() {
        let repo = InMemoryRepository::new();
        repo.upsert_session(&session(7, None)).await.unwrap();
        repo.upsert_session(&session(8, None)).await.unwrap();
        let questions = manager(&repo);

        let (first_cb, mut first_rx) = collector();
        let first = questions.subscribe(key(7), first_cb).await.unwrap();
        let (second_cb, mut second_rx) = collector();
        let second = questions.subscribe(key(8), second_cb).await.unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(questions.state(), ClientState::Subscribed(key(8)));

        repo.upsert_session(&session(7, Some((1, "old")))).await.unwrap();
        repo.upsert_session(&session(8, Some((1, "new")))).await.unwrap();
        assert!(matches!(next(&mut second_rx).await, QuestionEvent::Shown { .. }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn adopt_prefers_lowest_checkin_number() {
        let repo = InMemoryRepository::new();
        let questions = manager(&repo);
        let (callback, _rx) = collector();

        let listed = vec![
            session(5, None),
            session(7, Some((1, "a"))),
            session(9, Some((1, "b"))),
        ];
        for s in &listed {
            repo.upsert_session(s).await.unwrap();
        }
        let winner = questions
            .adopt_open_sessions(&class_id(), &listed, Arc::clone(&callback))
            .await
            .unwrap();
        assert_eq!(winner, Some(key(7)));
        assert_eq!(questions.current().await.unwrap().key(), &key(7));

        // Already-seen sessions are not rescanned.
        let winner = questions
            .adopt_open_sessions(&class_id(), &listed, callback)
            .await
            .unwrap();
        assert_eq!(winner, None);
    }

    #[tokio::test]
    async fn cancel_returns_to_idle() {
        let repo = InMemoryRepository::new();
        repo.upsert_session(&session(7, None)).await.unwrap();
        let questions = manager(&repo);
        let (callback, _rx) = collector();
        let sub = questions.subscribe(key(7), callback).await.unwrap();

        questions.cancel().await;
        assert!(!sub.is_active());
        assert_eq!(questions.state(), ClientState::Idle);
        assert!(questions.current().await.is_none());
        sub.cancel();
    }

    #[tokio::test]
    async fn failed_adoption_can_be_retried() {
        let repo = InMemoryRepository::new();
        let listed = vec![session(7, Some((1, "2+2=?"))), session(8, None)];
        for s in &listed {
            repo.upsert_session(s).await.unwrap();
        }
        let questions = QuestionSubscription::new(
            Arc::new(repo.clone()),
            Arc::new(FlakyFeed {
                repo: repo.clone(),
                refusals: AtomicUsize::new(1),
            }),
        );
        let (callback, mut rx) = collector();

        let err = questions
            .adopt_open_sessions(&class_id(), &listed, Arc::clone(&callback))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        assert_eq!(questions.state(), ClientState::Idle);

        let winner = questions
            .adopt_open_sessions(&class_id(), &listed, callback)
            .await
            .unwrap();
        assert_eq!(winner, Some(key(7)));
        assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));
        assert!(questions.board().is_showing(&key(7), QuestionNo::new(1)));
    }
}

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use checkin_core::model::{ClassSession, SessionKey};
use storage::SessionWatch;
use tokio::task::JoinHandle;

use super::board::QuestionBoard;
use super::tracker::{QuestionEvent, VisibilityTracker};

/// Callback invoked for each show/hide transition.
pub type EventCallback = Arc<dyn Fn(QuestionEvent) + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Id of the subscription whose callback is running on this thread, or 0.
    static DELIVERING: Cell<u64> = const { Cell::new(0) };
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    id: u64,
    key: SessionKey,
    board: QuestionBoard,
    cancelled: AtomicBool,
    finished: AtomicBool,
    gate: Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn deliver(
        &self,
        tracker: &mut VisibilityTracker,
        snapshot: Option<&ClassSession>,
        on_event: &EventCallback,
    ) {
        let _gate = lock(&self.gate);
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let Some(event) = tracker.observe(&self.key, snapshot) else {
            return;
        };
        tracing::debug!(session = %self.key, ?event, "question transition");
        self.board.apply(self.id, &event);
        DELIVERING.with(|current| current.set(self.id));
        on_event(event);
        DELIVERING.with(|current| current.set(0));
    }
}

/// Live listener on one session's question state.
///
/// Clones share the same listener. It runs until [`Subscription::cancel`] is
/// called or the store ends the feed; dropping a handle does not stop it.
#[derive(Clone)]
pub struct Subscription {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.shared.id)
            .field("key", &self.shared.key)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Attach to the board and start delivering transitions for `watch`.
    ///
    /// `initial` is a point read of the session taken after the watch was
    /// registered; `None` skips the initial delivery.
    pub(crate) fn spawn(
        board: QuestionBoard,
        initial: Option<Option<ClassSession>>,
        watch: SessionWatch,
        on_event: EventCallback,
    ) -> Self {
        let key = watch.key().clone();
        let shared = Arc::new(Shared {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            key: key.clone(),
            board,
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            gate: Mutex::new(()),
            task: Mutex::new(None),
        });
        shared.board.attach(shared.id, key);

        let task = tokio::spawn(run(Arc::clone(&shared), initial, watch, on_event));
        let mut slot = lock(&shared.task);
        if shared.cancelled.load(Ordering::SeqCst) {
            // Cancelled from the initial delivery before the handle was stored.
            task.abort();
        } else {
            *slot = Some(task);
        }
        drop(slot);
        Self { shared }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.shared.key
    }

    /// True until cancelled or until the store ends the feed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.shared.cancelled.load(Ordering::SeqCst)
            && !self.shared.finished.load(Ordering::SeqCst)
    }

    /// Stop delivering events. Idempotent.
    ///
    /// When this returns no further callback will start, and a callback
    /// running on another thread has completed. Calling it from inside this
    /// subscription's own callback is allowed.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let inside_callback = DELIVERING.with(|current| current.get() == self.shared.id);
        if !inside_callback {
            drop(lock(&self.shared.gate));
        }
        if let Some(task) = lock(&self.shared.task).take() {
            task.abort();
        }
        self.shared.board.detach(self.shared.id);
        tracing::debug!(session = %self.shared.key, "question subscription cancelled");
    }
}

async fn run(
    shared: Arc<Shared>,
    initial: Option<Option<ClassSession>>,
    mut watch: SessionWatch,
    on_event: EventCallback,
) {
    let mut tracker = VisibilityTracker::new();
    if let Some(snapshot) = initial {
        shared.deliver(&mut tracker, snapshot.as_ref(), &on_event);
    }
    while let Some(change) = watch.next().await {
        if shared.cancelled.load(Ordering::SeqCst) {
            break;
        }
        match change {
            Ok(snapshot) => shared.deliver(&mut tracker, snapshot.as_ref(), &on_event),
            Err(err) => {
                tracing::warn!(session = %shared.key, error = %err, "question feed error");
            }
        }
    }
    shared.finished.store(true, Ordering::SeqCst);
    tracing::debug!(session = %shared.key, "question feed ended");
}

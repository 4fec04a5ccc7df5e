use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use checkin_core::model::{
    BroadcastQuestion, CheckinNo, ClassId, ClassSession, Question, QuestionNo, SessionKey,
    StudentProfile, StudentUid,
};
use checkin_core::time::{fixed_clock, fixed_now};
use services::{
    AnswerError, AnswerRequest, ClassroomServices, ClientState, EventCallback, QuestionEvent,
    SignedInUser, Subscription,
};
use async_trait::async_trait;
use storage::repository::{
    AnswerRepository, ProfileRepository, SessionFeed, SessionRepository, Storage, StorageError,
};
use storage::{InMemoryRepository, SessionChangeSender, SessionWatch};
use tokio::sync::mpsc;

/// Feed whose changes are pushed by the test through the stored sender.
#[derive(Default)]
struct ManualFeed {
    sender: Mutex<Option<SessionChangeSender>>,
}

impl ManualFeed {
    fn push(&self, change: Result<Option<ClassSession>, StorageError>) {
        let guard = self.sender.lock().expect("sender");
        guard.as_ref().expect("watch registered").send(change).expect("watch open");
    }
}

#[async_trait]
impl SessionFeed for ManualFeed {
    async fn watch_session(&self, key: &SessionKey) -> Result<SessionWatch, StorageError> {
        let (tx, watch) = SessionWatch::channel(key.clone());
        *self.sender.lock().expect("sender") = Some(tx);
        Ok(watch)
    }
}

fn class_id() -> ClassId {
    ClassId::new("C1").unwrap()
}

fn uid() -> StudentUid {
    StudentUid::new("S1").unwrap()
}

fn key(no: u32) -> SessionKey {
    SessionKey::new(class_id(), CheckinNo::new(no))
}

fn session(question: Option<Question>) -> ClassSession {
    let mut session = ClassSession::open(key(7), "ABCD", fixed_now()).expect("session");
    session.set_question(question);
    session
}

fn two_plus_two() -> Question {
    Question::shown(QuestionNo::new(2), "2+2=?")
}

fn collector() -> (EventCallback, mpsc::UnboundedReceiver<QuestionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: EventCallback = Arc::new(move |event: QuestionEvent| {
        let _ = tx.send(event);
    });
    (callback, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<QuestionEvent>) -> QuestionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("feed open")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<QuestionEvent>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected event");
}

async fn setup() -> (InMemoryRepository, ClassroomServices) {
    let repo = InMemoryRepository::with_clock(fixed_clock());
    repo.upsert_profile(&StudentProfile {
        uid: uid(),
        student_id: "6401".into(),
        first_name: "Ann".into(),
        last_name: "Lee".into(),
        email: String::new(),
    })
    .await
    .expect("seed profile");
    repo.upsert_session(&session(None)).await.expect("seed session");

    let services = ClassroomServices::from_storage(
        Storage::from_memory(repo.clone()),
        Arc::new(SignedInUser::signed_in(uid())),
        Arc::new(|_: QuestionEvent| {}),
    );
    (repo, services)
}

#[tokio::test]
async fn shown_then_hidden_fires_once_each() {
    let (repo, services) = setup().await;
    let questions = services.questions();
    let (callback, mut rx) = collector();
    questions.subscribe(key(7), callback).await.expect("subscribe");
    assert_eq!(questions.state(), ClientState::Subscribed(key(7)));

    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");
    let expected = BroadcastQuestion {
        question_no: QuestionNo::new(2),
        text: "2+2=?".into(),
    };
    assert_eq!(
        next(&mut rx).await,
        QuestionEvent::Shown {
            session: key(7),
            question: expected.clone(),
        }
    );
    assert_eq!(
        questions.state(),
        ClientState::QuestionVisible(key(7), expected)
    );

    // Same question again: no second Shown.
    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("repeat");
    assert_quiet(&mut rx).await;

    repo.upsert_session(&session(Some(two_plus_two().hidden())))
        .await
        .expect("hide");
    assert_eq!(next(&mut rx).await, QuestionEvent::Hidden { session: key(7) });
    assert_eq!(questions.state(), ClientState::QuestionHidden(key(7)));
}

#[tokio::test]
async fn late_subscriber_sees_visible_question() {
    let (repo, services) = setup().await;
    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");

    let (callback, mut rx) = collector();
    services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");
    assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn cancel_stops_delivery() {
    let (repo, services) = setup().await;
    let (callback, mut rx) = collector();
    let subscription = services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");

    subscription.cancel();
    subscription.cancel();
    assert!(!subscription.is_active());
    assert_eq!(services.questions().state(), ClientState::Idle);

    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");
    repo.delete_session(&key(7)).await.expect("delete");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn cancel_from_inside_callback() {
    let (repo, services) = setup().await;
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let callback: EventCallback = {
        let slot = Arc::clone(&slot);
        Arc::new(move |event: QuestionEvent| {
            let _ = tx.send(event);
            if let Some(sub) = slot.lock().expect("slot").as_ref() {
                sub.cancel();
            }
        })
    };
    let subscription = services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");
    *slot.lock().expect("slot") = Some(subscription.clone());

    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");
    assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));

    repo.upsert_session(&session(Some(two_plus_two().hidden())))
        .await
        .expect("hide");
    assert_quiet(&mut rx).await;
    assert!(!subscription.is_active());
    assert_eq!(services.questions().state(), ClientState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_initial_delivery_releases_the_feed() {
    let (repo, services) = setup().await;
    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let callback: EventCallback = {
        let slot = Arc::clone(&slot);
        Arc::new(move |event: QuestionEvent| {
            let _ = tx.send(event);
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Some(sub) = slot.lock().expect("slot").as_ref() {
                    sub.cancel();
                    return;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };
    let subscription = services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");
    *slot.lock().expect("slot") = Some(subscription.clone());
    assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));

    let hub = repo.feed_hub().clone();
    let released = tokio::time::timeout(Duration::from_secs(2), async {
        while hub.watcher_count(&key(7)) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "feed task still watching");
    assert!(!subscription.is_active());
    assert_eq!(services.questions().state(), ClientState::Idle);
}

#[tokio::test]
async fn stream_error_keeps_subscription_in_place() {
    let (repo, _) = setup().await;
    let feed = Arc::new(ManualFeed::default());
    let dyn_feed: Arc<dyn SessionFeed> = feed.clone();
    let mut storage = Storage::from_memory(repo);
    storage.feed = dyn_feed;
    let services = ClassroomServices::from_storage(
        storage,
        Arc::new(SignedInUser::signed_in(uid())),
        Arc::new(|_: QuestionEvent| {}),
    );

    let (callback, mut rx) = collector();
    let subscription = services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");

    feed.push(Err(StorageError::Connection("stream reset".into())));
    assert_quiet(&mut rx).await;
    assert!(subscription.is_active());
    assert_eq!(services.questions().state(), ClientState::Subscribed(key(7)));

    feed.push(Ok(Some(session(Some(two_plus_two())))));
    assert!(matches!(next(&mut rx).await, QuestionEvent::Shown { .. }));
    assert!(subscription.is_active());
    subscription.cancel();
}

#[tokio::test]
async fn answers_require_the_shown_question() {
    let (repo, services) = setup().await;
    let answers = services.answers();
    let request =
        |text: &str| AnswerRequest::new(class_id(), CheckinNo::new(7), QuestionNo::new(2), text);

    let err = answers.submit_answer(request("4")).await.expect_err("nothing shown");
    assert!(matches!(err, AnswerError::StaleQuestion));

    let (callback, mut rx) = collector();
    services
        .questions()
        .subscribe(key(7), callback)
        .await
        .expect("subscribe");
    repo.upsert_session(&session(Some(two_plus_two())))
        .await
        .expect("show");
    next(&mut rx).await;

    let err = answers.submit_answer(request("   ")).await.expect_err("blank");
    assert!(matches!(err, AnswerError::Validation(_)));

    let wrong_question =
        AnswerRequest::new(class_id(), CheckinNo::new(7), QuestionNo::new(3), "4");
    let err = answers
        .submit_answer(wrong_question)
        .await
        .expect_err("other question");
    assert!(matches!(err, AnswerError::StaleQuestion));

    answers.submit_answer(request("5")).await.expect("first answer");
    let record = answers.submit_answer(request(" 4 ")).await.expect("second answer");
    assert_eq!(record.answer_text, " 4 ");
    assert_eq!(record.display_name, "Ann Lee");

    let stored = repo
        .list_answers(&key(7), QuestionNo::new(2))
        .await
        .expect("list answers");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].answer_text, " 4 ");

    repo.upsert_session(&session(Some(two_plus_two().hidden())))
        .await
        .expect("hide");
    next(&mut rx).await;
    let err = answers.submit_answer(request("4")).await.expect_err("hidden");
    assert!(matches!(err, AnswerError::StaleQuestion));
}

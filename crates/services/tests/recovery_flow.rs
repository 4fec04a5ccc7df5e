use std::sync::Arc;
use std::time::Duration;

use checkin_core::model::{
    CheckinNo, ClassId, ClassSession, Question, QuestionNo, SessionKey, StudentUid,
};
use checkin_core::time::{fixed_clock, fixed_now};
use services::{ClassroomServices, ClientState, EventCallback, QuestionEvent, SignedInUser};
use storage::repository::{LocalCache, SessionRepository};
use tokio::sync::mpsc;

fn class_id() -> ClassId {
    ClassId::new("C1").unwrap()
}

fn key(no: u32) -> SessionKey {
    SessionKey::new(class_id(), CheckinNo::new(no))
}

fn session(no: u32, question: Option<(u32, &str)>) -> ClassSession {
    let mut session = ClassSession::open(key(no), "ABCD", fixed_now()).expect("session");
    session.set_question(question.map(|(q, text)| Question::shown(QuestionNo::new(q), text)));
    session
}

/// Open a client on a shared in-memory database with a fresh event channel.
async fn launch(db: &str) -> (ClassroomServices, mpsc::UnboundedReceiver<QuestionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let on_event: EventCallback = Arc::new(move |event: QuestionEvent| {
        let _ = tx.send(event);
    });
    let url = format!("sqlite:file:{db}?mode=memory&cache=shared");
    let services = ClassroomServices::new_sqlite(
        &url,
        fixed_clock(),
        Duration::from_millis(10),
        Arc::new(SignedInUser::signed_in(StudentUid::new("S1").unwrap())),
        on_event,
    )
    .await
    .expect("connect sqlite");
    (services, rx)
}

async fn remember(services: &ClassroomServices, no: &str) {
    let cache = &services.storage().cache;
    cache.set("lastClassId", "C1").await.expect("cache class");
    cache.set("lastCheckinNo", no).await.expect("cache number");
}

#[tokio::test]
async fn relaunch_with_deleted_session_is_silent() {
    let (services, mut rx) = launch("memdb_recovery_deleted").await;
    remember(&services, "7").await;

    let recovery = services.recovery();
    let subscription = recovery
        .resume(&class_id())
        .await
        .expect("resume")
        .expect("pointer present");
    assert_eq!(subscription.key(), &key(7));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(recovery.state(), ClientState::Subscribed(key(7)));
    recovery.leave().await;
}

#[tokio::test]
async fn relaunch_picks_up_visible_question() {
    let (services, mut rx) = launch("memdb_recovery_visible").await;
    services
        .storage()
        .sessions
        .upsert_session(&session(7, Some((2, "2+2=?"))))
        .await
        .expect("seed session");
    remember(&services, "7").await;

    let recovery = services.recovery();
    recovery.resume(&class_id()).await.expect("resume");
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("feed open");
    match event {
        QuestionEvent::Shown { session, question } => {
            assert_eq!(session, key(7));
            assert_eq!(question.text, "2+2=?");
        }
        QuestionEvent::Hidden { .. } => panic!("expected Shown"),
    }

    // Later polls of the unchanged row do not re-fire.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    // Hiding is observed through polling.
    services
        .storage()
        .sessions
        .upsert_session(&session(7, None))
        .await
        .expect("hide");
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("feed open");
    assert_eq!(event, QuestionEvent::Hidden { session: key(7) });
    recovery.leave().await;
}

#[tokio::test]
async fn no_pointer_means_no_subscription() {
    let (services, _rx) = launch("memdb_recovery_empty").await;
    let recovery = services.recovery();
    assert!(recovery.resume(&class_id()).await.expect("resume").is_none());
    assert_eq!(recovery.state(), ClientState::Idle);
}

#[tokio::test]
async fn refresh_adopts_lowest_visible_session() {
    let (services, mut rx) = launch("memdb_recovery_refresh").await;
    let sessions = &services.storage().sessions;
    sessions
        .upsert_session(&session(9, Some((1, "later"))))
        .await
        .expect("seed 9");
    sessions
        .upsert_session(&session(8, None))
        .await
        .expect("seed 8");

    let recovery = services.recovery();
    let adopted = recovery
        .refresh_open_sessions(&class_id())
        .await
        .expect("refresh");
    assert_eq!(adopted, Some(key(9)));
    rx.recv().await.expect("shown for 9");

    sessions
        .upsert_session(&session(5, Some((1, "earlier"))))
        .await
        .expect("seed 5");
    let adopted = recovery
        .refresh_open_sessions(&class_id())
        .await
        .expect("refresh");
    assert_eq!(adopted, Some(key(5)));
    match rx.recv().await.expect("shown for 5") {
        QuestionEvent::Shown { session, .. } => assert_eq!(session, key(5)),
        QuestionEvent::Hidden { .. } => panic!("expected Shown"),
    }
    assert_eq!(
        services.questions().current().await.expect("live").key(),
        &key(5)
    );
    recovery.leave().await;
}

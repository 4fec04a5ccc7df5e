use async_trait::async_trait;
use checkin_core::Clock;
use checkin_core::model::{
    AnswerDraft, AnswerRecord, CheckinDraft, CheckinRecord, ClassId, ClassMember, ClassSession,
    Classroom, Enrollment, QuestionNo, SessionKey, SessionStatus, StudentProfile, StudentUid,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::feed::{FeedHub, SessionWatch};
use crate::repository::{
    AnswerRepository, ClassRepository, LocalCache, ProfileRepository, RosterRepository,
    SessionFeed, SessionRepository, StorageError,
};

type AnswerKey = (SessionKey, QuestionNo, StudentUid);

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Session writes are fanned out to watchers through a `FeedHub`, which makes
/// this backend behave like a document store with live listeners.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    clock: Clock,
    classes: Arc<Mutex<HashMap<ClassId, Classroom>>>,
    members: Arc<Mutex<HashMap<(ClassId, StudentUid), ClassMember>>>,
    enrollments: Arc<Mutex<BTreeMap<(StudentUid, ClassId), Enrollment>>>,
    profiles: Arc<Mutex<HashMap<StudentUid, StudentProfile>>>,
    sessions: Arc<Mutex<BTreeMap<SessionKey, ClassSession>>>,
    checkins: Arc<Mutex<BTreeMap<(SessionKey, StudentUid), CheckinRecord>>>,
    answers: Arc<Mutex<BTreeMap<AnswerKey, AnswerRecord>>>,
    cache: Arc<Mutex<HashMap<String, String>>>,
    feed: FeedHub,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// The hub session writes are published to.
    #[must_use]
    pub fn feed_hub(&self) -> &FeedHub {
        &self.feed
    }

    /// Class roster entry, for assertions in tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the table is poisoned.
    pub fn member(
        &self,
        class_id: &ClassId,
        uid: &StudentUid,
    ) -> Result<Option<ClassMember>, StorageError> {
        let guard = lock(&self.members)?;
        Ok(guard.get(&(class_id.clone(), uid.clone())).cloned())
    }
}

#[async_trait]
impl ClassRepository for InMemoryRepository {
    async fn upsert_class(&self, class: &Classroom) -> Result<(), StorageError> {
        lock(&self.classes)?.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn get_class(&self, id: &ClassId) -> Result<Option<Classroom>, StorageError> {
        Ok(lock(&self.classes)?.get(id).cloned())
    }

    async fn put_member(&self, member: &ClassMember) -> Result<(), StorageError> {
        lock(&self.members)?.insert(
            (member.class_id.clone(), member.uid.clone()),
            member.clone(),
        );
        Ok(())
    }

    async fn get_enrollment(
        &self,
        uid: &StudentUid,
        class_id: &ClassId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        Ok(guard.get(&(uid.clone(), class_id.clone())).cloned())
    }

    async fn put_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        lock(&self.enrollments)?.insert(
            (enrollment.uid.clone(), enrollment.class_id.clone()),
            enrollment.clone(),
        );
        Ok(())
    }

    async fn list_enrollments(&self, uid: &StudentUid) -> Result<Vec<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        Ok(guard
            .values()
            .filter(|e| &e.uid == uid)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, uid: &StudentUid) -> Result<Option<StudentProfile>, StorageError> {
        Ok(lock(&self.profiles)?.get(uid).cloned())
    }

    async fn upsert_profile(&self, profile: &StudentProfile) -> Result<(), StorageError> {
        lock(&self.profiles)?.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ClassSession>, StorageError> {
        Ok(lock(&self.sessions)?.get(key).cloned())
    }

    async fn list_sessions(
        &self,
        class_id: &ClassId,
        status: SessionStatus,
    ) -> Result<Vec<ClassSession>, StorageError> {
        let guard = lock(&self.sessions)?;
        // BTreeMap order is (class, checkin_no), so results come out sorted.
        Ok(guard
            .values()
            .filter(|s| &s.key().class_id == class_id && s.status() == status)
            .cloned()
            .collect())
    }

    async fn upsert_session(&self, session: &ClassSession) -> Result<(), StorageError> {
        lock(&self.sessions)?.insert(session.key().clone(), session.clone());
        self.feed.publish(session.key(), Some(session));
        Ok(())
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), StorageError> {
        let removed = lock(&self.sessions)?.remove(key);
        if removed.is_some() {
            self.feed.publish(key, None);
        }
        Ok(())
    }
}

#[async_trait]
impl RosterRepository for InMemoryRepository {
    async fn get_checkin(
        &self,
        key: &SessionKey,
        uid: &StudentUid,
    ) -> Result<Option<CheckinRecord>, StorageError> {
        let guard = lock(&self.checkins)?;
        Ok(guard.get(&(key.clone(), uid.clone())).cloned())
    }

    async fn put_checkin(&self, draft: CheckinDraft) -> Result<CheckinRecord, StorageError> {
        let record = draft.stamp(self.clock.now());
        lock(&self.checkins)?.insert(
            (record.session.clone(), record.uid.clone()),
            record.clone(),
        );
        Ok(record)
    }

    async fn list_checkins(&self, key: &SessionKey) -> Result<Vec<CheckinRecord>, StorageError> {
        let guard = lock(&self.checkins)?;
        Ok(guard
            .iter()
            .filter(|((session, _), _)| session == key)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn put_answer(&self, draft: AnswerDraft) -> Result<AnswerRecord, StorageError> {
        let record = draft.stamp(self.clock.now());
        lock(&self.answers)?.insert(
            (
                record.session.clone(),
                record.question_no,
                record.uid.clone(),
            ),
            record.clone(),
        );
        Ok(record)
    }

    async fn get_answer(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
        uid: &StudentUid,
    ) -> Result<Option<AnswerRecord>, StorageError> {
        let guard = lock(&self.answers)?;
        Ok(guard
            .get(&(key.clone(), question_no, uid.clone()))
            .cloned())
    }

    async fn list_answers(
        &self,
        key: &SessionKey,
        question_no: QuestionNo,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = lock(&self.answers)?;
        Ok(guard
            .iter()
            .filter(|((session, no, _), _)| session == key && *no == question_no)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl SessionFeed for InMemoryRepository {
    async fn watch_session(&self, key: &SessionKey) -> Result<SessionWatch, StorageError> {
        self.feed.watch(key)
    }
}

#[async_trait]
impl LocalCache for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.cache)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.cache)?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.cache)?.remove(key);
        Ok(())
    }
}

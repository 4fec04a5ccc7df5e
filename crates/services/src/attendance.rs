use std::sync::Arc;

use checkin_core::model::{
    CheckinDraft, CheckinNo, CheckinRecord, ClassId, ClassSession, SessionKey, SessionStatus,
};
use storage::repository::{ProfileRepository, RosterRepository, SessionRepository};

use crate::error::CheckinError;
use crate::identity::{IdentityProvider, resolve_profile};
use crate::pointer::PointerStore;

/// Raw check-in form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinRequest {
    pub class_id: ClassId,
    pub checkin_no: String,
    pub access_code: String,
    pub remark: String,
}

impl CheckinRequest {
    #[must_use]
    pub fn new(
        class_id: ClassId,
        checkin_no: impl Into<String>,
        access_code: impl Into<String>,
        remark: impl Into<String>,
    ) -> Self {
        Self {
            class_id,
            checkin_no: checkin_no.into(),
            access_code: access_code.into(),
            remark: remark.into(),
        }
    }
}

/// Validates and records attendance check-ins for the signed-in student.
///
/// Single submission is enforced by reading the roster before writing. The
/// read and the write are not atomic: two concurrent submissions by the same
/// student (a double tap) can both pass the read. The second write then
/// replaces the first, so the roster still holds one record per student.
#[derive(Clone)]
pub struct AttendanceClient {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    sessions: Arc<dyn SessionRepository>,
    roster: Arc<dyn RosterRepository>,
    pointer: PointerStore,
}

impl AttendanceClient {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<dyn SessionRepository>,
        roster: Arc<dyn RosterRepository>,
        pointer: PointerStore,
    ) -> Self {
        Self {
            identity,
            profiles,
            sessions,
            roster,
            pointer,
        }
    }

    /// Check the signed-in student in to a session.
    ///
    /// Preconditions are checked in order and the first failure is returned.
    /// On success the session is also remembered as the recovery pointer; a
    /// failure to update the pointer is logged and does not fail the check-in.
    ///
    /// # Errors
    ///
    /// Returns `CheckinError::Validation` for blank or non-numeric input,
    /// `SessionNotFound`, `SessionClosed`, `InvalidCode`, `AlreadyCheckedIn`,
    /// `ProfileMissing` for the corresponding rejections, and `Transport` when
    /// a store call fails.
    pub async fn check_in(&self, request: CheckinRequest) -> Result<CheckinRecord, CheckinError> {
        let raw_no = request.checkin_no.trim();
        if raw_no.is_empty() || request.access_code.trim().is_empty() {
            return Err(CheckinError::Validation(
                "please enter both check-in number and code".into(),
            ));
        }
        let checkin_no: CheckinNo = raw_no.parse().map_err(|_| {
            CheckinError::Validation(format!("check-in number must be a number, got {raw_no:?}"))
        })?;
        let key = SessionKey::new(request.class_id, checkin_no);

        let session = self
            .sessions
            .get_session(&key)
            .await?
            .ok_or(CheckinError::SessionNotFound)?;
        if !session.is_open() {
            return Err(CheckinError::SessionClosed);
        }
        if !session.code_matches(&request.access_code) {
            return Err(CheckinError::InvalidCode);
        }

        let uid = self
            .identity
            .current_user()
            .ok_or(CheckinError::ProfileMissing)?;
        if self.roster.get_checkin(&key, &uid).await?.is_some() {
            return Err(CheckinError::AlreadyCheckedIn);
        }

        let identity = resolve_profile(self.profiles.as_ref(), &uid)
            .await?
            .ok_or(CheckinError::ProfileMissing)?;

        let record = self
            .roster
            .put_checkin(CheckinDraft::new(key.clone(), uid, identity, request.remark))
            .await?;
        tracing::info!(session = %key, uid = %record.uid, "checked in");

        if let Err(err) = self.pointer.save(&key).await {
            tracing::warn!(session = %key, error = %err, "failed to remember session pointer");
        }

        Ok(record)
    }

    /// Open sessions of a class, lowest check-in number first.
    ///
    /// # Errors
    ///
    /// Returns `CheckinError::Transport` if the store query fails.
    pub async fn open_sessions(&self, class_id: &ClassId) -> Result<Vec<ClassSession>, CheckinError> {
        Ok(self
            .sessions
            .list_sessions(class_id, SessionStatus::Open)
            .await?)
    }

    /// Whether the signed-in student already has a record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `CheckinError::ProfileMissing` when nobody is signed in and
    /// `Transport` if the store read fails.
    pub async fn has_checked_in(&self, key: &SessionKey) -> Result<bool, CheckinError> {
        let uid = self
            .identity
            .current_user()
            .ok_or(CheckinError::ProfileMissing)?;
        Ok(self.roster.get_checkin(key, &uid).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SignedInUser;
    use checkin_core::model::{RecoveryPointer, StudentProfile, StudentUid};
    use checkin_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;

    struct Fixture {
        repo: InMemoryRepository,
        user: SignedInUser,
        client: AttendanceClient,
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

    async fn fixture() -> Fixture {
        let repo = InMemoryRepository::with_clock(fixed_clock());
        let user = SignedInUser::signed_in(uid());
        repo.upsert_profile(&StudentProfile {
            uid: uid(),
            student_id: "6401".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "ann@example.com".into(),
        })
        .await
        .unwrap();
        repo.upsert_session(&ClassSession::open(key(7), "ABCD", fixed_now()).unwrap())
            .await
            .unwrap();

        let client = AttendanceClient::new(
            Arc::new(user.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            PointerStore::new(Arc::new(repo.clone())),
        );
        Fixture { repo, user, client }
    }

    fn request(no: &str, code: &str) -> CheckinRequest {
        CheckinRequest::new(class_id(), no, code, "")
    }

    #[tokio::test]
    async fn check_in_records_and_remembers_session() {
        let fx = fixture().await;
        let record = fx.client.check_in(request("7", "ABCD")).await.unwrap();

        assert_eq!(record.uid, uid());
        assert_eq!(record.student_id, "6401");
        assert_eq!(record.display_name, "Ann Lee");
        assert_eq!(record.submitted_at, fixed_now());

        let pointer = PointerStore::new(Arc::new(fx.repo.clone())).load().await.unwrap();
        assert_eq!(pointer, RecoveryPointer::for_session(&key(7)));
    }

    #[tokio::test]
    async fn blank_or_non_numeric_input_is_validation() {
        let fx = fixture().await;
        for (no, code) in [("", "ABCD"), ("7", "  "), ("  ", "")] {
            let err = fx.client.check_in(request(no, code)).await.unwrap_err();
            assert!(matches!(err, CheckinError::Validation(_)), "{no:?}/{code:?}");
        }
        let err = fx.client.check_in(request("seven", "ABCD")).await.unwrap_err();
        assert!(matches!(err, CheckinError::Validation(_)));
    }

    #[tokio::test]
    async fn rejections_follow_precondition_order() {
        let fx = fixture().await;

        // Unknown session wins over a wrong code.
        let err = fx.client.check_in(request("8", "WRONG")).await.unwrap_err();
        assert!(matches!(err, CheckinError::SessionNotFound));

        let err = fx.client.check_in(request("7", "abcd")).await.unwrap_err();
        assert!(matches!(err, CheckinError::InvalidCode));

        // Closed wins over a wrong code.
        let mut closed = ClassSession::open(key(9), "ABCD", fixed_now()).unwrap();
        closed.close();
        fx.repo.upsert_session(&closed).await.unwrap();
        let err = fx.client.check_in(request("9", "WRONG")).await.unwrap_err();
        assert!(matches!(err, CheckinError::SessionClosed));
        assert!(fx.repo.list_checkins(&key(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_out_or_profileless_user_is_profile_missing() {
        let fx = fixture().await;
        fx.user.sign_out();
        let err = fx.client.check_in(request("7", "ABCD")).await.unwrap_err();
        assert!(matches!(err, CheckinError::ProfileMissing));

        fx.user.sign_in(StudentUid::new("S2").unwrap());
        let err = fx.client.check_in(request("7", "ABCD")).await.unwrap_err();
        assert!(matches!(err, CheckinError::ProfileMissing));
        assert!(fx.repo.list_checkins(&key(7)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_sessions_and_has_checked_in() {
        let fx = fixture().await;
        assert!(!fx.client.has_checked_in(&key(7)).await.unwrap());
        fx.client.check_in(request("7", "ABCD")).await.unwrap();
        assert!(fx.client.has_checked_in(&key(7)).await.unwrap());

        let open = fx.client.open_sessions(&class_id()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].key(), &key(7));
    }
}

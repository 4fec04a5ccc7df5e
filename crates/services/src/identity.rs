use std::sync::{Arc, PoisonError, RwLock};

use checkin_core::model::{StudentIdentity, StudentUid};
use storage::repository::{ProfileRepository, StorageError};

/// The signed-in user as reported by the identity provider.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<StudentUid>;
}

/// Identity provider holding the signed-in uid in memory.
#[derive(Clone, Default)]
pub struct SignedInUser {
    uid: Arc<RwLock<Option<StudentUid>>>,
}

impl SignedInUser {
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(uid: StudentUid) -> Self {
        let user = Self::default();
        user.sign_in(uid);
        user
    }

    pub fn sign_in(&self, uid: StudentUid) {
        *self.uid.write().unwrap_or_else(PoisonError::into_inner) = Some(uid);
    }

    pub fn sign_out(&self) {
        *self.uid.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SignedInUser {
    fn current_user(&self) -> Option<StudentUid> {
        self.uid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Outcome of looking up the caller's profile.
pub(crate) enum Caller {
    Resolved(StudentUid, StudentIdentity),
    Missing,
}

/// Resolve the signed-in user and the identity copied onto records.
///
/// A signed-out caller, a missing `users/{uid}` document, and a profile
/// without student id or name all count as a missing profile.
pub(crate) async fn resolve_caller(
    identity: &dyn IdentityProvider,
    profiles: &dyn ProfileRepository,
) -> Result<Caller, StorageError> {
    let Some(uid) = identity.current_user() else {
        return Ok(Caller::Missing);
    };
    Ok(match resolve_profile(profiles, &uid).await? {
        Some(resolved) => Caller::Resolved(uid, resolved),
        None => Caller::Missing,
    })
}

/// Identity for a known uid, or `None` if the profile is missing or incomplete.
pub(crate) async fn resolve_profile(
    profiles: &dyn ProfileRepository,
    uid: &StudentUid,
) -> Result<Option<StudentIdentity>, StorageError> {
    let Some(profile) = profiles.get_profile(uid).await? else {
        return Ok(None);
    };
    match profile.identity() {
        Ok(resolved) => Ok(Some(resolved)),
        Err(err) => {
            tracing::warn!(uid = %uid, error = %err, "profile is incomplete");
            Ok(None)
        }
    }
}

use crate::model::ids::{CheckinNo, ClassId, ParseIdError, SessionKey};

/// Last session this device was attached to.
///
/// A best-effort hint cached on the device; either half may be missing or stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryPointer {
    pub last_class_id: Option<ClassId>,
    pub last_checkin_no: Option<CheckinNo>,
}

impl RecoveryPointer {
    pub const CLASS_KEY: &'static str = "lastClassId";
    pub const CHECKIN_KEY: &'static str = "lastCheckinNo";

    #[must_use]
    pub fn for_session(key: &SessionKey) -> Self {
        Self {
            last_class_id: Some(key.class_id.clone()),
            last_checkin_no: Some(key.checkin_no),
        }
    }

    /// Parse raw cache values.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if a present value cannot be parsed.
    pub fn from_raw(class_id: Option<&str>, checkin_no: Option<&str>) -> Result<Self, ParseIdError> {
        let last_class_id = class_id.map(str::parse::<ClassId>).transpose()?;
        let last_checkin_no = checkin_no.map(str::parse::<CheckinNo>).transpose()?;
        Ok(Self {
            last_class_id,
            last_checkin_no,
        })
    }

    /// The session to resume inside `class_id`.
    ///
    /// Pointers saved without a class id are accepted for any class; pointers
    /// for another class are ignored.
    #[must_use]
    pub fn session_in(&self, class_id: &ClassId) -> Option<SessionKey> {
        let checkin_no = self.last_checkin_no?;
        match &self.last_class_id {
            Some(saved) if saved != class_id => None,
            _ => Some(SessionKey::new(class_id.clone(), checkin_no)),
        }
    }
}

mod classroom;
mod ids;
mod pointer;
mod profile;
mod records;
mod session;

pub use ids::{CheckinNo, ClassId, ParseIdError, QuestionNo, SessionKey, StudentUid};

pub use classroom::{ClassMember, Classroom, Enrollment, EnrollmentStatus};
pub use pointer::RecoveryPointer;
pub use profile::{ProfileError, StudentIdentity, StudentProfile};
pub use records::{AnswerDraft, AnswerRecord, CheckinDraft, CheckinRecord};
pub use session::{BroadcastQuestion, ClassSession, Question, SessionError, SessionStatus};

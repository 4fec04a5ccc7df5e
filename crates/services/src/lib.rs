#![forbid(unsafe_code)]

pub mod answers;
pub mod app_services;
pub mod attendance;
pub mod enrollment;
pub mod error;
pub mod identity;
pub mod pointer;
pub mod recovery;
pub mod subscription;

pub use checkin_core::Clock;

pub use answers::{AnswerRequest, AnswerSubmitter};
pub use app_services::ClassroomServices;
pub use attendance::{AttendanceClient, CheckinRequest};
pub use enrollment::EnrollmentService;
pub use error::{AnswerError, CheckinError, EnrollmentError, RecoveryError, ServicesInitError};
pub use identity::{IdentityProvider, SignedInUser};
pub use pointer::PointerStore;
pub use recovery::SessionRecoveryCoordinator;
pub use subscription::{
    ClientState, EventCallback, QuestionBoard, QuestionEvent, QuestionSubscription, Subscription,
};

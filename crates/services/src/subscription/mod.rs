//! Live question broadcast: one subscription per client, edge-triggered
//! show/hide events, and the client state the answer path checks against.

mod board;
mod handle;
mod service;
mod tracker;

pub use board::{ClientState, QuestionBoard};
pub use handle::{EventCallback, Subscription};
pub use service::QuestionSubscription;
pub use tracker::{QuestionEvent, VisibilityTracker};

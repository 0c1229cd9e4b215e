pub mod clock;
pub mod error;
pub mod node;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use node::{
    Node, OwnerRef, Pod, DATA_ANNOTATION, DEFAULT_PROFILE, LOG_DETAILS_LABEL, PROFILE_LABEL,
    PROFILE_SEPARATOR, STATE_LABEL,
};
pub use state::NodeState;

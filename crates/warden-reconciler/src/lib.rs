pub mod controller;
pub mod error;
pub mod reconcile;

pub use controller::Controller;
pub use error::{ReconcileCause, ReconcileError};
pub use reconcile::{reconcile, ReconcileContext, ReconcileOutcome};

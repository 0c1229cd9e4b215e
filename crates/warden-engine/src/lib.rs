pub mod coordinator;
pub mod error;
pub mod fsm;
pub mod info;
pub mod profile;

pub use coordinator::Coordinator;
pub use error::EngineError;
pub use fsm::{apply, ApplyFailure, ApplyParams, ApplyResult, ApplyStage, TransitionResult};
pub use info::{NodeInfo, NodeInfoCache, ProfileInfo, ProfileOutcome};
pub use profile::{compile_profiles, PluginChains, Profile, Transition};

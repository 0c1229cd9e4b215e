pub mod duration;
pub mod error;
pub mod loader;
pub mod raw;

pub use error::ConfigError;
pub use loader::{load_config, parse_config, Config, Dashboard, Intervals};
pub use raw::{
    RawChains, RawConfig, RawInstance, RawInstances, RawNotifyInstance, RawProfile, RawSchedule,
    RawTransition,
};

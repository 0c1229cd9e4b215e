pub mod cluster;
pub mod data;
pub mod error;
pub mod memory;

pub use cluster::{Cluster, EventReason, Lease, NodeEvent};
pub use data::{Data, ProfileData};
pub use error::StoreError;
pub use memory::InMemoryCluster;

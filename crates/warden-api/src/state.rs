use std::sync::Arc;

use warden_engine::NodeInfoCache;
use warden_observe::Metrics;
use warden_store::Cluster;

#[derive(Clone)]
pub struct AppState {
    pub info_cache: Arc<NodeInfoCache>,
    pub metrics: Arc<Metrics>,
    pub cluster: Arc<dyn Cluster>,
}

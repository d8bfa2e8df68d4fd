use std::sync::Arc;

use crate::compute::ComputeWorker;
use crate::coordinator::AnalysisCoordinator;
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<AnalysisCoordinator>,
    /// `None` when persistence is disabled or was unreachable at boot.
    pub store: Option<Arc<dyn JobStore>>,
    pub worker: Arc<dyn ComputeWorker>,
}

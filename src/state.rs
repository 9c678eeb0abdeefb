use crate::engine::tracker::TrackerHandle;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub tracker: TrackerHandle,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(tracker: TrackerHandle, metrics: Metrics) -> Self {
        Self { tracker, metrics }
    }
}

use docanalyzer::{AnalysisService, Runtime};

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Runtime,
}

impl AppState {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn service(&self) -> &AnalysisService {
        self.runtime.service()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.runtime.config().upload.max_upload_bytes
    }
}

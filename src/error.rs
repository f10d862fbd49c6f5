use thiserror::Error;

/// Failure taxonomy for the pipeline surface. The store layer keeps
/// `anyhow` internally; its errors convert into `Persistence` at this
/// boundary and are fatal to the current request. External-service
/// failures are handled at each call site (fallback text for narrative
/// calls, log-and-drop for the fire-and-forget dispatch) and only reach
/// callers where no fallback exists.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("capture carried no image payload")]
    MissingPayload,

    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error("store failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl PipelineError {
    /// Client-side errors the HTTP collaborator should surface as 4xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownDevice(_) | PipelineError::MissingPayload
        )
    }
}

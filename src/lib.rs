pub mod aggregate;
pub mod capture;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ingest;
pub mod narrative;
pub mod reports;

use std::sync::Arc;

pub use capture::{CaptureDispatcher, CaptureMode, CaptureOutcome};
pub use config::Config;
pub use db::Database;
pub use dispatch::{AnalysisDispatch, HttpAnalysisClient};
pub use error::PipelineError;
pub use events::{DeviceEvent, EventBus};
pub use ingest::{AnalysisEnvelope, ResultIngestor};
pub use narrative::{LlmNarrativeClient, NarrativeGenerator};
pub use reports::{journal::HarvestJournalBuilder, weekly::WeeklyReportBuilder, BuildOutcome};

/// Wired-up pipeline with the production HTTP clients. Components can
/// also be constructed individually with substitute collaborators.
pub struct Pipeline {
    pub db: Database,
    pub events: Arc<EventBus>,
    pub capture: CaptureDispatcher,
    pub ingestor: ResultIngestor,
    pub weekly: WeeklyReportBuilder,
    pub journal: HarvestJournalBuilder,
}

impl Pipeline {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let db = Database::new(config.database_path.clone())?;
        let events = Arc::new(EventBus::new());

        let dispatch: Arc<dyn AnalysisDispatch> =
            Arc::new(HttpAnalysisClient::new(config.vision.base_url.clone()));
        let narrative: Arc<dyn NarrativeGenerator> = Arc::new(LlmNarrativeClient::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        ));

        Ok(Self {
            capture: CaptureDispatcher::new(db.clone(), Arc::clone(&events), dispatch),
            ingestor: ResultIngestor::new(
                db.clone(),
                Arc::clone(&events),
                Arc::clone(&narrative),
            ),
            weekly: WeeklyReportBuilder::new(db.clone(), Arc::clone(&narrative)),
            journal: HarvestJournalBuilder::new(db.clone(), narrative),
            db,
            events,
        })
    }
}

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

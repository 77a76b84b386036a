//! Record ingestion pipeline: table reading, extraction, validation,
//! persistence and the run orchestration around them.

pub mod column_resolver;
pub mod extractor;
pub mod html_tables;
pub mod orchestrator;
pub mod scheduler;
pub mod sink;
pub mod state_manager;
pub mod validator;

pub use column_resolver::{ColumnField, ColumnMap, ColumnResolver};
pub use extractor::{ExtractStats, Extraction, RecordExtractor};
pub use orchestrator::{SyncOrchestrator, SyncRequest, SyncRunLog};
pub use scheduler::SchedulerService;
pub use sink::{BatchOutcome, RecordStore, UpsertReport, UpsertSink};
pub use state_manager::SyncStateManager;
pub use validator::RecordValidator;

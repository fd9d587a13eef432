//! Application use cases. Orchestrate domain logic via ports.

pub mod bulk_delete;
pub mod chat_service;
pub mod classifier;
pub mod export_service;
pub mod serialized_source;
pub mod session_manager;
pub mod spam_analyzer;

pub use bulk_delete::{
    BatchHandle, BatchReport, BulkDeleteCoordinator, DeleteOutcome, DeleteState, PendingHandle,
    PendingSummary,
};
pub use chat_service::{ChatService, ChatSettings};
pub use classifier::classify;
pub use export_service::{DeletionLog, ExportService, read_id_list};
pub use serialized_source::SerializedSource;
pub use session_manager::{
    ConnectStatus, FixedSource, SessionManager, SessionState, SourceProvider, VerifyStatus,
};
pub use spam_analyzer::SpamAnalyzer;

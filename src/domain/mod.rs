//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod analysis;
pub mod categories;
pub mod entities;
pub mod errors;
pub mod records;
pub mod views;

pub use analysis::{SpamAnalysis, SpamBucket, SpamCounts};
pub use categories::{Category, CategorySet, CategoryStats, ExportCategory};
pub use entities::{
    AccountInfo, ConversationEntity, Credentials, EntityKind, Message, SignInResult,
};
pub use errors::DomainError;
pub use records::ChatRecord;
pub use views::{ChatViews, Origin};

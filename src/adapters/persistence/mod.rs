//! File-based persistence.

pub mod credentials_json;

pub use credentials_json::CredentialsJson;

//! Infrastructure adapters. Implement outbound ports and drive inbound ones.
//!
//! Telegram, in-memory mock, credential file, export formats, terminal menu
//! and HTTP API. Map errors to DomainError.

pub mod export;
pub mod http;
pub mod mock;
pub mod persistence;
pub mod telegram;
pub mod ui;

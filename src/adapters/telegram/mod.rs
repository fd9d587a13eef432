//! Telegram adapters (grammers).

pub mod auth_adapter;
pub mod client;
pub mod connector;
pub mod mapper;
pub mod session;

pub use auth_adapter::GrammersAuthAdapter;
pub use client::GrammersConversationSource;
pub use connector::GrammersConnector;

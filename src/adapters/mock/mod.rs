//! Mock adapters. In-memory Telegram stand-ins for demo mode and tests.

pub mod mock_auth;
pub mod mock_source;

pub use mock_auth::{MockAuth, MockConnector};
pub use mock_source::MockConversationSource;

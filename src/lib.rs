//! tg-sweep: classify Telegram chats, find spam and dead dialogs, bulk-delete
//! them with an undo window. Hexagonal layout: domain, ports, use cases, adapters.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;

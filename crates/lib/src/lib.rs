//! DashVite core library — the chat session controller shared by the CLI.
//!
//! Identity resolution, persisted-history reconciliation, the conversation
//! engine, jump-to-message anchors, and the session facade that the
//! presentation layer drives.

pub mod anchor;
pub mod backend;
pub mod config;
pub mod engine;
pub mod facade;
pub mod history;
pub mod identity;
pub mod session;
pub mod storage;

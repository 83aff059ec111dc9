//! External integrations module
//!
//! Provides the typed client for the upstream email hosting provider.
//!
//! Currently supported:
//! - Purelymail API (v0)

pub mod purelymail;

pub use purelymail::{PurelymailClient, PurelymailConfig, DEFAULT_BASE_URL};

// Linkauth — Library root
//
// Re-exports the store, messenger, gateway, CLI and configuration modules.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod messenger;
pub mod store;

pub use error::{LinkauthError, Result};

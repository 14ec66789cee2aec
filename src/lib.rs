//! Toolcrib - CI tool provisioning and workspace build caching
//!
//! Installs pinned, digest-verified developer tools into a CI job and runs
//! workspace builds between a cache restore and a cache save.

pub mod cache;
pub mod checksum;
pub mod ci;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod provision;
pub mod tool;
pub mod workspace;

pub use error::{ToolcribError, ToolcribResult};

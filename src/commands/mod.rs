//! CLI subcommand implementations for deputy.
//!
//! Commands operate on the durable store directly; none of them joins the
//! message bus except [`simulate`], which runs its own in-process origin.
//!
//! - [`status`] - Print the stored session
//! - [`cache`] - Inspect and maintain case page cache records
//! - [`session`] - Force-clear the stored session
//! - [`simulate`] - Multi-tab walkthrough against a memory store
//!
//! # Usage
//!
//! ```ignore
//! use deputy::commands;
//!
//! commands::status::run(&storage).await?;
//! commands::cache::prune(&storage, config.cache_retention()).await?;
//! ```

pub mod cache;
pub mod session;
pub mod simulate;
pub mod status;

/// The current version of deputy, derived from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # rtxconf - Yamaha RTX Configuration Manager
//!
//! `rtxconf` reads, models and writes the configuration of Yamaha RTX routers
//! over SSH. It pairs a bounded pool of interactive router sessions with a
//! parser that turns the router's hard-wrapped configuration dump into typed
//! records, and builders that turn those records back into command lines.
//!
//! ## Features
//!
//! - **Connection Pooling**: Bounded pool of SSH sessions with idle eviction and acquire timeouts
//! - **Privilege Tracking**: Administrator mode is entered once per connection and remembered
//! - **Wrap Repair**: Restores lines the terminal split at its column width
//! - **SFTP Retrieval**: Downloads the boot config file out of band, with `show config` as fallback
//! - **Context Tracking**: Separates `tunnel select` / `pp select` sections from global lines
//! - **Typed Entities**: Round-trip codecs for filters, DNS forwarding, tunnels and PP interfaces
//! - **Async/Await**: Built on Tokio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rtxconf::cache::ConfigCache;
//! use rtxconf::config::ManagerConfig;
//! use rtxconf::entity::{EntityKind, Registry};
//! use rtxconf::executor::SessionExecutor;
//! use rtxconf::source::{ConfigSource, SftpConfigSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ManagerConfig::from_json(
//!         r#"{"router": {"host": "192.168.1.1", "username": "admin", "password": "secret"}}"#,
//!     )?;
//!
//!     let executor = Arc::new(SessionExecutor::from_config(&config)?);
//!     let source = SftpConfigSource::from_config(executor.clone(), &config)?;
//!     let cache = ConfigCache::from_config(&config);
//!
//!     // Read every tunnel out of the running configuration
//!     let dump = cache.get_or_fetch(&source).await?;
//!     let registry = Registry::builtin();
//!     for record in registry.extract(EntityKind::Tunnel, dump.parsed())? {
//!         println!("{record:?}");
//!     }
//!
//!     // Write a filter back and force the next read to refetch
//!     let filters = registry.extract(EntityKind::IpFilter, dump.parsed())?;
//!     if let Some(filter) = filters.first() {
//!         let commands = registry.build(filter)?;
//!         executor.run_with_retry(&commands, true).await?;
//!         cache.mark_dirty(source.key());
//!     }
//!
//!     executor.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`pool::ConnectionPool`] - Bounded pool of router sessions
//! - [`executor::SessionExecutor`] - Runs command batches on pooled sessions
//! - [`parser::ParsedConfig`] - A configuration dump split into context blocks
//! - [`entity::Registry`] - Extractors and builders by entity kind
//! - [`cache::ConfigCache`] - Parsed dumps with a TTL
//! - [`source::SftpConfigSource`] - Bulk configuration retrieval over SFTP
//! - [`error`] - Transport and configuration error types

pub mod cache;
pub mod config;
pub mod device;
pub mod entity;
pub mod error;
pub mod executor;
pub mod parser;
pub mod pool;
pub mod retry;
pub mod session;
pub mod source;

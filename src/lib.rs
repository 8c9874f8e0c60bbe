//! # KV Shard Driver
//!
//! A sharded primary/replica client for Redis-compatible key-value stores.
//!
//! ## Features
//!
//! - **Consistent Hashing** - Weighted MurmurHash64A ring with hash-tag support
//! - **Primary/Replica Routing** - Writes go to the primary, reads optionally to a replica
//! - **Instance Pooling** - Bounded pool of shard client instances with validation and eviction
//! - **Async/Await** - Built on Tokio
//! - **RESP Protocol** - Built-in RESP2 connection implementation
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! kvshard-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use kvshard_driver::{DriverConfig, RespCommand, ShardedDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DriverConfig::from_group_spec(
//!         "m=redis://10.0.0.1:6379,s=[redis://10.0.0.2:6379];m=redis://10.0.0.3:6379",
//!     )?;
//!     let driver = ShardedDriver::connect(config).await?;
//!
//!     let reply = driver
//!         .write("user:42", |conn| {
//!             Box::pin(async move {
//!                 conn.command(RespCommand::new("SET").arg("user:42").arg("kim")).await
//!             })
//!         })
//!         .await?;
//!     println!("{:?}", reply);
//!
//!     driver.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Hash Tags
//!
//! Keys sharing a tag land on the same shard:
//!
//! ```rust
//! use kvshard_driver::KeyTag;
//!
//! let tag = KeyTag::Braces;
//! assert_eq!(tag.effective_key("user:{42}:name"), "42");
//! assert_eq!(tag.effective_key("plain"), "plain");
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use kvshard_driver::{DriverConfig, Endpoint, NodeGroupConfig, PoolConfig, ReplicaPolicy};
//! use std::time::Duration;
//!
//! let groups = vec![
//!     NodeGroupConfig::new("g0", Endpoint::new("10.0.0.1", 6379))
//!         .with_replica(Endpoint::new("10.0.0.2", 6379)),
//! ];
//! let config = DriverConfig::builder(groups)
//!     .with_read_from_replica(true)
//!     .with_replica_policy(ReplicaPolicy::RoundRobin)
//!     .with_pool_config(
//!         PoolConfig::builder()
//!             .max_total(16)
//!             .max_wait(Some(Duration::from_secs(2)))
//!             .build(),
//!     )
//!     .build();
//! assert!(config.read_from_replica);
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`ShardResult`]. Callback failures arrive as
//! [`ShardError::Execution`] carrying the role and endpoint of the connection used.
//!
//! ## Modules
//!
//! - [`driver`] - Routing, pooling, execution template and RESP connections
//! - [`resp`] - RESP2 values and codec
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod resp;

// Re-exports for convenience
pub use driver::{
    ShardedDriver, DriverConfig, DriverConfigBuilder, DriverMetrics, Endpoint,
    NodeGroupConfig, RoutingConfig, parse_group_spec,
    PoolConfig, PoolConfigBuilder, PoolMetrics, ShardPool, InstanceHandle,
    ExecutionTemplate, OperationKind,
    ShardError, ShardResult,
    Connection, Connector, ConnectionRole,
    KeyTag, MurmurHash, ReplicaPolicy, ReplicaSelector, Ring,
};

pub use driver::resp::{RespClient, RespConnector};
pub use resp::{RespCommand, RespError, RespValue};

/// Config alias for convenience
pub type Config = DriverConfig;

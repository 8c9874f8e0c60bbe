//! Driver Module
//!
//! 프라이머리/레플리카 샤딩 클라이언트
//!
//! # 구성
//!
//! - 라우팅: 일관성 해시 링, 해시 태그, 레플리카 선택 (`routing`)
//! - 인스턴스 풀: 모든 노드 그룹 연결을 묶은 인스턴스 풀링 (`ShardPool`)
//! - 실행 템플릿: 획득, 라우팅, 실행, 반환 (`ExecutionTemplate`)
//! - RESP 드라이버: 기본 연결 구현 (`resp`)
//!
//! # Example
//!
//! ```ignore
//! use kvshard_driver::driver::{DriverConfig, ShardedDriver};
//! use kvshard_driver::resp::RespCommand;
//!
//! let config = DriverConfig::builder(kvshard_driver::driver::parse_group_spec(
//!     "m=redis://10.0.0.1:6379,s=[redis://10.0.0.2:6379];m=redis://10.0.0.3:6379",
//! )?)
//! .with_read_from_replica(true)
//! .build();
//!
//! let driver = ShardedDriver::connect(config).await?;
//!
//! // 쓰기는 프라이머리로
//! driver
//!     .write("user:42", |conn| {
//!         Box::pin(async move { conn.command(RespCommand::new("SET").arg("user:42").arg("kim")).await })
//!     })
//!     .await?;
//!
//! // 읽기는 레플리카로
//! let name = driver
//!     .read("user:42", |conn| {
//!         Box::pin(async move { conn.command(RespCommand::new("GET").arg("user:42")).await })
//!     })
//!     .await?;
//!
//! driver.close().await;
//! ```
//!
//! # 그룹 명세
//!
//! ```
//! use kvshard_driver::driver::parse_group_spec;
//!
//! let groups = parse_group_spec("m=redis://a:6379,s=[redis://b:6379,redis://c:6379];m=redis://d:6379").unwrap();
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].replicas.len(), 2);
//! ```

pub mod resp;
pub mod routing;
mod config;
mod connection;
mod driver;
mod error;
mod pool;
mod template;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{parse_group_spec, NodeGroupConfig, RoutingConfig, DEFAULT_GROUP_PREFIX, DEFAULT_WEIGHT};
pub use connection::{Connection, ConnectionRole, Connector, PING_REPLY};
pub use driver::{DriverConfig, DriverConfigBuilder, DriverMetrics, Endpoint, ShardedDriver};
pub use error::{ShardError, ShardResult};
pub use pool::{InstanceHandle, PoolConfig, PoolConfigBuilder, PoolMetrics, ShardPool};
pub use routing::{
    Fnv1aHash, Hashing, KeyTag, MurmurHash, NodeGroup, ReplicaPolicy, ReplicaSelector, Ring,
    ShardClientInstance,
};
pub use template::{ExecutionTemplate, OperationKind};

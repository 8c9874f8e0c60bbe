//! 라우팅 모듈
//!
//! 키를 샤드로 매핑하는 일관성 해시 링과 노드 그룹 관리를 제공합니다.
//!
//! # 개요
//!
//! 각 노드 그룹은 가중치에 비례하는 가상 노드를 링에 배치합니다.
//! 키(또는 해시 태그)의 해시 이상인 첫 지점의 그룹이 키를 담당하며,
//! 끝을 넘어가면 첫 지점으로 돌아갑니다.
//!
//! # 예시
//!
//! ```ignore
//! use std::sync::Arc;
//! use kvshard_driver::driver::{Endpoint, NodeGroupConfig};
//! use kvshard_driver::driver::routing::{KeyTag, MurmurHash, Ring, DEFAULT_VIRTUAL_NODES};
//!
//! let groups = vec![
//!     NodeGroupConfig::new("g0", Endpoint::new("10.0.0.1", 6379)),
//!     NodeGroupConfig::new("g1", Endpoint::new("10.0.0.2", 6379)).with_weight(2),
//! ];
//! let ring = Ring::build(&groups, Arc::new(MurmurHash::default()), DEFAULT_VIRTUAL_NODES)?;
//!
//! // 같은 태그는 같은 샤드
//! assert_eq!(
//!     ring.resolve_key("user:{42}:name", &KeyTag::Braces),
//!     ring.resolve_key("user:{42}:mail", &KeyTag::Braces),
//! );
//! ```

mod group;
mod hash;
mod instance;
mod policy;
mod ring;
mod tag;

pub use group::NodeGroup;
pub use hash::{Fnv1aHash, Hashing, MurmurHash, DEFAULT_MURMUR_SEED};
pub use instance::ShardClientInstance;
pub use policy::{
    ConnectionCounter, LeastConnectionsSelector, RandomSelector, ReplicaPolicy, ReplicaSelector,
    RoundRobinSelector,
};
pub use ring::{Ring, DEFAULT_VIRTUAL_NODES};
pub use tag::{KeyTag, DEFAULT_TAG_PATTERN};

//! 샤드 그룹 설정
//!
//! 그룹 설정과 링 설정, 그리고 그룹 명세 문자열 파서

use std::sync::Arc;

use super::driver::Endpoint;
use super::error::{ShardError, ShardResult};
use super::routing::{Hashing, KeyTag, MurmurHash, DEFAULT_VIRTUAL_NODES};

/// 기본 그룹 가중치
pub const DEFAULT_WEIGHT: u32 = 1;

/// 명세 문자열에서 이름 없는 그룹에 붙는 접두사
pub const DEFAULT_GROUP_PREFIX: &str = "redis-group-";

const GROUP_SPEC_FORMAT: &str = "m=<primary-url>,s=[<replica-url>,<replica-url>];m=<primary-url>";

// ============================================================================
// NodeGroupConfig - 그룹 설정
// ============================================================================

/// 노드 그룹 설정
///
/// 샤드 하나에 해당하는 프라이머리 한 개와 순서 있는 레플리카 목록입니다.
///
/// # 예시
///
/// ```rust
/// use kvshard_driver::driver::{Endpoint, NodeGroupConfig};
///
/// let group = NodeGroupConfig::new("users-0", Endpoint::new("10.0.0.1", 6379))
///     .with_replica(Endpoint::new("10.0.0.2", 6379))
///     .with_weight(2);
///
/// assert_eq!(group.replicas.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroupConfig {
    /// 샤드 식별자 (링 위의 노드 이름, 유일해야 함)
    pub shard_id: String,
    /// 가중치
    pub weight: u32,
    /// 프라이머리 엔드포인트
    pub primary: Endpoint,
    /// 레플리카 엔드포인트 (순서 유지)
    pub replicas: Vec<Endpoint>,
}

impl NodeGroupConfig {
    /// 새 그룹 설정 생성 (가중치 1, 레플리카 없음)
    pub fn new(shard_id: impl Into<String>, primary: Endpoint) -> Self {
        Self {
            shard_id: shard_id.into(),
            weight: DEFAULT_WEIGHT,
            primary,
            replicas: Vec::new(),
        }
    }

    /// 가중치 설정
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// 레플리카 추가
    pub fn with_replica(mut self, endpoint: Endpoint) -> Self {
        self.replicas.push(endpoint);
        self
    }

    /// 레플리카 목록 설정
    pub fn with_replicas(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.replicas = endpoints;
        self
    }

    /// 프라이머리부터 모든 엔드포인트
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }

    /// 설정 검증
    pub fn validate(&self) -> ShardResult<()> {
        if self.shard_id.trim().is_empty() {
            return Err(ShardError::configuration("Shard id must not be empty"));
        }
        if self.weight == 0 {
            return Err(ShardError::configuration(format!(
                "Weight of shard '{}' must be positive",
                self.shard_id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// RoutingConfig - 링 설정
// ============================================================================

/// 링 구성 설정
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// 해시 함수
    pub hashing: Arc<dyn Hashing>,
    /// 가중치 1당 가상 노드 수
    pub virtual_nodes_per_weight: usize,
    /// 해시 태그 추출
    pub key_tag: KeyTag,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            hashing: Arc::new(MurmurHash::default()),
            virtual_nodes_per_weight: DEFAULT_VIRTUAL_NODES,
            key_tag: KeyTag::None,
        }
    }
}

// ============================================================================
// 그룹 명세 파서
// ============================================================================

/// 그룹 명세 문자열 파싱
///
/// 형식: `m=<primary-url>,s=[<replica-url>,...];m=<primary-url>`
///
/// 그룹 이름은 등장 순서대로 `redis-group-0`, `redis-group-1`, ... 이 됩니다.
/// 레플리카 부분은 생략할 수 있습니다.
///
/// ```rust
/// use kvshard_driver::driver::parse_group_spec;
///
/// let groups = parse_group_spec(
///     "m=redis://10.0.0.1:7000/1,s=[redis://10.0.0.2:7010/1];m=redis://10.0.0.3:7000",
/// ).unwrap();
///
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].shard_id, "redis-group-0");
/// assert_eq!(groups[0].replicas.len(), 1);
/// assert!(groups[1].replicas.is_empty());
/// ```
pub fn parse_group_spec(spec: &str) -> ShardResult<Vec<NodeGroupConfig>> {
    if spec.trim().is_empty() {
        return Err(ShardError::configuration("Group spec must not be empty"));
    }

    let mut groups = Vec::new();

    for segment in spec.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let group = parse_group_segment(segment, groups.len()).map_err(|e| {
            ShardError::configuration(format!(
                "Failed to parse group spec '{}' (expected '{}'): {}",
                spec, GROUP_SPEC_FORMAT, e
            ))
        })?;
        groups.push(group);
    }

    if groups.is_empty() {
        return Err(ShardError::configuration("Group spec contains no groups"));
    }

    Ok(groups)
}

fn parse_group_segment(segment: &str, index: usize) -> ShardResult<NodeGroupConfig> {
    let (primary_part, replica_part) = match segment.find(',') {
        Some(pos) => (&segment[..pos], Some(segment[pos + 1..].trim())),
        None => (segment, None),
    };

    let primary_url = strip_key(primary_part.trim(), "m")?;
    let mut group = NodeGroupConfig::new(
        format!("{}{}", DEFAULT_GROUP_PREFIX, index),
        Endpoint::from_uri(primary_url)?,
    );

    if let Some(replica_part) = replica_part {
        let list = strip_key(replica_part, "s")?;
        let inner = list
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ShardError::configuration("Replica list must be enclosed in [...]"))?;

        for url in inner.split(',').map(str::trim).filter(|u| !u.is_empty()) {
            group.replicas.push(Endpoint::from_uri(url)?);
        }
    }

    Ok(group)
}

fn strip_key<'a>(part: &'a str, key: &str) -> ShardResult<&'a str> {
    part.split_once('=')
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .ok_or_else(|| ShardError::configuration(format!("Expected '{}=' in '{}'", key, part)))
}

// ============================================================================
// Tests
// ============================================================================

//! 일관 해시 링
//!
//! 샤드 설정 목록으로 한 번 만들어지고 이후 변경되지 않습니다.
//! 샤드 추가/제거는 새 링(새 풀)을 만드는 것으로 처리합니다.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::super::config::NodeGroupConfig;
use super::super::error::{ShardError, ShardResult};
use super::hash::Hashing;
use super::tag::KeyTag;

/// 가중치 1당 기본 가상 노드 수
pub const DEFAULT_VIRTUAL_NODES: usize = 160;

/// 일관 해시 링
///
/// 가상 노드 해시값(부호 있는 64비트) → 샤드 인덱스의 정렬된 맵입니다.
/// 동일한 링과 키에 대해 `resolve` 결과는 항상 같습니다.
pub struct Ring {
    /// 가상 노드 위치
    points: BTreeMap<i64, usize>,
    /// 설정 순서대로의 샤드 식별자
    shard_ids: Vec<String>,
    /// 해시 함수
    hashing: Arc<dyn Hashing>,
    /// 가중치 1당 가상 노드 수
    virtual_nodes_per_weight: usize,
}

impl Ring {
    /// 링 생성
    ///
    /// 샤드 `s`(가중치 `w`)의 `n`번째 가상 노드는 `"{s}*{w}{n}"`의 해시에 놓입니다.
    /// 해시가 충돌하면 나중 노드가 앞선 노드를 덮어씁니다.
    pub fn build(
        configs: &[NodeGroupConfig],
        hashing: Arc<dyn Hashing>,
        virtual_nodes_per_weight: usize,
    ) -> ShardResult<Self> {
        if configs.is_empty() {
            return Err(ShardError::configuration("At least one node group is required"));
        }
        if virtual_nodes_per_weight == 0 {
            return Err(ShardError::configuration(
                "Virtual nodes per weight must be positive",
            ));
        }

        let mut seen = HashSet::with_capacity(configs.len());
        let mut counts = Vec::with_capacity(configs.len());
        for config in configs {
            config.validate()?;
            if !seen.insert(config.shard_id.as_str()) {
                return Err(ShardError::configuration(format!(
                    "Duplicate shard id: {}",
                    config.shard_id
                )));
            }
            let count = (config.weight as usize)
                .checked_mul(virtual_nodes_per_weight)
                .ok_or_else(|| {
                    ShardError::configuration(format!(
                        "Virtual node count overflows for shard '{}' (weight {})",
                        config.shard_id, config.weight
                    ))
                })?;
            counts.push(count);
        }

        let mut points = BTreeMap::new();
        for (index, (config, count)) in configs.iter().zip(counts).enumerate() {
            for n in 0..count {
                let point = format!("{}*{}{}", config.shard_id, config.weight, n);
                points.insert(hashing.hash_str(&point), index);
            }
        }

        Ok(Self {
            points,
            shard_ids: configs.iter().map(|c| c.shard_id.clone()).collect(),
            hashing,
            virtual_nodes_per_weight,
        })
    }

    /// 유효 키를 샤드 식별자로 변환
    ///
    /// 해시값 이상인 첫 가상 노드를 고르고, 없으면 링의 처음으로 돌아갑니다.
    pub fn resolve(&self, effective_key: &str) -> &str {
        let h = self.hashing.hash_str(effective_key);
        let index = self
            .points
            .range(h..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, index)| *index)
            .unwrap_or(0);
        &self.shard_ids[index]
    }

    /// 태그 추출 후 샤드 식별자로 변환
    pub fn resolve_key(&self, key: &str, key_tag: &KeyTag) -> &str {
        self.resolve(key_tag.effective_key(key))
    }

    /// 가상 노드 수
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 가상 노드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 샤드 식별자 목록 (설정 순서)
    pub fn shard_ids(&self) -> &[String] {
        &self.shard_ids
    }

    /// 가중치 1당 가상 노드 수
    pub fn virtual_nodes_per_weight(&self) -> usize {
        self.virtual_nodes_per_weight
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("shards", &self.shard_ids)
            .field("points", &self.points.len())
            .field("hashing", &self.hashing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::driver::driver::Endpoint;
    use crate::driver::routing::{Fnv1aHash, MurmurHash};

    fn group(id: &str, weight: u32) -> NodeGroupConfig {
        NodeGroupConfig::new(id, Endpoint::new(id, 6379)).with_weight(weight)
    }

    fn murmur_ring(configs: &[NodeGroupConfig]) -> Ring {
        Ring::build(configs, Arc::new(MurmurHash::default()), DEFAULT_VIRTUAL_NODES).unwrap()
    }

    #[test]
    fn test_ring_point_count() {
        let ring = murmur_ring(&[group("a", 1), group("b", 2)]);
        // 충돌이 없으면 가중치 합 × 160
        assert_eq!(ring.len(), 3 * DEFAULT_VIRTUAL_NODES);
        assert_eq!(ring.shard_ids(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_ring_deterministic() {
        let configs = [group("g0", 1), group("g1", 1), group("g2", 1)];
        let first = murmur_ring(&configs);
        let second = murmur_ring(&configs);

        for i in 0..500 {
            let key = format!("key:{}", i);
            assert_eq!(first.resolve(&key), first.resolve(&key));
            assert_eq!(first.resolve(&key), second.resolve(&key));
        }
    }

    #[test]
    fn test_ring_known_placement() {
        let ring = murmur_ring(&[group("g0", 1), group("g1", 1), group("g2", 1)]);
        assert_eq!(ring.resolve("user:1"), "g2");
        assert_eq!(ring.resolve("42"), "g1");
    }

    #[test]
    fn test_ring_single_shard() {
        let ring = murmur_ring(&[group("only", 1)]);
        assert_eq!(ring.resolve("anything"), "only");
        assert_eq!(ring.resolve(""), "only");
    }

    #[test]
    fn test_ring_weighted_distribution() {
        let ring = murmur_ring(&[group("shard-a", 1), group("shard-b", 2), group("shard-c", 1)]);
        let total = 20_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for i in 0..total {
            *counts.entry(ring.resolve(&format!("key:{}", i)).to_string()).or_insert(0) += 1;
        }

        let share = |id: &str| counts.get(id).copied().unwrap_or(0) as f64 / total as f64;
        assert!((share("shard-a") - 0.25).abs() < 0.05);
        assert!((share("shard-b") - 0.50).abs() < 0.05);
        assert!((share("shard-c") - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_ring_tag_colocation() {
        let ring = murmur_ring(&[group("g0", 1), group("g1", 1), group("g2", 1), group("g3", 1)]);
        let tag = KeyTag::Braces;

        let shard = ring.resolve_key("user:{1001}:profile", &tag);
        for suffix in ["orders", "cart", "sessions", "likes"] {
            let key = format!("user:{{1001}}:{}", suffix);
            assert_eq!(ring.resolve_key(&key, &tag), shard);
        }
        assert_eq!(ring.resolve("1001"), shard);
    }

    #[test]
    fn test_ring_alternative_hash() {
        let ring = Ring::build(&[group("a", 1), group("b", 1)], Arc::new(Fnv1aHash), 16).unwrap();
        assert_eq!(ring.virtual_nodes_per_weight(), 16);
        let shard = ring.resolve("k");
        assert!(shard == "a" || shard == "b");
    }

    #[test]
    fn test_ring_build_errors() {
        let murmur: Arc<dyn Hashing> = Arc::new(MurmurHash::default());

        assert!(matches!(
            Ring::build(&[], murmur.clone(), DEFAULT_VIRTUAL_NODES),
            Err(ShardError::Configuration(_))
        ));
        assert!(Ring::build(&[group("a", 1), group("a", 2)], murmur.clone(), 160).is_err());
        assert!(Ring::build(&[group("a", 0)], murmur.clone(), 160).is_err());
        assert!(Ring::build(&[group("", 1)], murmur.clone(), 160).is_err());
        assert!(Ring::build(&[group("a", 1)], murmur, 0).is_err());
    }

    #[test]
    fn test_ring_virtual_node_overflow() {
        let murmur: Arc<dyn Hashing> = Arc::new(MurmurHash::default());
        assert!(matches!(
            Ring::build(&[group("a", 2)], murmur, usize::MAX),
            Err(ShardError::Configuration(_))
        ));
    }
}

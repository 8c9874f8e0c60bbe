//! 샤드 클라이언트 인스턴스
//!
//! 링과 모든 노드 그룹을 묶은 풀링 단위입니다. 획득부터 반환까지
//! 한 호출자만 사용합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::super::config::NodeGroupConfig;
use super::super::connection::{Connection, Connector, PING_REPLY};
use super::super::error::{ShardError, ShardResult};
use super::group::NodeGroup;
use super::ring::Ring;
use super::tag::KeyTag;

/// 샤드 클라이언트 인스턴스
pub struct ShardClientInstance<C> {
    /// 인스턴스 ID (풀 내 유일)
    id: u64,
    /// 링 (풀 내 인스턴스끼리 공유)
    ring: Arc<Ring>,
    /// 해시 태그 추출
    key_tag: Arc<KeyTag>,
    /// 샤드 식별자 → 그룹
    groups: HashMap<String, NodeGroup<C>>,
    /// 생성 시간
    created_at: Instant,
    /// 마지막 사용 시간
    last_used: Instant,
}

impl<C: Connection> ShardClientInstance<C> {
    /// 모든 그룹을 열어 인스턴스 생성
    ///
    /// 그룹 하나라도 실패하면 이미 연 그룹을 모두 닫고 실패합니다.
    pub async fn open<K>(
        id: u64,
        connector: &K,
        configs: &[NodeGroupConfig],
        ring: Arc<Ring>,
        key_tag: Arc<KeyTag>,
    ) -> ShardResult<Self>
    where
        K: Connector<Connection = C>,
    {
        let mut groups: HashMap<String, NodeGroup<C>> = HashMap::with_capacity(configs.len());

        for config in configs {
            match NodeGroup::open(connector, config).await {
                Ok(group) => {
                    groups.insert(config.shard_id.clone(), group);
                }
                Err(e) => {
                    for group in groups.values_mut() {
                        group.disconnect_all().await;
                    }
                    return Err(e);
                }
            }
        }

        let now = Instant::now();
        Ok(Self {
            id,
            ring,
            key_tag,
            groups,
            created_at: now,
            last_used: now,
        })
    }

    /// 인스턴스 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 링
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// 키가 속한 샤드 식별자
    pub fn shard_for_key(&self, key: &str) -> &str {
        self.ring.resolve_key(key, &self.key_tag)
    }

    /// 샤드 식별자로 그룹 조회
    pub fn group(&self, shard_id: &str) -> Option<&NodeGroup<C>> {
        self.groups.get(shard_id)
    }

    /// 키가 속한 그룹 (가변)
    pub fn group_for_key_mut(&mut self, key: &str) -> ShardResult<&mut NodeGroup<C>> {
        let shard_id = self.ring.resolve_key(key, &self.key_tag);
        self.groups.get_mut(shard_id).ok_or_else(|| {
            ShardError::internal(format!("Ring resolved unknown shard '{}'", shard_id))
        })
    }

    /// 모든 그룹
    pub fn groups(&self) -> impl Iterator<Item = &NodeGroup<C>> {
        self.groups.values()
    }

    /// 그룹 수
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 프라이머리 중 하나라도 깨졌는지 여부 (레플리카는 보지 않음)
    pub fn has_broken_primary(&self) -> bool {
        self.groups.values().any(|g| g.primary().is_broken())
    }

    /// 모든 프라이머리에 PING
    ///
    /// 응답이 `PONG`이 아니거나 실패하면 검증 에러.
    pub async fn ping_primaries(&mut self) -> ShardResult<()> {
        for group in self.groups.values_mut() {
            let shard_id = group.shard_id().to_string();
            let primary = group.primary_mut();
            let reply = primary.ping().await.map_err(|e| {
                ShardError::validation(format!(
                    "Ping to primary {} of group '{}' failed: {}",
                    primary.endpoint(),
                    shard_id,
                    e
                ))
            })?;
            if reply != PING_REPLY {
                return Err(ShardError::validation(format!(
                    "Unexpected ping reply from primary {} of group '{}': {}",
                    primary.endpoint(),
                    shard_id,
                    reply
                )));
            }
        }
        Ok(())
    }

    /// 모든 그룹의 모든 연결 닫기 (실패는 무시)
    pub async fn disconnect_all(&mut self) {
        for group in self.groups.values_mut() {
            group.disconnect_all().await;
        }
    }

    /// 생성 시간
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// 마지막 사용 시간
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// 생성 후 경과 시간
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// 마지막 사용 후 경과 시간
    pub fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// 사용 시간 갱신
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }
}

impl<C> fmt::Debug for ShardClientInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardClientInstance")
            .field("id", &self.id)
            .field("groups", &self.groups.len())
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::driver::Endpoint;
    use crate::driver::routing::{MurmurHash, DEFAULT_VIRTUAL_NODES};
    use crate::driver::testing::MockConnector;

    fn configs() -> Vec<NodeGroupConfig> {
        vec![
            NodeGroupConfig::new("g0", Endpoint::new("p0", 6379))
                .with_replica(Endpoint::new("r0", 6379)),
            NodeGroupConfig::new("g1", Endpoint::new("p1", 6379))
                .with_replica(Endpoint::new("r1", 6379)),
        ]
    }

    async fn open(connector: &MockConnector) -> ShardResult<ShardClientInstance<crate::driver::testing::MockConnection>> {
        let configs = configs();
        let ring = Ring::build(&configs, Arc::new(MurmurHash::default()), DEFAULT_VIRTUAL_NODES)?;
        ShardClientInstance::open(1, connector, &configs, Arc::new(ring), Arc::new(KeyTag::Braces)).await
    }

    #[tokio::test]
    async fn test_instance_routes_to_ring_shard() {
        let connector = MockConnector::new();
        let mut instance = open(&connector).await.unwrap();

        assert_eq!(instance.group_count(), 2);
        let shard = instance.shard_for_key("user:{7}:a").to_string();
        assert_eq!(instance.shard_for_key("user:{7}:b"), shard);

        let group = instance.group_for_key_mut("user:{7}:a").unwrap();
        assert_eq!(group.shard_id(), shard);
    }

    #[tokio::test]
    async fn test_instance_open_closes_opened_groups_on_failure() {
        let connector = MockConnector::new();
        connector.fail_open(Endpoint::new("p1", 6379));

        assert!(open(&connector).await.is_err());
        // g0 의 두 연결이 닫힘
        assert_eq!(connector.disconnect_count(), 2);
    }

    #[tokio::test]
    async fn test_broken_primary_only() {
        let connector = MockConnector::new();
        let instance = open(&connector).await.unwrap();
        assert!(!instance.has_broken_primary());

        connector.set_broken(Endpoint::new("r0", 6379), true);
        assert!(!instance.has_broken_primary());

        connector.set_broken(Endpoint::new("p1", 6379), true);
        assert!(instance.has_broken_primary());
    }

    #[tokio::test]
    async fn test_ping_primaries() {
        let connector = MockConnector::new();
        let mut instance = open(&connector).await.unwrap();
        assert!(instance.ping_primaries().await.is_ok());

        // 레플리카 응답은 보지 않음
        connector.set_ping_reply(Endpoint::new("r1", 6379), "LOADING");
        assert!(instance.ping_primaries().await.is_ok());

        connector.set_ping_reply(Endpoint::new("p0", 6379), "LOADING");
        assert!(matches!(
            instance.ping_primaries().await,
            Err(ShardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let connector = MockConnector::new();
        let mut instance = open(&connector).await.unwrap();
        instance.disconnect_all().await;
        assert_eq!(connector.disconnect_count(), 4);
    }
}

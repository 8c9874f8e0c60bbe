//! 노드 그룹
//!
//! 샤드 하나의 열린 연결: 프라이머리 한 개와 레플리카 목록.

use std::fmt;

use super::super::config::NodeGroupConfig;
use super::super::connection::{Connection, ConnectionRole, Connector};
use super::super::driver::Endpoint;
use super::super::error::{ShardError, ShardResult};

/// 열린 노드 그룹
///
/// 재시도나 장애 조치는 하지 않는 순수 접근자입니다.
pub struct NodeGroup<C> {
    /// 샤드 식별자
    shard_id: String,
    /// 프라이머리 연결
    primary: C,
    /// 레플리카 연결 (설정 순서)
    replicas: Vec<C>,
    /// 레플리카 엔드포인트 (선택기 입력)
    replica_endpoints: Vec<Endpoint>,
}

impl<C: Connection> NodeGroup<C> {
    /// 그룹의 모든 연결 열기
    ///
    /// 하나라도 실패하면 이미 연 연결을 모두 닫고 에러를 돌려줍니다.
    /// 일부만 열린 그룹은 만들어지지 않습니다.
    pub async fn open<K>(connector: &K, config: &NodeGroupConfig) -> ShardResult<Self>
    where
        K: Connector<Connection = C>,
    {
        let primary = connector
            .open(&config.primary)
            .await
            .map_err(|e| open_error(config, ConnectionRole::Primary, &config.primary, e))?;

        let mut group = Self {
            shard_id: config.shard_id.clone(),
            primary,
            replicas: Vec::with_capacity(config.replicas.len()),
            replica_endpoints: Vec::with_capacity(config.replicas.len()),
        };

        for endpoint in &config.replicas {
            match connector.open(endpoint).await {
                Ok(conn) => {
                    group.replicas.push(conn);
                    group.replica_endpoints.push(endpoint.clone());
                }
                Err(e) => {
                    group.disconnect_all().await;
                    return Err(open_error(config, ConnectionRole::Replica, endpoint, e));
                }
            }
        }

        Ok(group)
    }

    /// 샤드 식별자
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// 프라이머리 연결
    pub fn primary(&self) -> &C {
        &self.primary
    }

    /// 프라이머리 연결 (가변)
    pub fn primary_mut(&mut self) -> &mut C {
        &mut self.primary
    }

    /// 레플리카 연결 목록
    pub fn replicas(&self) -> &[C] {
        &self.replicas
    }

    /// 레플리카 연결 (가변)
    pub fn replica_mut(&mut self, index: usize) -> Option<&mut C> {
        self.replicas.get_mut(index)
    }

    /// 레플리카 엔드포인트 목록
    pub fn replica_endpoints(&self) -> &[Endpoint] {
        &self.replica_endpoints
    }

    /// 레플리카 존재 여부
    pub fn has_replicas(&self) -> bool {
        !self.replicas.is_empty()
    }

    /// 모든 연결 닫기
    ///
    /// 개별 연결의 종료 실패는 기록만 하고 계속 진행합니다.
    pub async fn disconnect_all(&mut self) {
        if let Err(e) = self.primary.disconnect().await {
            tracing::warn!(
                shard = %self.shard_id,
                endpoint = %self.primary.endpoint(),
                "Failed to disconnect primary: {}",
                e
            );
        }

        for replica in &mut self.replicas {
            if let Err(e) = replica.disconnect().await {
                tracing::warn!(
                    shard = %self.shard_id,
                    endpoint = %replica.endpoint(),
                    "Failed to disconnect replica: {}",
                    e
                );
            }
        }
    }
}

fn open_error(
    config: &NodeGroupConfig,
    role: ConnectionRole,
    endpoint: &Endpoint,
    source: ShardError,
) -> ShardError {
    ShardError::configuration(format!(
        "Failed to open {} {} of group '{}': {}",
        role, endpoint, config.shard_id, source
    ))
}

impl<C> fmt::Debug for NodeGroup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGroup")
            .field("shard_id", &self.shard_id)
            .field("replicas", &self.replica_endpoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::MockConnector;

    fn config() -> NodeGroupConfig {
        NodeGroupConfig::new("g0", Endpoint::new("primary", 6379))
            .with_replica(Endpoint::new("replica1", 6379))
            .with_replica(Endpoint::new("replica2", 6379))
    }

    #[tokio::test]
    async fn test_open_group() {
        let connector = MockConnector::new();
        let mut group = NodeGroup::open(&connector, &config()).await.unwrap();

        assert_eq!(group.shard_id(), "g0");
        assert_eq!(group.primary().endpoint().host, "primary");
        assert_eq!(group.replicas().len(), 2);
        assert_eq!(group.replica_endpoints()[1].host, "replica2");
        assert!(group.has_replicas());
        assert!(group.replica_mut(2).is_none());
        assert_eq!(connector.open_count(), 3);

        group.disconnect_all().await;
        assert_eq!(connector.disconnect_count(), 3);
    }

    #[tokio::test]
    async fn test_open_group_is_atomic() {
        let connector = MockConnector::new();
        connector.fail_open(Endpoint::new("replica2", 6379));

        let err = NodeGroup::open(&connector, &config()).await.unwrap_err();
        assert!(matches!(err, ShardError::Configuration(_)));
        assert!(err.to_string().contains("replica2:6379"));

        // 먼저 열린 프라이머리와 replica1은 닫힘
        let closed: Vec<String> = connector.disconnected().into_iter().map(|e| e.host).collect();
        assert_eq!(closed, vec!["primary".to_string(), "replica1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_group_primary_failure() {
        let connector = MockConnector::new();
        connector.fail_open(Endpoint::new("primary", 6379));

        assert!(NodeGroup::open(&connector, &config()).await.is_err());
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_all_swallows_errors() {
        let connector = MockConnector::new();
        let mut group = NodeGroup::open(&connector, &config()).await.unwrap();

        connector.fail_disconnect(true);
        group.disconnect_all().await;
        assert_eq!(connector.disconnect_count(), 3);
    }
}

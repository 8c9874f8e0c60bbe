//! 샤딩 드라이버
//!
//! 드라이버 인스턴스 및 설정

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::config::{parse_group_spec, NodeGroupConfig, RoutingConfig};
use super::connection::Connector;
use super::error::{ShardError, ShardResult};
use super::pool::{InstanceHandle, PoolConfig, ShardPool};
use super::resp::{RespConnector, DEFAULT_PORT};
use super::routing::{Hashing, KeyTag, ReplicaPolicy, ReplicaSelector};
use super::template::{ExecutionTemplate, OperationKind};

// ============================================================================
// Endpoint - 서버 주소
// ============================================================================

/// 서버 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
    /// 논리 데이터베이스 번호
    pub database: Option<u32>,
}

impl Endpoint {
    /// 새 엔드포인트 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            database: None,
        }
    }

    /// 데이터베이스 번호 지정
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = Some(database);
        self
    }

    /// URI에서 파싱
    ///
    /// `redis://host:port/db` 형식. 스킴, 포트(기본 6379), 데이터베이스는 생략 가능.
    pub fn from_uri(uri: &str) -> ShardResult<Self> {
        let rest = uri.trim();
        let rest = rest.strip_prefix("redis://").unwrap_or(rest);

        let (address, database) = match rest.split_once('/') {
            Some((address, db)) if !db.is_empty() => {
                let db = db.parse().map_err(|_| {
                    ShardError::configuration(format!("Invalid database in '{}'", uri))
                })?;
                (address, Some(db))
            }
            Some((address, _)) => (address, None),
            None => (rest, None),
        };

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| ShardError::configuration(format!("Invalid port in '{}'", uri)))?;
                (host, port)
            }
            None => (address, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ShardError::configuration(format!("Missing host in '{}'", uri)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            database,
        })
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// DriverConfig - 드라이버 설정
// ============================================================================

/// 드라이버 설정
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 노드 그룹 (순서 유지)
    pub groups: Vec<NodeGroupConfig>,
    /// 링 설정
    pub routing: RoutingConfig,
    /// 읽기를 레플리카로 보낼지 여부
    pub read_from_replica: bool,
    /// 레플리카 선택 정책
    pub replica_policy: ReplicaPolicy,
    /// 풀 설정
    pub pool: PoolConfig,
    /// 유지보수 주기 (`None`이면 실행하지 않음)
    pub maintenance_interval: Option<Duration>,
}

impl DriverConfig {
    /// 새 설정 생성
    pub fn new(groups: Vec<NodeGroupConfig>) -> Self {
        Self {
            groups,
            routing: RoutingConfig::default(),
            read_from_replica: false,
            replica_policy: ReplicaPolicy::default(),
            pool: PoolConfig::default(),
            maintenance_interval: Some(Duration::from_secs(30)),
        }
    }

    /// 그룹 명세 문자열로 설정 생성
    pub fn from_group_spec(spec: &str) -> ShardResult<Self> {
        Ok(Self::new(parse_group_spec(spec)?))
    }

    /// 빌더 시작
    pub fn builder(groups: Vec<NodeGroupConfig>) -> DriverConfigBuilder {
        DriverConfigBuilder {
            config: Self::new(groups),
        }
    }
}

// ============================================================================
// DriverConfigBuilder - 설정 빌더
// ============================================================================

/// 드라이버 설정 빌더
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// 해시 함수 설정
    pub fn with_hashing(mut self, hashing: Arc<dyn Hashing>) -> Self {
        self.config.routing.hashing = hashing;
        self
    }

    /// 가중치 1당 가상 노드 수 설정
    pub fn with_virtual_nodes(mut self, count: usize) -> Self {
        self.config.routing.virtual_nodes_per_weight = count;
        self
    }

    /// 해시 태그 설정
    pub fn with_key_tag(mut self, key_tag: KeyTag) -> Self {
        self.config.routing.key_tag = key_tag;
        self
    }

    /// 레플리카 읽기 설정
    pub fn with_read_from_replica(mut self, enabled: bool) -> Self {
        self.config.read_from_replica = enabled;
        self
    }

    /// 레플리카 선택 정책 설정
    pub fn with_replica_policy(mut self, policy: ReplicaPolicy) -> Self {
        self.config.replica_policy = policy;
        self
    }

    /// 풀 설정
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// 유지보수 주기 설정
    pub fn with_maintenance_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.maintenance_interval = interval;
        self
    }

    /// 빌드
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

// ============================================================================
// ShardedDriver - 드라이버
// ============================================================================

/// 샤딩 드라이버
///
/// 풀과 실행 템플릿을 묶은 진입점입니다.
///
/// ```rust,ignore
/// let config = DriverConfig::from_group_spec("m=redis://10.0.0.1:6379,s=[redis://10.0.0.2:6379]")?;
/// let driver = ShardedDriver::connect(config).await?;
///
/// let reply = driver
///     .write("user:42", |conn| {
///         Box::pin(async move { conn.command(RespCommand::new("SET").arg("user:42").arg("kim")).await })
///     })
///     .await?;
/// ```
pub struct ShardedDriver<K: Connector = RespConnector> {
    /// 실행 템플릿 (풀 포함)
    template: ExecutionTemplate<K>,
    /// 유지보수 태스크
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl ShardedDriver<RespConnector> {
    /// 기본 RESP 드라이버로 생성
    pub async fn connect(config: DriverConfig) -> ShardResult<Self> {
        Self::with_connector(RespConnector::default(), config).await
    }
}

impl<K: Connector> ShardedDriver<K> {
    /// 지정 드라이버로 생성
    ///
    /// 설정에 따라 워밍업하고 유지보수 태스크를 시작합니다.
    pub async fn with_connector(connector: K, config: DriverConfig) -> ShardResult<Self> {
        let selector: Arc<dyn ReplicaSelector> = config.replica_policy.selector();
        let pool = Arc::new(ShardPool::new(
            connector,
            config.groups,
            config.routing,
            config.pool,
        )?);

        if let Some(warmed) = pool.warmup_if_enabled().await? {
            tracing::debug!(warmed, "Warmed up shard client instances");
        }

        let maintenance = config
            .maintenance_interval
            .map(|period| pool.spawn_maintenance(period));

        Ok(Self {
            template: ExecutionTemplate::new(pool, selector, config.read_from_replica),
            maintenance: Mutex::new(maintenance),
        })
    }

    /// 키에 대한 작업 실행
    pub async fn execute<R, F>(&self, key: &str, kind: OperationKind, callback: F) -> ShardResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut K::Connection) -> BoxFuture<'c, ShardResult<R>> + Send,
    {
        self.template.execute(key, kind, callback).await
    }

    /// 읽기 작업 실행
    pub async fn read<R, F>(&self, key: &str, callback: F) -> ShardResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut K::Connection) -> BoxFuture<'c, ShardResult<R>> + Send,
    {
        self.execute(key, OperationKind::Read, callback).await
    }

    /// 쓰기 작업 실행
    pub async fn write<R, F>(&self, key: &str, callback: F) -> ShardResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut K::Connection) -> BoxFuture<'c, ShardResult<R>> + Send,
    {
        self.execute(key, OperationKind::Write, callback).await
    }

    /// 키가 속한 샤드 식별자
    pub fn shard_for_key(&self, key: &str) -> &str {
        self.template.pool().shard_for_key(key)
    }

    /// 풀 밖 독립 인스턴스 생성
    ///
    /// 반환 시 모든 연결이 닫힙니다.
    pub async fn connect_standalone(&self) -> ShardResult<InstanceHandle<K>> {
        self.ensure_open()?;
        self.template.pool().create_standalone().await
    }

    /// 인스턴스 워밍업
    pub async fn warmup(&self, count: usize) -> ShardResult<usize> {
        self.template.pool().warmup(count).await
    }

    /// 인스턴스 풀
    pub fn pool(&self) -> &Arc<ShardPool<K>> {
        self.template.pool()
    }

    /// 열린 상태
    pub fn is_open(&self) -> bool {
        self.template.pool().is_open()
    }

    /// 드라이버 종료
    pub async fn close(&self) {
        if let Some(task) = self.maintenance.lock().take() {
            task.abort();
        }
        self.template.pool().close().await;
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> DriverMetrics {
        let pool_metrics = self.template.pool().metrics();
        DriverMetrics {
            pool_size: pool_metrics.size,
            idle_instances: pool_metrics.idle,
            in_use_instances: pool_metrics.in_use,
            total_acquisitions: pool_metrics.total_acquisitions,
            total_instances_created: pool_metrics.total_created,
            total_instances_destroyed: pool_metrics.total_destroyed,
            total_timeouts: pool_metrics.total_timeouts,
        }
    }

    fn ensure_open(&self) -> ShardResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ShardError::pool("Driver is closed"))
        }
    }
}

impl<K: Connector> fmt::Debug for ShardedDriver<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedDriver")
            .field("shards", &self.template.pool().ring().shard_ids())
            .field("read_from_replica", &self.template.read_from_replica())
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// DriverMetrics - 드라이버 메트릭
// ============================================================================

/// 드라이버 메트릭
#[derive(Debug, Clone, Default)]
pub struct DriverMetrics {
    /// 현재 풀 크기
    pub pool_size: usize,
    /// 유휴 인스턴스 수
    pub idle_instances: usize,
    /// 사용 중인 인스턴스 수
    pub in_use_instances: usize,
    /// 총 인스턴스 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성된 인스턴스 수
    pub total_instances_created: u64,
    /// 총 폐기된 인스턴스 수
    pub total_instances_destroyed: u64,
    /// 총 획득 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// Tests
// ============================================================================

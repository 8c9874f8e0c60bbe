//! 인스턴스 풀
//!
//! 샤드 클라이언트 인스턴스 풀링

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use super::config::{NodeGroupConfig, RoutingConfig};
use super::connection::Connector;
use super::error::{ShardError, ShardResult};
use super::routing::{KeyTag, Ring, ShardClientInstance};

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 인스턴스 풀 설정
///
/// # 필드
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_total` | 8 | 최대 인스턴스 수 (유휴 + 사용 중) |
/// | `max_idle` | 8 | 최대 유휴 인스턴스 수 |
/// | `min_idle` | 0 | 유지보수/워밍업 시 유지할 유휴 인스턴스 수 |
/// | `max_wait` | 30초 | 획득 대기 한도 (`None`이면 무한 대기) |
/// | `test_on_borrow` | false | 획득 시 검증 |
/// | `test_on_return` | false | 반환 시 검증 |
/// | `test_while_idle` | true | 유지보수 시 유휴 인스턴스 검증 |
/// | `max_lifetime` | 없음 | 인스턴스 최대 수명 |
/// | `idle_timeout` | 5분 | 유휴 타임아웃 |
/// | `validation_timeout` | 5초 | 검증 타임아웃 |
/// | `warmup_on_init` | false | 초기화 시 워밍업 여부 |
/// | `warmup_size` | 0 | 워밍업 인스턴스 수 (0이면 min_idle 사용) |
///
/// # 예시
///
/// ```rust
/// use kvshard_driver::driver::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::builder()
///     .max_total(16)
///     .min_idle(2)
///     .max_wait(Some(Duration::from_millis(500)))
///     .test_on_borrow(true)
///     .build();
///
/// assert_eq!(config.max_total, 16);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 최대 인스턴스 수
    pub max_total: usize,
    /// 최대 유휴 인스턴스 수
    pub max_idle: usize,
    /// 최소 유휴 인스턴스 수
    pub min_idle: usize,
    /// 획득 대기 한도
    pub max_wait: Option<Duration>,
    /// 획득 시 검증
    pub test_on_borrow: bool,
    /// 반환 시 검증
    pub test_on_return: bool,
    /// 유지보수 시 검증
    pub test_while_idle: bool,
    /// 인스턴스 최대 수명
    pub max_lifetime: Option<Duration>,
    /// 유휴 타임아웃
    pub idle_timeout: Option<Duration>,
    /// 검증 타임아웃
    pub validation_timeout: Duration,
    /// 초기화 시 워밍업 수행 여부
    pub warmup_on_init: bool,
    /// 워밍업 시 생성할 인스턴스 수 (0이면 min_idle 사용)
    pub warmup_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 8,
            max_idle: 8,
            min_idle: 0,
            max_wait: Some(Duration::from_secs(30)),
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: true,
            max_lifetime: None,
            idle_timeout: Some(Duration::from_secs(300)),
            validation_timeout: Duration::from_secs(5),
            warmup_on_init: false,
            warmup_size: 0,
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// 설정 검증
    pub fn validate(&self) -> ShardResult<()> {
        if self.max_total == 0 {
            return Err(ShardError::configuration("max_total must be positive"));
        }
        if self.min_idle > self.max_total {
            return Err(ShardError::configuration(format!(
                "min_idle ({}) must not exceed max_total ({})",
                self.min_idle, self.max_total
            )));
        }
        Ok(())
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// 최대 인스턴스 수 설정
    pub fn max_total(mut self, size: usize) -> Self {
        self.config.max_total = size;
        self
    }

    /// 최대 유휴 인스턴스 수 설정
    pub fn max_idle(mut self, size: usize) -> Self {
        self.config.max_idle = size;
        self
    }

    /// 최소 유휴 인스턴스 수 설정
    pub fn min_idle(mut self, size: usize) -> Self {
        self.config.min_idle = size;
        self
    }

    /// 획득 대기 한도 설정
    pub fn max_wait(mut self, wait: Option<Duration>) -> Self {
        self.config.max_wait = wait;
        self
    }

    /// 획득 시 검증 설정
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.config.test_on_borrow = enabled;
        self
    }

    /// 반환 시 검증 설정
    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.config.test_on_return = enabled;
        self
    }

    /// 유지보수 시 검증 설정
    pub fn test_while_idle(mut self, enabled: bool) -> Self {
        self.config.test_while_idle = enabled;
        self
    }

    /// 인스턴스 최대 수명 설정
    pub fn max_lifetime(mut self, duration: Option<Duration>) -> Self {
        self.config.max_lifetime = duration;
        self
    }

    /// 유휴 타임아웃 설정
    pub fn idle_timeout(mut self, duration: Option<Duration>) -> Self {
        self.config.idle_timeout = duration;
        self
    }

    /// 검증 타임아웃 설정
    pub fn validation_timeout(mut self, duration: Duration) -> Self {
        self.config.validation_timeout = duration;
        self
    }

    /// 워밍업 활성화 (min_idle 개수만큼)
    pub fn with_warmup(mut self) -> Self {
        self.config.warmup_on_init = true;
        self
    }

    /// 워밍업 활성화 (지정 개수)
    pub fn with_warmup_size(mut self, size: usize) -> Self {
        self.config.warmup_on_init = true;
        self.config.warmup_size = size;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 현재 크기
    pub size: usize,
    /// 유휴 인스턴스 수
    pub idle: usize,
    /// 사용 중인 인스턴스 수
    pub in_use: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 반환 횟수
    pub total_releases: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 폐기 횟수
    pub total_destroyed: u64,
    /// 총 획득 타임아웃 횟수
    pub total_timeouts: u64,
    /// 총 검증 실패 횟수
    pub total_validation_failures: u64,
}

// ============================================================================
// InstanceFactory - 인스턴스 생성/검증/폐기
// ============================================================================

struct InstanceFactory<K: Connector> {
    connector: K,
    configs: Vec<NodeGroupConfig>,
    ring: Arc<Ring>,
    key_tag: Arc<KeyTag>,
    next_id: AtomicU64,
}

impl<K: Connector> InstanceFactory<K> {
    async fn create(&self) -> ShardResult<ShardClientInstance<K::Connection>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        ShardClientInstance::open(
            id,
            &self.connector,
            &self.configs,
            self.ring.clone(),
            self.key_tag.clone(),
        )
        .await
    }

    /// 모든 프라이머리 PING (레플리카는 보지 않음)
    async fn validate(
        &self,
        instance: &mut ShardClientInstance<K::Connection>,
        timeout: Duration,
    ) -> bool {
        match tokio::time::timeout(timeout, instance.ping_primaries()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(instance = instance.id(), "Instance validation failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(
                    instance = instance.id(),
                    "Instance validation timed out after {:?}",
                    timeout
                );
                false
            }
        }
    }

    async fn destroy(&self, mut instance: ShardClientInstance<K::Connection>) {
        instance.disconnect_all().await;
    }
}

// ============================================================================
// ShardPool - 인스턴스 풀
// ============================================================================

struct PoolState<C> {
    /// 유휴 인스턴스들
    idle: VecDeque<ShardClientInstance<C>>,
    /// 현재 크기 (생성 중 포함)
    size: usize,
    /// 사용 중인 인스턴스 수
    in_use: usize,
    /// 열린 상태
    open: bool,
}

/// 샤드 클라이언트 인스턴스 풀
///
/// 링은 풀 생성 시 한 번 만들어 모든 인스턴스가 공유합니다.
/// 세마포어가 동시에 사용 중인 인스턴스 수를 `max_total`로 제한합니다.
pub struct ShardPool<K: Connector> {
    /// 인스턴스 팩토리
    factory: InstanceFactory<K>,
    /// 풀 설정
    config: PoolConfig,
    /// 유휴 목록과 카운터
    state: Mutex<PoolState<K::Connection>>,
    /// 세마포어 (사용 중 인스턴스 수 제한)
    semaphore: Arc<Semaphore>,
    /// 총 획득 횟수
    total_acquisitions: AtomicU64,
    /// 총 반환 횟수
    total_releases: AtomicU64,
    /// 총 생성 횟수
    total_created: AtomicU64,
    /// 총 폐기 횟수
    total_destroyed: AtomicU64,
    /// 총 타임아웃 횟수
    total_timeouts: AtomicU64,
    /// 총 검증 실패 횟수
    total_validation_failures: AtomicU64,
}

impl<K: Connector> ShardPool<K> {
    /// 새 풀 생성
    ///
    /// 링을 만들고 설정을 검증합니다. 연결은 열지 않습니다.
    pub fn new(
        connector: K,
        groups: Vec<NodeGroupConfig>,
        routing: RoutingConfig,
        config: PoolConfig,
    ) -> ShardResult<Self> {
        config.validate()?;
        let ring = Ring::build(&groups, routing.hashing, routing.virtual_nodes_per_weight)?;

        Ok(Self {
            factory: InstanceFactory {
                connector,
                configs: groups,
                ring: Arc::new(ring),
                key_tag: Arc::new(routing.key_tag),
                next_id: AtomicU64::new(1),
            },
            semaphore: Arc::new(Semaphore::new(config.max_total)),
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                size: 0,
                in_use: 0,
                open: true,
            }),
            total_acquisitions: AtomicU64::new(0),
            total_releases: AtomicU64::new(0),
            total_created: AtomicU64::new(0),
            total_destroyed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            total_validation_failures: AtomicU64::new(0),
        })
    }

    /// 인스턴스 획득
    ///
    /// 사용 가능한 인스턴스가 없으면 `max_wait`까지 기다린 뒤
    /// [`ShardError::PoolExhausted`]로 실패합니다.
    pub async fn acquire(self: &Arc<Self>) -> ShardResult<InstanceHandle<K>> {
        if !self.is_open() {
            return Err(ShardError::pool("Pool is closed"));
        }

        let permit = self.acquire_permit().await?;

        loop {
            let candidate = self.state.lock().idle.pop_front();

            // 새로 만든 인스턴스는 만료/검증 대상이 아님
            let instance = match candidate {
                Some(instance) => {
                    let mut checkout = Checkout::new(&**self, instance, None);
                    if !self.is_healthy(&mut checkout, self.config.test_on_borrow).await {
                        self.destroy_checkout(checkout).await;
                        continue;
                    }
                    match checkout.into_parts().0 {
                        Some(instance) => instance,
                        None => continue,
                    }
                }
                None => self.create_instance().await?,
            };

            return Ok(self.hand_out(instance, permit));
        }
    }

    fn hand_out(
        self: &Arc<Self>,
        mut instance: ShardClientInstance<K::Connection>,
        permit: OwnedSemaphorePermit,
    ) -> InstanceHandle<K> {
        instance.touch();
        self.state.lock().in_use += 1;
        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);

        InstanceHandle {
            instance: Some(instance),
            origin: HandleOrigin::Pooled {
                pool: self.clone(),
                _permit: permit,
            },
        }
    }

    async fn acquire_permit(&self) -> ShardResult<OwnedSemaphorePermit> {
        let acquire = self.semaphore.clone().acquire_owned();

        let result = match self.config.max_wait {
            Some(wait) => match tokio::time::timeout(wait, acquire).await {
                Ok(result) => result,
                Err(_) => {
                    self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(ShardError::PoolExhausted {
                        max_total: self.config.max_total,
                        waited: wait,
                    });
                }
            },
            None => acquire.await,
        };

        result.map_err(|_| ShardError::pool("Pool is closed"))
    }

    /// 빈 자리 예약 (`max_total` 미만일 때만)
    fn reserve_slot(&self) -> Option<SlotGuard<'_, K>> {
        let mut state = self.state.lock();
        if state.size >= self.config.max_total {
            return None;
        }
        state.size += 1;
        Some(SlotGuard {
            pool: self,
            committed: false,
        })
    }

    /// 빈 자리를 예약하고 새 인스턴스 생성
    ///
    /// 생성이 실패하거나 취소되면 예약한 자리는 되돌려집니다.
    async fn create_instance(&self) -> ShardResult<ShardClientInstance<K::Connection>> {
        let slot = self.reserve_slot().ok_or_else(|| {
            ShardError::pool(format!("Pool is at capacity ({})", self.config.max_total))
        })?;

        match self.factory.create().await {
            Ok(instance) => {
                slot.commit();
                self.total_created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(instance = instance.id(), "Created shard client instance");
                Ok(instance)
            }
            Err(e) => {
                drop(slot);
                tracing::warn!("Failed to create shard client instance: {}", e);
                Err(e)
            }
        }
    }

    fn is_expired(&self, instance: &ShardClientInstance<K::Connection>) -> bool {
        if let Some(max_lifetime) = self.config.max_lifetime {
            if instance.age() > max_lifetime {
                return true;
            }
        }
        if let Some(idle_timeout) = self.config.idle_timeout {
            if instance.idle_time() > idle_timeout {
                return true;
            }
        }
        false
    }

    async fn validate(&self, instance: &mut ShardClientInstance<K::Connection>) -> bool {
        let valid = self
            .factory
            .validate(instance, self.config.validation_timeout)
            .await;
        if !valid {
            self.total_validation_failures.fetch_add(1, Ordering::Relaxed);
        }
        valid
    }

    /// 유휴 목록에서 꺼낸 인스턴스 점검 (만료, 선택적으로 검증)
    async fn is_healthy(&self, checkout: &mut Checkout<'_, K>, validate: bool) -> bool {
        let Some(instance) = checkout.instance.as_mut() else {
            return false;
        };
        if self.is_expired(instance) {
            return false;
        }
        !validate || self.validate(instance).await
    }

    async fn destroy_checkout(&self, checkout: Checkout<'_, K>) {
        if let (Some(instance), _permit) = checkout.into_parts() {
            self.destroy(instance).await;
        }
    }

    /// 인스턴스 폐기
    ///
    /// 크기는 연결을 닫기 전에 줄입니다.
    async fn destroy(&self, instance: ShardClientInstance<K::Connection>) {
        self.state.lock().size -= 1;
        self.total_destroyed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(instance = instance.id(), "Destroying shard client instance");
        self.factory.destroy(instance).await;
    }

    /// 사용 중이던 인스턴스 반환
    ///
    /// 프라이머리가 하나라도 깨졌으면 폐기하고, 아니면 유휴 목록으로 돌려놓습니다.
    async fn release_instance(&self, instance: ShardClientInstance<K::Connection>) {
        self.state.lock().in_use -= 1;
        self.total_releases.fetch_add(1, Ordering::Relaxed);

        if !self.is_open() {
            self.destroy(instance).await;
            return;
        }

        if instance.has_broken_primary() {
            tracing::debug!(instance = instance.id(), "Evicting instance with broken primary");
            self.destroy(instance).await;
            return;
        }

        let mut checkout = Checkout::new(self, instance, None);
        if self.config.test_on_return {
            let valid = match checkout.instance.as_mut() {
                Some(instance) => self.validate(instance).await,
                None => false,
            };
            if !valid {
                self.destroy_checkout(checkout).await;
                return;
            }
        }

        if let (Some(mut instance), _permit) = checkout.into_parts() {
            instance.touch();
            self.push_idle(instance).await;
        }
    }

    /// 반환되지 않고 드롭된 인스턴스 정리
    fn discard(&self, instance: ShardClientInstance<K::Connection>) {
        self.state.lock().in_use -= 1;
        self.discard_detached(instance);
    }

    /// 풀 크기에 잡힌 인스턴스를 즉시 빼고 연결은 백그라운드에서 닫기
    fn discard_detached(&self, mut instance: ShardClientInstance<K::Connection>) {
        self.state.lock().size -= 1;
        self.total_destroyed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(instance = instance.id(), "Discarding instance dropped without release");

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                instance.disconnect_all().await;
            });
        }
    }

    /// 유지보수 한 회 수행
    ///
    /// 유휴 인스턴스의 수명/유휴 시간을 확인하고 (`test_while_idle`이면) 검증한 뒤,
    /// `min_idle`까지 다시 채웁니다. 폐기한 인스턴스 수를 반환합니다.
    ///
    /// 점검 중인 인스턴스마다 세마포어 허가를 잡아 `max_total`을 넘지 않게 합니다.
    /// 허가를 얻지 못한 유휴 인스턴스는 이번 회차에서 건너뜁니다.
    pub async fn evict(&self) -> usize {
        let candidates: Vec<Checkout<'_, K>> = {
            let mut state = self.state.lock();
            let mut taken = Vec::with_capacity(state.idle.len());
            while !state.idle.is_empty() {
                let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                    break;
                };
                if let Some(instance) = state.idle.pop_front() {
                    taken.push(Checkout::new(self, instance, Some(permit)));
                }
            }
            taken
        };
        let mut evicted = 0;

        for mut checkout in candidates {
            if self.is_healthy(&mut checkout, self.config.test_while_idle).await {
                // 허가는 유휴 목록에 넣은 뒤 놓음
                let (instance, permit) = checkout.into_parts();
                if let Some(instance) = instance {
                    self.push_idle(instance).await;
                }
                drop(permit);
            } else {
                self.destroy_checkout(checkout).await;
                evicted += 1;
            }
        }

        if let Err(e) = self.ensure_min_idle().await {
            tracing::warn!("Failed to refill idle instances: {}", e);
        }

        evicted
    }

    async fn ensure_min_idle(&self) -> ShardResult<usize> {
        let mut created = 0;

        loop {
            {
                let state = self.state.lock();
                if !state.open
                    || state.idle.len() >= self.config.min_idle.min(self.config.max_idle)
                    || state.size >= self.config.max_total
                {
                    return Ok(created);
                }
            }

            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                return Ok(created);
            };
            let instance = self.create_instance().await?;
            self.push_idle(instance).await;
            drop(permit);
            created += 1;
        }
    }

    /// 유휴 목록에 넣기 (닫혔거나 `max_idle`에 도달했으면 폐기)
    async fn push_idle(&self, instance: ShardClientInstance<K::Connection>) {
        let rejected = {
            let mut state = self.state.lock();
            if state.open && state.idle.len() < self.config.max_idle {
                state.idle.push_back(instance);
                None
            } else {
                Some(instance)
            }
        };
        if let Some(instance) = rejected {
            self.destroy(instance).await;
        }
    }

    /// 주기적 유지보수 태스크 시작
    ///
    /// 풀이 닫히거나 드롭되면 종료됩니다.
    pub fn spawn_maintenance(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // 첫 tick은 즉시 완료
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(pool) = weak.upgrade() else {
                    break;
                };
                if !pool.is_open() {
                    break;
                }
                let evicted = pool.evict().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Pool maintenance evicted idle instances");
                }
            }
        })
    }

    /// 인스턴스 풀 워밍업
    ///
    /// 지정된 수의 인스턴스를 미리 만들어 유휴 상태로 둡니다.
    ///
    /// # 인자
    ///
    /// - `count`: 생성할 인스턴스 수 (0이면 config의 설정 사용)
    ///
    /// # 반환
    ///
    /// - `Ok(usize)`: 생성된 인스턴스 수
    /// - `Err`: 첫 인스턴스부터 생성 실패
    pub async fn warmup(&self, count: usize) -> ShardResult<usize> {
        if !self.is_open() {
            return Err(ShardError::pool("Pool is closed"));
        }

        let target = if count > 0 {
            count
        } else if self.config.warmup_size > 0 {
            self.config.warmup_size
        } else {
            self.config.min_idle
        };

        let to_create = {
            let state = self.state.lock();
            let target = target.min(self.config.max_total).min(self.config.max_idle);
            let room = self.config.max_total.saturating_sub(state.size);
            target.saturating_sub(state.idle.len()).min(room)
        };

        let mut created = 0;
        for _ in 0..to_create {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                break;
            };
            match self.create_instance().await {
                Ok(instance) => {
                    self.push_idle(instance).await;
                    drop(permit);
                    created += 1;
                }
                Err(e) => {
                    tracing::warn!("Warmup instance failed: {}", e);
                    if created == 0 {
                        return Err(e);
                    }
                    break;
                }
            }
        }

        Ok(created)
    }

    /// 설정에 따른 자동 워밍업
    ///
    /// `warmup_on_init`이 true인 경우에만 수행합니다.
    pub async fn warmup_if_enabled(&self) -> ShardResult<Option<usize>> {
        if !self.config.warmup_on_init {
            return Ok(None);
        }

        let count = self.warmup(0).await?;
        Ok(Some(count))
    }

    /// 풀 밖에서 쓰는 독립 인스턴스 생성
    ///
    /// 반환 시 모든 연결을 바로 닫습니다.
    pub async fn create_standalone(&self) -> ShardResult<InstanceHandle<K>> {
        let instance = self.factory.create().await?;
        Ok(InstanceHandle::standalone(instance))
    }

    /// 풀 닫기
    ///
    /// 대기 중인 획득은 실패하고 유휴 인스턴스는 폐기됩니다.
    /// 사용 중인 인스턴스는 반환될 때 폐기됩니다.
    pub async fn close(&self) {
        let idle: Vec<_> = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            state.open = false;
            state.idle.drain(..).collect()
        };
        self.semaphore.close();

        for instance in idle {
            self.destroy(instance).await;
        }
    }

    /// 열린 상태
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// 링
    pub fn ring(&self) -> &Ring {
        &self.factory.ring
    }

    /// 키가 속한 샤드 식별자 (인스턴스 획득 없이)
    pub fn shard_for_key(&self, key: &str) -> &str {
        self.factory.ring.resolve_key(key, &self.factory.key_tag)
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        let (size, idle, in_use) = {
            let state = self.state.lock();
            (state.size, state.idle.len(), state.in_use)
        };

        PoolMetrics {
            size,
            idle,
            in_use,
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            total_releases: self.total_releases.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
            total_validation_failures: self.total_validation_failures.load(Ordering::Relaxed),
        }
    }

    /// 풀 크기
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// 유휴 인스턴스 수
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// 사용 중인 인스턴스 수
    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use
    }
}

impl<K: Connector> fmt::Debug for ShardPool<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ShardPool")
            .field("shards", &self.factory.ring.shard_ids())
            .field("size", &state.size)
            .field("idle", &state.idle.len())
            .field("in_use", &state.in_use)
            .field("open", &state.open)
            .finish()
    }
}

// ============================================================================
// SlotGuard / Checkout - 크기 계산 보호
// ============================================================================

/// 생성 중인 인스턴스 자리
///
/// 커밋하지 않고 드롭되면 예약한 크기를 되돌립니다.
struct SlotGuard<'a, K: Connector> {
    pool: &'a ShardPool<K>,
    committed: bool,
}

impl<K: Connector> SlotGuard<'_, K> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl<K: Connector> Drop for SlotGuard<'_, K> {
    fn drop(&mut self) {
        if !self.committed {
            self.pool.state.lock().size -= 1;
        }
    }
}

/// 유휴 목록 밖에서 점검 중인 인스턴스
///
/// 처리되지 않고 드롭되면 (퓨처 취소 등) 인스턴스를 폐기합니다.
struct Checkout<'a, K: Connector> {
    pool: &'a ShardPool<K>,
    instance: Option<ShardClientInstance<K::Connection>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<'a, K: Connector> Checkout<'a, K> {
    fn new(
        pool: &'a ShardPool<K>,
        instance: ShardClientInstance<K::Connection>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            pool,
            instance: Some(instance),
            permit,
        }
    }

    fn into_parts(
        mut self,
    ) -> (
        Option<ShardClientInstance<K::Connection>>,
        Option<OwnedSemaphorePermit>,
    ) {
        (self.instance.take(), self.permit.take())
    }
}

impl<K: Connector> Drop for Checkout<'_, K> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.discard_detached(instance);
        }
    }
}

// ============================================================================
// InstanceHandle - 획득한 인스턴스
// ============================================================================

enum HandleOrigin<K: Connector> {
    /// 풀에서 획득 (반환 시 풀로)
    Pooled {
        pool: Arc<ShardPool<K>>,
        _permit: OwnedSemaphorePermit,
    },
    /// 풀 밖 인스턴스 (반환 시 즉시 닫기)
    Standalone,
}

/// 획득한 샤드 클라이언트 인스턴스
///
/// [`release`](Self::release)로 반환해야 합니다. 반환하지 않고 드롭하면
/// 인스턴스는 폐기되고 연결은 백그라운드에서 닫힙니다.
pub struct InstanceHandle<K: Connector> {
    instance: Option<ShardClientInstance<K::Connection>>,
    origin: HandleOrigin<K>,
}

impl<K: Connector> InstanceHandle<K> {
    /// 풀에 속하지 않은 핸들 생성
    pub fn standalone(instance: ShardClientInstance<K::Connection>) -> Self {
        Self {
            instance: Some(instance),
            origin: HandleOrigin::Standalone,
        }
    }

    /// 풀에서 획득한 핸들인지 여부
    pub fn is_pooled(&self) -> bool {
        matches!(self.origin, HandleOrigin::Pooled { .. })
    }

    /// 인스턴스 참조
    pub fn instance(&self) -> ShardResult<&ShardClientInstance<K::Connection>> {
        self.instance
            .as_ref()
            .ok_or_else(|| ShardError::internal("Instance already released"))
    }

    /// 인스턴스 참조 (가변)
    pub fn instance_mut(&mut self) -> ShardResult<&mut ShardClientInstance<K::Connection>> {
        self.instance
            .as_mut()
            .ok_or_else(|| ShardError::internal("Instance already released"))
    }

    /// 인스턴스 반환
    ///
    /// 풀 핸들은 풀 규칙(깨진 프라이머리면 폐기)에 따라 반환되고,
    /// 독립 핸들은 모든 연결을 닫습니다.
    pub async fn release(mut self) {
        let Some(mut instance) = self.instance.take() else {
            return;
        };

        match &self.origin {
            HandleOrigin::Pooled { pool, .. } => pool.release_instance(instance).await,
            HandleOrigin::Standalone => instance.disconnect_all().await,
        }
    }
}

impl<K: Connector> Drop for InstanceHandle<K> {
    fn drop(&mut self) {
        let Some(mut instance) = self.instance.take() else {
            return;
        };

        match &self.origin {
            HandleOrigin::Pooled { pool, .. } => pool.discard(instance),
            HandleOrigin::Standalone => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        instance.disconnect_all().await;
                    });
                }
            }
        }
    }
}

impl<K: Connector> fmt::Debug for InstanceHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("instance", &self.instance.as_ref().map(|i| i.id()))
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

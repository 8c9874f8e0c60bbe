//! 레플리카 선택 정책
//!
//! 읽기 요청을 보낼 레플리카를 고르는 전략을 정의합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use super::super::driver::Endpoint;
use super::super::error::{ShardError, ShardResult};

/// 레플리카 선택 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplicaPolicy {
    /// 랜덤 (기본값)
    #[default]
    Random,
    /// 라운드 로빈
    RoundRobin,
    /// 최소 연결
    LeastConnections,
}

impl ReplicaPolicy {
    /// 정책에 해당하는 선택기 생성
    pub fn selector(self) -> Arc<dyn ReplicaSelector> {
        match self {
            Self::Random => Arc::new(RandomSelector),
            Self::RoundRobin => Arc::new(RoundRobinSelector::new()),
            Self::LeastConnections => Arc::new(LeastConnectionsSelector::new()),
        }
    }
}

// ============================================================================
// ReplicaSelector - 선택기 트레이트
// ============================================================================

/// 레플리카 선택기
///
/// 비어 있지 않은 후보 목록에서 하나를 골라 인덱스를 돌려줍니다.
/// 후보가 하나면 전략과 관계없이 그 후보를 고릅니다.
pub trait ReplicaSelector: Send + Sync + fmt::Debug {
    /// 후보가 두 개 이상일 때의 선택
    fn choose(&self, candidates: &[Endpoint]) -> usize;

    /// 후보 선택
    fn select(&self, candidates: &[Endpoint]) -> ShardResult<usize> {
        match candidates.len() {
            0 => Err(ShardError::usage("Replica candidates must not be empty")),
            1 => Ok(0),
            len => Ok(self.choose(candidates).min(len - 1)),
        }
    }

    /// 선택된 레플리카 사용 시작 알림
    fn on_acquired(&self, _endpoint: &Endpoint) {}

    /// 선택된 레플리카 사용 종료 알림
    fn on_released(&self, _endpoint: &Endpoint) {}
}

/// 균등 랜덤 선택
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl ReplicaSelector for RandomSelector {
    fn choose(&self, candidates: &[Endpoint]) -> usize {
        rand::thread_rng().gen_range(0..candidates.len())
    }
}

/// 라운드 로빈 선택
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    /// 다음 인덱스
    index: AtomicUsize,
}

impl RoundRobinSelector {
    /// 새 선택기 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 인덱스 리셋
    pub fn reset(&self) {
        self.index.store(0, Ordering::Relaxed);
    }
}

impl ReplicaSelector for RoundRobinSelector {
    fn choose(&self, candidates: &[Endpoint]) -> usize {
        self.index.fetch_add(1, Ordering::Relaxed) % candidates.len()
    }
}

// ============================================================================
// LeastConnections
// ============================================================================

/// 엔드포인트별 사용 중 카운터
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    /// 엔드포인트별 사용 중 수
    counts: RwLock<HashMap<Endpoint, usize>>,
}

impl ConnectionCounter {
    /// 새 카운터 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 사용 시작 시 카운트 증가
    pub fn acquire(&self, endpoint: &Endpoint) {
        let mut counts = self.counts.write();
        *counts.entry(endpoint.clone()).or_insert(0) += 1;
    }

    /// 사용 종료 시 카운트 감소
    pub fn release(&self, endpoint: &Endpoint) {
        let mut counts = self.counts.write();
        if let Some(count) = counts.get_mut(endpoint) {
            *count = count.saturating_sub(1);
        }
    }

    /// 특정 엔드포인트의 사용 중 수
    pub fn get(&self, endpoint: &Endpoint) -> usize {
        self.counts.read().get(endpoint).copied().unwrap_or(0)
    }

    /// 가장 적게 사용 중인 후보의 인덱스 (동률이면 앞쪽)
    pub fn select_least(&self, candidates: &[Endpoint]) -> Option<usize> {
        let counts = self.counts.read();
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| counts.get(*e).copied().unwrap_or(0))
            .map(|(index, _)| index)
    }

    /// 모든 카운트 리셋
    pub fn reset(&self) {
        self.counts.write().clear();
    }
}

/// 최소 사용 중 레플리카 선택
#[derive(Debug, Default)]
pub struct LeastConnectionsSelector {
    counter: ConnectionCounter,
}

impl LeastConnectionsSelector {
    /// 새 선택기 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 특정 엔드포인트의 사용 중 수
    pub fn connection_count(&self, endpoint: &Endpoint) -> usize {
        self.counter.get(endpoint)
    }
}

impl ReplicaSelector for LeastConnectionsSelector {
    fn choose(&self, candidates: &[Endpoint]) -> usize {
        self.counter.select_least(candidates).unwrap_or(0)
    }

    fn on_acquired(&self, endpoint: &Endpoint) {
        self.counter.acquire(endpoint);
    }

    fn on_released(&self, endpoint: &Endpoint) {
        self.counter.release(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicas(n: usize) -> Vec<Endpoint> {
        (1..=n).map(|i| Endpoint::new(format!("replica{}", i), 6379)).collect()
    }

    #[test]
    fn test_empty_candidates_is_usage_error() {
        for policy in [ReplicaPolicy::Random, ReplicaPolicy::RoundRobin, ReplicaPolicy::LeastConnections] {
            let selector = policy.selector();
            assert!(matches!(selector.select(&[]), Err(ShardError::Usage(_))));
        }
    }

    #[test]
    fn test_single_candidate_short_circuits() {
        let selector = RoundRobinSelector::new();
        let one = replicas(1);
        for _ in 0..3 {
            assert_eq!(selector.select(&one).unwrap(), 0);
        }
        // 단일 후보는 라운드 로빈 인덱스를 소모하지 않음
        assert_eq!(selector.select(&replicas(2)).unwrap(), 0);
    }

    #[test]
    fn test_random_selection_in_range() {
        let selector = RandomSelector;
        let candidates = replicas(3);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let index = selector.select(&candidates).unwrap();
            assert!(index < 3);
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_round_robin_selection() {
        let selector = RoundRobinSelector::new();
        let candidates = replicas(3);

        let picked: Vec<usize> = (0..4).map(|_| selector.select(&candidates).unwrap()).collect();
        assert_eq!(picked, vec![0, 1, 2, 0]);

        selector.reset();
        assert_eq!(selector.select(&candidates).unwrap(), 0);
    }

    #[test]
    fn test_connection_counter() {
        let counter = ConnectionCounter::new();
        let candidates = replicas(3);

        assert_eq!(counter.get(&candidates[0]), 0);

        counter.acquire(&candidates[0]);
        counter.acquire(&candidates[0]);
        counter.acquire(&candidates[1]);
        assert_eq!(counter.get(&candidates[0]), 2);
        assert_eq!(counter.select_least(&candidates), Some(2));

        // underflow 방지
        counter.release(&candidates[1]);
        counter.release(&candidates[1]);
        assert_eq!(counter.get(&candidates[1]), 0);

        counter.reset();
        assert_eq!(counter.get(&candidates[0]), 0);
        assert_eq!(counter.select_least(&[]), None);
    }

    #[test]
    fn test_least_connections_selection() {
        let selector = LeastConnectionsSelector::new();
        let candidates = replicas(3);

        selector.on_acquired(&candidates[0]);
        selector.on_acquired(&candidates[0]);
        selector.on_acquired(&candidates[1]);
        assert_eq!(selector.select(&candidates).unwrap(), 2);

        selector.on_acquired(&candidates[2]);
        selector.on_acquired(&candidates[2]);
        selector.on_acquired(&candidates[2]);
        assert_eq!(selector.select(&candidates).unwrap(), 1);

        selector.on_released(&candidates[0]);
        selector.on_released(&candidates[0]);
        assert_eq!(selector.select(&candidates).unwrap(), 0);
        assert_eq!(selector.connection_count(&candidates[2]), 3);
    }

    #[test]
    fn test_default_policy_is_random() {
        assert_eq!(ReplicaPolicy::default(), ReplicaPolicy::Random);
    }
}

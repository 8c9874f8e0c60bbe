//! 실행 템플릿
//!
//! 논리 작업 하나를 처리합니다:
//! 획득 → 샤드 결정 → 연결 선택 → 콜백 실행 → 반환.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::connection::{Connection, ConnectionRole, Connector};
use super::driver::Endpoint;
use super::error::{ShardError, ShardResult};
use super::pool::{InstanceHandle, ShardPool};
use super::routing::ReplicaSelector;

/// 작업 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// 읽기 (레플리카로 분산 가능)
    Read,
    /// 쓰기 (항상 프라이머리)
    Write,
}

/// 실행 템플릿
///
/// `execute` 호출마다 정확히 한 번 획득하고 정확히 한 번 반환합니다.
/// 재시도는 하지 않습니다.
pub struct ExecutionTemplate<K: Connector> {
    /// 인스턴스 풀
    pool: Arc<ShardPool<K>>,
    /// 레플리카 선택기
    selector: Arc<dyn ReplicaSelector>,
    /// 읽기를 레플리카로 보낼지 여부
    read_from_replica: bool,
}

impl<K: Connector> ExecutionTemplate<K> {
    /// 새 템플릿 생성
    pub fn new(
        pool: Arc<ShardPool<K>>,
        selector: Arc<dyn ReplicaSelector>,
        read_from_replica: bool,
    ) -> Self {
        Self {
            pool,
            selector,
            read_from_replica,
        }
    }

    /// 인스턴스 풀
    pub fn pool(&self) -> &Arc<ShardPool<K>> {
        &self.pool
    }

    /// 읽기를 레플리카로 보내는지 여부
    pub fn read_from_replica(&self) -> bool {
        self.read_from_replica
    }

    /// 키에 대한 작업 실행
    ///
    /// 콜백 실패는 연결 역할과 엔드포인트를 담은 [`ShardError::Execution`]으로
    /// 감싸서 돌려줍니다. 콜백이 패닉하면 인스턴스를 반환한 뒤 패닉을 이어갑니다.
    ///
    /// ```rust,ignore
    /// let value = template
    ///     .execute("user:{42}:name", OperationKind::Read, |conn| {
    ///         Box::pin(async move { conn.command(RespCommand::new("GET").arg("user:{42}:name")).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn execute<R, F>(&self, key: &str, kind: OperationKind, callback: F) -> ShardResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut K::Connection) -> BoxFuture<'c, ShardResult<R>> + Send,
    {
        if key.trim().is_empty() {
            return Err(ShardError::usage("Key must not be empty"));
        }

        let mut handle = self.pool.acquire().await?;

        let outcome = AssertUnwindSafe(self.dispatch(&mut handle, key, kind, callback))
            .catch_unwind()
            .await;

        handle.release().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn dispatch<R, F>(
        &self,
        handle: &mut InstanceHandle<K>,
        key: &str,
        kind: OperationKind,
        callback: F,
    ) -> ShardResult<R>
    where
        F: for<'c> FnOnce(&'c mut K::Connection) -> BoxFuture<'c, ShardResult<R>>,
    {
        let group = handle.instance_mut()?.group_for_key_mut(key)?;

        let use_replica =
            kind == OperationKind::Read && self.read_from_replica && group.has_replicas();

        if !use_replica {
            let conn = group.primary_mut();
            let endpoint = conn.endpoint().clone();
            return callback(conn)
                .await
                .map_err(|e| ShardError::execution(ConnectionRole::Primary, endpoint, e));
        }

        let index = self.selector.select(group.replica_endpoints())?;
        let conn = group
            .replica_mut(index)
            .ok_or_else(|| ShardError::internal(format!("Replica index {} out of range", index)))?;
        let endpoint = conn.endpoint().clone();

        let _in_use = SelectionGuard::new(self.selector.as_ref(), endpoint.clone());
        callback(conn)
            .await
            .map_err(|e| ShardError::execution(ConnectionRole::Replica, endpoint, e))
    }
}

/// 선택기에 레플리카 사용 시작/종료 알림
struct SelectionGuard<'a> {
    selector: &'a dyn ReplicaSelector,
    endpoint: Endpoint,
}

impl<'a> SelectionGuard<'a> {
    fn new(selector: &'a dyn ReplicaSelector, endpoint: Endpoint) -> Self {
        selector.on_acquired(&endpoint);
        Self { selector, endpoint }
    }
}

impl Drop for SelectionGuard<'_> {
    fn drop(&mut self) {
        self.selector.on_released(&self.endpoint);
    }
}

impl<K: Connector> fmt::Debug for ExecutionTemplate<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionTemplate")
            .field("pool", &self.pool)
            .field("selector", &self.selector)
            .field("read_from_replica", &self.read_from_replica)
            .finish()
    }
}

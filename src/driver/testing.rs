//! 테스트용 메모리 드라이버

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::connection::{Connection, Connector, PING_REPLY};
use super::driver::Endpoint;
use super::error::{ShardError, ShardResult};

#[derive(Debug, Default)]
struct MockState {
    opened: Vec<Endpoint>,
    fail_open: HashSet<Endpoint>,
    ping_replies: HashMap<Endpoint, String>,
    ping_delay: Option<Duration>,
    open_delay: Option<Duration>,
    broken: HashSet<Endpoint>,
    disconnected: Vec<Endpoint>,
    fail_disconnect: bool,
    calls: Vec<Endpoint>,
}

/// 엔드포인트별 동작을 조절할 수 있는 가짜 드라이버
///
/// 복제본끼리 상태를 공유하므로 풀에 넘긴 뒤에도 테스트에서 조작할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 엔드포인트 열기를 실패시킴
    pub fn fail_open(&self, endpoint: Endpoint) {
        self.state.lock().fail_open.insert(endpoint);
    }

    /// 해당 엔드포인트 열기 실패 해제
    pub fn allow_open(&self, endpoint: &Endpoint) {
        self.state.lock().fail_open.remove(endpoint);
    }

    pub fn set_ping_reply(&self, endpoint: Endpoint, reply: &str) {
        self.state.lock().ping_replies.insert(endpoint, reply.to_string());
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        self.state.lock().ping_delay = Some(delay);
    }

    /// 열기마다 지연 (취소 시나리오용)
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        self.state.lock().open_delay = delay;
    }

    /// 해당 엔드포인트의 모든 연결을 깨진 상태로 표시
    pub fn set_broken(&self, endpoint: Endpoint, broken: bool) {
        let mut state = self.state.lock();
        if broken {
            state.broken.insert(endpoint);
        } else {
            state.broken.remove(&endpoint);
        }
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.state.lock().fail_disconnect = fail;
    }

    /// 성공한 열기 횟수
    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().disconnected.len()
    }

    pub fn disconnected(&self) -> Vec<Endpoint> {
        self.state.lock().disconnected.clone()
    }

    /// 콜백이 기록한 호출 엔드포인트
    pub fn calls(&self) -> Vec<Endpoint> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn open(&self, endpoint: &Endpoint) -> ShardResult<MockConnection> {
        let delay = self.state.lock().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.fail_open.contains(endpoint) {
            return Err(ShardError::connection(format!("Connection refused: {}", endpoint)));
        }
        state.opened.push(endpoint.clone());

        Ok(MockConnection {
            endpoint: endpoint.clone(),
            state: self.state.clone(),
        })
    }
}

/// 가짜 연결
#[derive(Debug)]
pub struct MockConnection {
    endpoint: Endpoint,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    /// 호출 기록 후 엔드포인트 호스트 반환
    pub fn call(&mut self) -> String {
        self.state.lock().calls.push(self.endpoint.clone());
        self.endpoint.host.clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn ping(&mut self) -> ShardResult<String> {
        let delay = self.state.lock().ping_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.broken.contains(&self.endpoint) {
            return Err(ShardError::connection("Broken pipe"));
        }
        Ok(state
            .ping_replies
            .get(&self.endpoint)
            .cloned()
            .unwrap_or_else(|| PING_REPLY.to_string()))
    }

    fn is_broken(&self) -> bool {
        self.state.lock().broken.contains(&self.endpoint)
    }

    async fn disconnect(&mut self) -> ShardResult<()> {
        let mut state = self.state.lock();
        state.disconnected.push(self.endpoint.clone());
        if state.fail_disconnect {
            return Err(ShardError::connection("Connection reset"));
        }
        Ok(())
    }
}

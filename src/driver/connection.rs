//! 드라이버 연결 추상화
//!
//! 라우팅 코어가 저장소 드라이버에 요구하는 최소 기능입니다.
//! 실제 명령은 호출자 콜백이 연결 타입을 통해 직접 수행합니다.

use std::fmt;

use async_trait::async_trait;

use super::driver::Endpoint;
use super::error::ShardResult;

/// 정상 PING 응답
pub const PING_REPLY: &str = "PONG";

/// 연결 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// 그룹의 프라이머리 (쓰기 대상)
    Primary,
    /// 그룹의 레플리카 (읽기 분산 대상)
    Replica,
}

impl ConnectionRole {
    /// 역할을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 열린 저장소 연결
///
/// 한 번에 한 호출자만 사용하므로 내부 동기화가 필요 없습니다.
#[async_trait]
pub trait Connection: Send + 'static {
    /// 원격 엔드포인트
    fn endpoint(&self) -> &Endpoint;

    /// PING 전송, 응답 문자열 반환
    async fn ping(&mut self) -> ShardResult<String>;

    /// I/O 수준 실패가 관측되었는지 여부
    fn is_broken(&self) -> bool;

    /// 연결 종료
    async fn disconnect(&mut self) -> ShardResult<()>;
}

/// 엔드포인트로 연결을 여는 드라이버
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// 이 드라이버가 만드는 연결 타입
    type Connection: Connection;

    /// 연결 열기
    async fn open(&self, endpoint: &Endpoint) -> ShardResult<Self::Connection>;
}

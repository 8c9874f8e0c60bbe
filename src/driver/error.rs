//! Driver Error Types
//!
//! 샤딩 드라이버 에러 정의

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::connection::ConnectionRole;
use super::driver::Endpoint;
use crate::resp::RespError;

// ============================================================================
// ShardError - 샤딩 드라이버 에러
// ============================================================================

/// 샤딩 드라이버 에러
#[derive(Error, Debug)]
pub enum ShardError {
    /// 잘못된 호출 (빈 키, 빈 후보 목록 등). 자원 획득 전에 발생
    #[error("Usage error: {0}")]
    Usage(String),

    /// 콜백 실행 실패 (역할/엔드포인트 정보 포함)
    #[error(
        "Execution error: {message} [role={role}, host={}, port={}]",
        .endpoint.host,
        .endpoint.port
    )]
    Execution {
        message: String,
        role: ConnectionRole,
        endpoint: Endpoint,
        #[source]
        source: Box<ShardError>,
    },

    /// 풀 고갈 (대기 시간 초과)
    #[error("Pool exhausted: no instance available within {waited:?} (max_total={max_total})")]
    PoolExhausted { max_total: usize, waited: Duration },

    /// 인스턴스 검증 실패 (풀 내부 전용)
    #[error("Validation error: {0}")]
    Validation(String),

    /// 설정 에러 (그룹 없음, 엔드포인트 열기 실패 등)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 서버 에러 응답
    #[error("Server error: {0}")]
    Server(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 풀 에러 (닫힌 풀 등)
    #[error("Pool error: {0}")]
    Pool(String),

    /// 호출자 작업 에러
    #[error("Operation error: {0}")]
    Operation(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShardError {
    /// 사용 에러 생성
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// 검증 에러 생성
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 작업 에러 생성
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// 내부 에러 생성
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 실행 에러로 감싸기
    ///
    /// 원래 메시지에 연결 역할과 원격 엔드포인트를 덧붙입니다.
    pub fn execution(role: ConnectionRole, endpoint: Endpoint, source: ShardError) -> Self {
        Self::Execution {
            message: source.to_string(),
            role,
            endpoint,
            source: Box::new(source),
        }
    }

    /// 실행 에러의 연결 역할
    pub fn role(&self) -> Option<ConnectionRole> {
        match self {
            Self::Execution { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// 실행 에러의 원격 엔드포인트
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Execution { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// 연결 수준 (I/O) 실패 여부
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Io(_) | Self::Timeout(_) => true,
            Self::Execution { source, .. } => source.is_connection_failure(),
            _ => false,
        }
    }

    /// 재시도 가능 여부
    ///
    /// 이 계층은 재시도하지 않습니다. 호출자 재시도 정책이 참고하는 용도입니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PoolExhausted { .. } => true,
            Self::Execution { source, .. } => source.is_retryable(),
            other => other.is_connection_failure(),
        }
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::Configuration(_))
    }
}

impl From<RespError> for ShardError {
    fn from(err: RespError) -> Self {
        match err {
            RespError::Io(e) => ShardError::Io(e),
            RespError::ConnectionClosed => ShardError::connection("Connection closed by server"),
            other => ShardError::Protocol(other.to_string()),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 샤딩 드라이버 결과 타입
pub type ShardResult<T> = Result<T, ShardError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_shard_error_creation() {
        let err = ShardError::usage("key must not be empty");
        assert!(matches!(err, ShardError::Usage(_)));

        let err = ShardError::configuration("no groups");
        assert!(matches!(err, ShardError::Configuration(_)));
    }

    #[test]
    fn test_shard_error_display() {
        let err = ShardError::connection("Connection refused");
        assert_eq!(err.to_string(), "Connection error: Connection refused");

        let err = ShardError::PoolExhausted {
            max_total: 2,
            waited: Duration::from_millis(50),
        };
        assert_eq!(
            err.to_string(),
            "Pool exhausted: no instance available within 50ms (max_total=2)"
        );
    }

    #[test]
    fn test_execution_error_context() {
        let source = ShardError::operation("WRONGTYPE");
        let err = ShardError::execution(
            ConnectionRole::Replica,
            Endpoint::new("10.0.0.7", 6380),
            source,
        );

        assert_eq!(
            err.to_string(),
            "Execution error: Operation error: WRONGTYPE [role=replica, host=10.0.0.7, port=6380]"
        );
        assert_eq!(err.role(), Some(ConnectionRole::Replica));
        assert_eq!(err.endpoint().map(|e| e.port), Some(6380));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_shard_error_retryable() {
        assert!(ShardError::connection("reset").is_retryable());
        assert!(ShardError::timeout("read").is_retryable());
        assert!(!ShardError::usage("empty key").is_retryable());

        let wrapped = ShardError::execution(
            ConnectionRole::Primary,
            Endpoint::default(),
            ShardError::connection("broken pipe"),
        );
        assert!(wrapped.is_retryable());
        assert!(wrapped.is_connection_failure());
    }

    #[test]
    fn test_shard_error_client_error() {
        assert!(ShardError::usage("empty key").is_client_error());
        assert!(ShardError::configuration("no groups").is_client_error());
        assert!(!ShardError::connection("refused").is_client_error());
    }

    #[test]
    fn test_resp_error_conversion() {
        let err: ShardError = RespError::ConnectionClosed.into();
        assert!(matches!(err, ShardError::Connection(_)));

        let err: ShardError = RespError::Protocol("bad type byte".into()).into();
        assert!(matches!(err, ShardError::Protocol(_)));
    }
}

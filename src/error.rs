//! 파서 관련 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdcError {
    /// DB에 닿지 못한 경우. 호출자가 일시적 에러로 취급할 수 있음
    #[error("MySQL 연결 에러: {0}")]
    ConnectionError(String),

    /// DB에는 닿았지만 쿼리가 실패한 경우 (권한, SQL 에러 등)
    #[error("쿼리 실행 에러: {0}")]
    QueryError(String),

    #[error("Binlog 파싱 에러: {0}")]
    BinlogParseError(String),

    #[error("유효하지 않은 이벤트: {0}")]
    InvalidEvent(String),

    #[error("파일을 찾을 수 없음: {0}")]
    FileNotFound(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("메시지 출력 에러: {0}")]
    SinkError(String),

    #[error("디렉터리 감시 에러: {0}")]
    WatchError(String),

    #[error("설정 에러: {0}")]
    ConfigError(String),
}

impl CdcError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CdcError::ConnectionError(_))
    }

    /// 경로 정보를 포함한 I/O 에러 변환
    pub fn from_io(err: io::Error, path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref().display();
        match err.kind() {
            io::ErrorKind::NotFound => CdcError::FileNotFound(path.to_string()),
            _ => CdcError::IoError(format!("{}: {}", path, err)),
        }
    }
}

impl From<io::Error> for CdcError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CdcError::FileNotFound(err.to_string()),
            _ => CdcError::IoError(err.to_string()),
        }
    }
}

impl From<mysql_async::Error> for CdcError {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Io(e) => CdcError::ConnectionError(e.to_string()),
            mysql_async::Error::Driver(e) => CdcError::ConnectionError(e.to_string()),
            other => CdcError::QueryError(other.to_string()),
        }
    }
}

impl From<notify::Error> for CdcError {
    fn from(err: notify::Error) -> Self {
        CdcError::WatchError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CdcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_file_not_found() {
        let err = CdcError::from_io(
            io::Error::new(io::ErrorKind::NotFound, "gone"),
            "/tmp/mysql-bin.index",
        );
        match err {
            CdcError::FileNotFound(path) => assert_eq!(path, "/tmp/mysql-bin.index"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_connection_error_classification() {
        assert!(CdcError::ConnectionError("refused".to_string()).is_connection_error());
        assert!(!CdcError::QueryError("denied".to_string()).is_connection_error());
    }
}

//! MySQL 데이터베이스 연결 관리
//!
//! 파서가 DB에 요청하는 것은 컬럼 메타데이터 조회 하나뿐입니다.

use crate::error::{CdcError, Result};
use crate::schema::SchemaSource;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use std::time::Duration;
use tracing::debug;

/// 컬럼명 조회 쿼리. ORDINAL_POSITION 순서가 행 데이터의 위치와 일치해야 함
pub const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

/// MySQL 연결 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    /// 연결 수립 제한 시간
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            hostname: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        ConnectionConfig {
            hostname: hostname.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    fn build_opts(&self) -> Opts {
        let password = if self.password.is_empty() {
            None
        } else {
            Some(self.password.clone())
        };

        OptsBuilder::default()
            .ip_or_hostname(self.hostname.clone())
            .tcp_port(self.port)
            .user(Some(self.username.clone()))
            .pass(password)
            .db_name(self.database.clone())
            .into()
    }
}

/// MySQL 연결 래퍼
pub struct MySqlConnection {
    conn: Conn,
}

impl MySqlConnection {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        debug!("Connecting to {}:{}", config.hostname, config.port);

        let conn = tokio::time::timeout(config.timeout, Conn::new(config.build_opts()))
            .await
            .map_err(|_| {
                CdcError::ConnectionError(format!(
                    "Timed out connecting to {}:{} after {:?}",
                    config.hostname, config.port, config.timeout
                ))
            })?
            .map_err(|e| CdcError::ConnectionError(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(MySqlConnection { conn })
    }

    /// 테이블 컬럼명 조회 (ORDINAL_POSITION 순)
    pub async fn get_table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>> {
        let columns: Vec<String> = self
            .conn
            .exec(COLUMNS_QUERY, (schema, table))
            .await
            .map_err(CdcError::from)?;

        debug!("Fetched {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    pub async fn close(self) -> Result<()> {
        self.conn.disconnect().await.map_err(CdcError::from)
    }
}

impl SchemaSource for MySqlConnection {
    async fn fetch_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.get_table_columns(schema, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.database, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_connection_config_new() {
        let config = ConnectionConfig::new("127.0.0.1", "root");
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.username, "root");
    }

    #[tokio::test]
    #[ignore] // 실제 MySQL 연결 필요
    async fn test_fetch_columns_from_information_schema() -> Result<()> {
        let mut config = ConnectionConfig::new("localhost", "root");
        config.password = std::env::var("DB_PASSWORD").unwrap_or_default();

        let mut conn = MySqlConnection::connect(&config).await?;
        let columns = conn.get_table_columns("mysql", "user").await?;
        assert!(columns.contains(&"Host".to_string()));
        conn.close().await
    }
}

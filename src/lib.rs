//! MySQL Binlog 파일 파서
//!
//! 이 라이브러리는 MySQL 바이너리 로그 파일을 읽어 행 단위 변경 메시지로 변환합니다.
//! 주요 기능:
//! - Binlog 파일 디코딩 (`mysql_common`)
//! - table id -> 컬럼명 해석 (information_schema 조회, 캐시)
//! - 트랜잭션(XID) 단위 메시지 변환 (Insert/Update/Delete/Query)
//! - predicate/sink 기반 메시지 필터링과 JSON 출력
//! - binlog 인덱스 감시 및 증분 처리

pub mod config;
pub mod connection;
pub mod consumer;
pub mod conversion;
pub mod error;
pub mod events;
pub mod gtid;
pub mod index;
pub mod messages;
pub mod processor;
pub mod reader;
pub mod schema;
pub mod transaction;
pub mod watcher;

pub use connection::{ConnectionConfig, MySqlConnection};
pub use consumer::{ConsumerChain, MessageConsumer, MessagePredicate, MessageSink};
pub use error::{CdcError, Result};
pub use events::{BinlogEvent, CellValue, EventType};
pub use gtid::Gtid;
pub use index::IndexFile;
pub use messages::Message;
pub use processor::{process_file, BinlogEventProcessor, ProcessStats};
pub use schema::{SchemaSource, TableSchemaResolver};
pub use watcher::{watch_index, FileProcessor, IncrementalWatcher};

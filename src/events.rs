//! Binlog 이벤트 타입 및 데이터 구조 정의
//!
//! 디코더(`reader`)가 만들어내는 이벤트 모델입니다. 파서는 이 타입만 보고
//! 동작하므로 바이너리 포맷과는 분리되어 있습니다.

use serde::{Deserialize, Serialize};

/// 파서가 구분하는 이벤트 타입 (값은 binlog의 type code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// 파서가 사용하지 않는 이벤트 (FORMAT_DESCRIPTION, ROTATE 등)
    Unknown = 0,
    /// DDL, BEGIN, statement 기반 변경
    QueryEvent = 2,
    /// 트랜잭션 커밋
    XidEvent = 16,
    /// table id -> schema.table
    TableMapEvent = 19,
    WriteRowsEventV1 = 23,
    UpdateRowsEventV1 = 24,
    DeleteRowsEventV1 = 25,
    WriteRowsEvent = 30,
    UpdateRowsEvent = 31,
    DeleteRowsEvent = 32,
    GtidEvent = 33,
}

impl EventType {
    /// 행 이벤트라면 INSERT/UPDATE/DELETE 구분을 반환 (v1, v2 모두)
    pub fn rows_kind(&self) -> Option<RowsKind> {
        match self {
            EventType::WriteRowsEventV1 | EventType::WriteRowsEvent => Some(RowsKind::Insert),
            EventType::UpdateRowsEventV1 | EventType::UpdateRowsEvent => Some(RowsKind::Update),
            EventType::DeleteRowsEventV1 | EventType::DeleteRowsEvent => Some(RowsKind::Delete),
            _ => None,
        }
    }
}

/// 행 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowsKind {
    Insert,
    Update,
    Delete,
}

/// Binlog 이벤트 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// 이벤트 타임스탬프 (unix 초)
    pub timestamp: u32,
    /// 이벤트 타입
    pub event_type: EventType,
    /// 다음 이벤트 위치
    pub log_pos: u32,
}

/// 테이블 맵 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapData {
    /// 테이블 ID (파일 안에서만 유효)
    pub table_id: u64,
    /// 데이터베이스명
    pub schema: String,
    /// 테이블명
    pub table: String,
}

/// WRITE/UPDATE/DELETE_ROWS 이벤트 데이터
///
/// UPDATE의 경우 `rows`는 변경 전/후 행이 번갈아 들어있습니다
/// (`[old, new, old, new, ...]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsData {
    pub table_id: u64,
    pub rows: Vec<Vec<CellValue>>,
}

/// 셀 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// `YYYY-MM-DD HH:MM:SS[.ffffff]`
    DateTime(String),
    /// `[-]HHH:MM:SS[.ffffff]`
    Time(String),
    Json(serde_json::Value),
}

impl CellValue {
    /// 유효한 UTF-8이면 문자열로, 아니면 바이트 그대로
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => CellValue::String(s),
            Err(e) => CellValue::Bytes(e.into_bytes()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

/// GTID 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GtidEventData {
    /// GTID 문자열 (format: uuid:sequence-number)
    pub gtid: String,
}

/// 쿼리 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEventData {
    /// 데이터베이스명
    pub schema: String,
    /// 쿼리 문자열
    pub query: String,
}

/// XID (커밋) 이벤트 데이터
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XidEventData {
    pub xid: u64,
}

/// 파서가 구분하는 Binlog 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinlogEventData {
    Gtid(GtidEventData),
    Query(QueryEventData),
    Xid(XidEventData),
    TableMap(TableMapData),
    Rows(RowsData),
    /// 파서가 사용하지 않는 이벤트
    Other,
}

/// 완성된 Binlog 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogEvent {
    /// 이벤트 헤더
    pub header: EventHeader,
    /// 이벤트 데이터
    pub data: BinlogEventData,
}

impl BinlogEvent {
    pub fn new(header: EventHeader, data: BinlogEventData) -> Self {
        BinlogEvent { header, data }
    }
}

//! 변경 메시지 정의
//!
//! 메시지는 한 번 생성되어 consumer에게 넘겨지는 불변 값입니다.
//! JSON 형태:
//!
//! ```json
//! {"Type":"Insert","Header":{"Schema":"db","Table":"t","BinlogMessageTime":"...",
//!  "MessageTime":"...","BinlogPosition":120,"TransactionId":7},"Data":{"Row":{"a":1}}}
//! ```

use crate::events::CellValue;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 컬럼명 -> 값
pub type MessageRow = BTreeMap<String, CellValue>;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Query,
    Insert,
    Update,
    Delete,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Query => "Query",
            MessageType::Insert => "Insert",
            MessageType::Update => "Update",
            MessageType::Delete => "Delete",
        }
    }
}

/// 모든 메시지 공통 헤더
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageHeader {
    pub schema: String,
    pub table: String,
    /// binlog 이벤트 시각 (초 단위)
    #[serde(rename = "BinlogMessageTime")]
    pub binlog_event_time: DateTime<Utc>,
    /// 메시지 변환 시각 (wall clock)
    #[serde(rename = "MessageTime")]
    pub message_emit_time: DateTime<Utc>,
    pub binlog_position: u32,
    pub transaction_id: u64,
    #[serde(rename = "GTID", default, skip_serializing_if = "Option::is_none")]
    pub gtid: Option<String>,
}

impl MessageHeader {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        binlog_timestamp: u32,
        binlog_position: u32,
        transaction_id: u64,
        gtid: Option<String>,
    ) -> Self {
        MessageHeader {
            schema: schema.into(),
            table: table.into(),
            binlog_event_time: Utc
                .timestamp_opt(binlog_timestamp as i64, 0)
                .single()
                .unwrap_or_default(),
            message_emit_time: Utc::now(),
            binlog_position,
            transaction_id,
            gtid,
        }
    }
}

/// 행 데이터와 매핑 경고
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageRowData {
    pub row: MessageRow,
    /// 행/컬럼 수 불일치가 있었을 때의 안내
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryMessage {
    pub header: MessageHeader,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InsertMessage {
    pub header: MessageHeader,
    pub data: MessageRowData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateMessage {
    pub header: MessageHeader,
    pub old_data: MessageRowData,
    pub new_data: MessageRowData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteMessage {
    pub header: MessageHeader,
    pub data: MessageRowData,
}

/// 변경 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Message {
    Query(QueryMessage),
    Insert(InsertMessage),
    Update(UpdateMessage),
    Delete(DeleteMessage),
}

impl Message {
    pub fn header(&self) -> &MessageHeader {
        match self {
            Message::Query(m) => &m.header,
            Message::Insert(m) => &m.header,
            Message::Update(m) => &m.header,
            Message::Delete(m) => &m.header,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Query(_) => MessageType::Query,
            Message::Insert(_) => MessageType::Insert,
            Message::Update(_) => MessageType::Update,
            Message::Delete(_) => MessageType::Delete,
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

//! Binlog 파일 리더
//!
//! 바이너리 디코딩은 `mysql_common`의 `BinlogFile`이 담당하고, 이 모듈은
//! 그 결과를 파서가 사용하는 `events` 모델로 변환합니다.
//! 행 데이터 디코딩에 필요한 TABLE_MAP 이벤트는 `mysql_common`의 스트림 리더가
//! table id별로 보관하며, 여기서는 그 값을 조회만 합니다.

use crate::error::{CdcError, Result};
use crate::events::*;
use crate::gtid::Gtid;
use mysql_common::binlog::consts::BinlogVersion;
use mysql_common::binlog::events::{Event, EventData, RowsEventData};
use mysql_common::binlog::jsonb;
use mysql_common::binlog::jsondiff::JsonDiff;
use mysql_common::binlog::row::BinlogRow;
use mysql_common::binlog::value::BinlogValue;
use mysql_common::binlog::BinlogFile;
use mysql_common::value::Value;
use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

/// Binlog 파일을 `BinlogEvent` 스트림으로 읽는 리더
pub struct BinlogFileReader<R> {
    inner: BinlogFile<R>,
}

impl BinlogFileReader<BufReader<File>> {
    /// 파일 경로로 리더 생성. 매직 넘버 검증까지 수행
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CdcError::from_io(e, path))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> BinlogFileReader<R> {
    pub fn new(read: R) -> Result<Self> {
        let inner = BinlogFile::new(BinlogVersion::Version4, read)
            .map_err(|e| CdcError::BinlogParseError(format!("Invalid binlog header: {}", e)))?;

        Ok(BinlogFileReader { inner })
    }

    fn convert(&self, event: Event) -> Result<BinlogEvent> {
        let raw_header = event.header();
        let timestamp = raw_header.timestamp();
        let log_pos = raw_header.log_pos();

        let data = event
            .read_data()
            .map_err(|e| CdcError::BinlogParseError(format!("Failed to read event at {}: {}", log_pos, e)))?;

        let (event_type, data) = match data {
            Some(EventData::GtidEvent(e)) => (
                EventType::GtidEvent,
                BinlogEventData::Gtid(GtidEventData {
                    gtid: Gtid::from_parts(e.sid(), e.gno()).to_string(),
                }),
            ),
            Some(EventData::QueryEvent(e)) => (
                EventType::QueryEvent,
                BinlogEventData::Query(QueryEventData {
                    schema: e.schema().into_owned(),
                    query: e.query().into_owned(),
                }),
            ),
            Some(EventData::XidEvent(e)) => (
                EventType::XidEvent,
                BinlogEventData::Xid(XidEventData { xid: e.xid }),
            ),
            Some(EventData::TableMapEvent(e)) => (
                EventType::TableMapEvent,
                BinlogEventData::TableMap(TableMapData {
                    table_id: e.table_id(),
                    schema: e.database_name().into_owned(),
                    table: e.table_name().into_owned(),
                }),
            ),
            Some(EventData::RowsEvent(rows_event)) => {
                let event_type = match &rows_event {
                    RowsEventData::WriteRowsEventV1(_) => EventType::WriteRowsEventV1,
                    RowsEventData::UpdateRowsEventV1(_) => EventType::UpdateRowsEventV1,
                    RowsEventData::DeleteRowsEventV1(_) => EventType::DeleteRowsEventV1,
                    RowsEventData::WriteRowsEvent(_) => EventType::WriteRowsEvent,
                    RowsEventData::UpdateRowsEvent(_) => EventType::UpdateRowsEvent,
                    RowsEventData::DeleteRowsEvent(_) => EventType::DeleteRowsEvent,
                    _ => EventType::Unknown,
                };
                if event_type == EventType::Unknown {
                    (EventType::Unknown, BinlogEventData::Other)
                } else {
                    let data = self.decode_rows(&rows_event)?;
                    (event_type, BinlogEventData::Rows(data))
                }
            }
            _ => (EventType::Unknown, BinlogEventData::Other),
        };

        trace!(?event_type, log_pos, "decoded binlog event");

        Ok(BinlogEvent::new(
            EventHeader {
                timestamp,
                event_type,
                log_pos,
            },
            data,
        ))
    }

    /// 행 이벤트 디코딩. UPDATE는 변경 전/후 행을 순서대로 펼쳐 담음
    fn decode_rows(&self, rows_event: &RowsEventData<'_>) -> Result<RowsData> {
        let table_id = rows_event.table_id();
        let mut rows = Vec::new();

        // TABLE_MAP 없이 나온 행 이벤트는 디코딩할 수 없음. 파서가 건너뜀
        let Some(table_map) = self.inner.reader().get_tme(table_id) else {
            return Ok(RowsData { table_id, rows });
        };

        for row in rows_event.rows(table_map) {
            let (before, after) = row.map_err(|e| {
                CdcError::BinlogParseError(format!("Failed to decode rows for table id {}: {}", table_id, e))
            })?;
            if let Some(before) = before {
                rows.push(row_values(&before)?);
            }
            if let Some(after) = after {
                rows.push(row_values(&after)?);
            }
        }

        Ok(RowsData { table_id, rows })
    }
}

impl<R: BufRead> Iterator for BinlogFileReader<R> {
    type Item = Result<BinlogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.inner.next()? {
            Ok(event) => event,
            Err(e) => {
                return Some(Err(CdcError::BinlogParseError(format!(
                    "Failed to read binlog event: {}",
                    e
                ))))
            }
        };
        Some(self.convert(event))
    }
}

fn row_values(row: &BinlogRow) -> Result<Vec<CellValue>> {
    (0..row.len())
        .map(|i| row.as_ref(i).map_or(Ok(CellValue::Null), cell_value))
        .collect()
}

fn cell_value(value: &BinlogValue<'_>) -> Result<CellValue> {
    let cell = match value {
        BinlogValue::Value(value) => match value {
            Value::NULL => CellValue::Null,
            Value::Bytes(bytes) => CellValue::from_bytes(bytes.clone()),
            Value::Int(i) => CellValue::Int(*i),
            Value::UInt(u) => CellValue::UInt(*u),
            Value::Float(f) => CellValue::Float(*f),
            Value::Double(d) => CellValue::Double(*d),
            Value::Date(year, month, day, hour, minute, second, micros) => {
                CellValue::DateTime(format_date(*year, *month, *day, *hour, *minute, *second, *micros))
            }
            Value::Time(negative, days, hours, minutes, seconds, micros) => CellValue::Time(
                format_time(*negative, *days, *hours, *minutes, *seconds, *micros),
            ),
        },
        BinlogValue::Jsonb(value) => CellValue::Json(jsonb_to_json(value)?),
        // partial update는 문서 전체가 아니라 변경 목록만 담겨 있음
        BinlogValue::JsonDiff(diffs) => CellValue::Json(serde_json::Value::Array(
            diffs.iter().map(json_diff).collect::<Result<_>>()?,
        )),
    };
    Ok(cell)
}

fn jsonb_to_json(value: &jsonb::Value<'_>) -> Result<serde_json::Value> {
    serde_json::Value::try_from(value.clone())
        .map_err(|e| CdcError::BinlogParseError(format!("Invalid JSON column value: {}", e)))
}

/// `{"Operation": "REPLACE", "Path": "$.a", "Value": ...}` 형태. REMOVE에는 Value 없음
fn json_diff(diff: &JsonDiff<'_>) -> Result<serde_json::Value> {
    let mut change = json!({
        "Operation": format!("{:?}", diff.operation()),
        "Path": diff.path_str(),
    });
    if let Some(value) = diff.value() {
        change["Value"] = jsonb_to_json(value)?;
    }
    Ok(change)
}

fn format_date(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8, micros: u32) -> String {
    let mut s = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    );
    if micros > 0 {
        s.push_str(&format!(".{:06}", micros));
    }
    s
}

fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let total_hours = days * 24 + hours as u32;
    let mut s = format!(
        "{}{:02}:{:02}:{:02}",
        if negative { "-" } else { "" },
        total_hours,
        minutes,
        seconds
    );
    if micros > 0 {
        s.push_str(&format!(".{:06}", micros));
    }
    s
}

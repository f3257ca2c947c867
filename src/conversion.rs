//! 행 이벤트 -> 메시지 변환

use crate::error::{CdcError, Result};
use crate::events::{CellValue, EventHeader, QueryEventData, RowsKind};
use crate::messages::*;
use crate::schema::TableMetadata;
use tracing::debug;

pub const NOTICE_UNKNOWN_COLUMNS: &str =
    "column names array is missing field(s), mapped as unknown_*";
pub const NOTICE_MISSING_VALUES: &str = "row is missing field(s), ignoring missing";

/// 트랜잭션 버퍼에 쌓이는 해석된 행 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct RowEventData {
    pub kind: RowsKind,
    pub header: EventHeader,
    pub rows: Vec<Vec<CellValue>>,
    pub table: TableMetadata,
}

impl RowEventData {
    pub fn new(kind: RowsKind, header: EventHeader, rows: Vec<Vec<CellValue>>, table: TableMetadata) -> Self {
        RowEventData {
            kind,
            header,
            rows,
            table,
        }
    }
}

/// 위치 기반 행 값을 컬럼명에 매핑
///
/// 행과 컬럼 수가 다르면 실패하지 않고 `mapping_notice`에 안내를 남깁니다.
/// - 값이 더 많으면 남는 값은 `(unknown_0)`, `(unknown_1)`, ... 로 매핑
/// - 값이 더 적으면 있는 값만 매핑
pub fn map_row(row: &[CellValue], column_names: &[String]) -> MessageRowData {
    let mut mapped = MessageRow::new();

    for (index, value) in row.iter().enumerate() {
        let name = match column_names.get(index) {
            Some(name) => name.clone(),
            None => format!("(unknown_{})", index - column_names.len()),
        };
        mapped.insert(name, value.clone());
    }

    let mapping_notice = if row.len() > column_names.len() {
        Some(NOTICE_UNKNOWN_COLUMNS.to_string())
    } else if row.len() < column_names.len() {
        Some(NOTICE_MISSING_VALUES.to_string())
    } else {
        None
    };

    if let Some(notice) = &mapping_notice {
        debug!(
            "Row has {} values for {} columns: {}",
            row.len(),
            column_names.len(),
            notice
        );
    }

    MessageRowData {
        row: mapped,
        mapping_notice,
    }
}

/// QUERY 이벤트 -> Query 메시지 (트랜잭션 밖, 즉시 전달)
pub fn convert_query_event(header: &EventHeader, data: &QueryEventData) -> Message {
    Message::Query(QueryMessage {
        header: MessageHeader::new(
            data.schema.clone(),
            String::new(),
            header.timestamp,
            header.log_pos,
            0,
            None,
        ),
        query: data.query.clone(),
    })
}

/// 커밋 시점에 버퍼의 행 이벤트들을 버퍼링 순서대로 메시지로 변환
///
/// UPDATE 행 수가 홀수이면 디코딩 오류이므로 전체 변환이 실패합니다.
pub fn convert_rows_events(
    transaction_id: u64,
    gtid: Option<&str>,
    events: &[RowEventData],
) -> Result<Vec<Message>> {
    let mut messages = Vec::new();

    for event in events {
        let header = MessageHeader::new(
            event.table.schema.clone(),
            event.table.table.clone(),
            event.header.timestamp,
            event.header.log_pos,
            transaction_id,
            gtid.map(str::to_string),
        );

        let rows: Vec<MessageRowData> = event
            .rows
            .iter()
            .map(|row| map_row(row, &event.table.fields))
            .collect();

        match event.kind {
            RowsKind::Insert => messages.extend(rows.into_iter().map(|data| {
                Message::Insert(InsertMessage {
                    header: header.clone(),
                    data,
                })
            })),
            RowsKind::Delete => messages.extend(rows.into_iter().map(|data| {
                Message::Delete(DeleteMessage {
                    header: header.clone(),
                    data,
                })
            })),
            RowsKind::Update => messages.extend(update_messages(&header, rows, event)?),
        }
    }

    Ok(messages)
}

fn update_messages(
    header: &MessageHeader,
    rows: Vec<MessageRowData>,
    event: &RowEventData,
) -> Result<Vec<Message>> {
    if rows.len() % 2 != 0 {
        return Err(CdcError::InvalidEvent(format!(
            "update rows for {}.{} at position {} should be old/new pairs, got {} rows",
            event.table.schema,
            event.table.table,
            event.header.log_pos,
            rows.len()
        )));
    }

    let mut messages = Vec::with_capacity(rows.len() / 2);
    let mut rows = rows.into_iter();
    while let (Some(old_data), Some(new_data)) = (rows.next(), rows.next()) {
        messages.push(Message::Update(UpdateMessage {
            header: header.clone(),
            old_data,
            new_data,
        }));
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn table() -> TableMetadata {
        TableMetadata {
            schema: "db_name".to_string(),
            table: "table_name".to_string(),
            fields: columns(&["field_1", "field_2"]).into(),
        }
    }

    fn rows_event(kind: RowsKind, rows: Vec<Vec<CellValue>>) -> RowEventData {
        let event_type = match kind {
            RowsKind::Insert => EventType::WriteRowsEvent,
            RowsKind::Update => EventType::UpdateRowsEvent,
            RowsKind::Delete => EventType::DeleteRowsEvent,
        };
        RowEventData::new(
            kind,
            EventHeader {
                timestamp: 1_500_000_000,
                event_type,
                log_pos: 100,
            },
            rows,
            table(),
        )
    }

    fn row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    fn expected(pairs: &[(&str, &str)]) -> MessageRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_map_row_equal_counts() {
        for n in 0..5 {
            let names: Vec<String> = (0..n).map(|i| format!("c{}", i)).collect();
            let values: Vec<CellValue> = (0..n).map(|i| CellValue::Int(i as i64)).collect();

            let data = map_row(&values, &names);
            assert_eq!(data.row.len(), n);
            assert_eq!(data.mapping_notice, None);
        }
    }

    #[test]
    fn test_map_row_more_values_than_columns() {
        let data = map_row(&row(&["v1", "v2", "v3", "v4"]), &columns(&["field_1", "field_2"]));

        assert_eq!(
            data.row,
            expected(&[
                ("field_1", "v1"),
                ("field_2", "v2"),
                ("(unknown_0)", "v3"),
                ("(unknown_1)", "v4"),
            ])
        );
        let notice = data.mapping_notice.unwrap();
        assert!(notice.contains("missing field(s)"));
        assert!(notice.contains("column names array is missing field(s)"));
    }

    #[test]
    fn test_map_row_fewer_values_than_columns() {
        let data = map_row(&row(&["v1"]), &columns(&["field_1", "field_2"]));

        assert_eq!(data.row, expected(&[("field_1", "v1")]));
        assert!(data
            .mapping_notice
            .unwrap()
            .contains("row is missing field(s)"));
    }

    #[test]
    fn test_convert_query_event() {
        let header = EventHeader {
            timestamp: 1_500_000_000,
            event_type: EventType::QueryEvent,
            log_pos: 100,
        };
        let message = convert_query_event(
            &header,
            &QueryEventData {
                schema: "db_name".to_string(),
                query: "CREATE TABLE t (a INT)".to_string(),
            },
        );

        match message {
            Message::Query(m) => {
                assert_eq!(m.query, "CREATE TABLE t (a INT)");
                assert_eq!(m.header.schema, "db_name");
                assert_eq!(m.header.table, "");
                assert_eq!(m.header.binlog_position, 100);
                assert_eq!(m.header.transaction_id, 0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_insert_and_delete_one_message_per_row() {
        for kind in [RowsKind::Insert, RowsKind::Delete] {
            let events = vec![rows_event(
                kind,
                vec![row(&["value_1", "value_2"]), row(&["value_3", "value_4"])],
            )];

            let messages = convert_rows_events(200, None, &events).unwrap();
            assert_eq!(messages.len(), 2);

            let data: Vec<&MessageRowData> = messages
                .iter()
                .map(|m| match m {
                    Message::Insert(m) if kind == RowsKind::Insert => &m.data,
                    Message::Delete(m) if kind == RowsKind::Delete => &m.data,
                    other => panic!("unexpected message {:?}", other),
                })
                .collect();

            assert_eq!(data[0].row, expected(&[("field_1", "value_1"), ("field_2", "value_2")]));
            assert_eq!(data[1].row, expected(&[("field_1", "value_3"), ("field_2", "value_4")]));
            for message in &messages {
                assert_eq!(message.header().binlog_position, 100);
                assert_eq!(message.header().transaction_id, 200);
            }
        }
    }

    #[test]
    fn test_update_pairs() {
        let events = vec![rows_event(
            RowsKind::Update,
            vec![row(&["value_1", "value_2"]), row(&["value_3", "value_4"])],
        )];

        let messages = convert_rows_events(200, Some("uuid:1"), &events).unwrap();
        assert_eq!(messages.len(), 1);

        match &messages[0] {
            Message::Update(m) => {
                assert_eq!(m.old_data.row, expected(&[("field_1", "value_1"), ("field_2", "value_2")]));
                assert_eq!(m.new_data.row, expected(&[("field_1", "value_3"), ("field_2", "value_4")]));
                assert_eq!(m.header.gtid.as_deref(), Some("uuid:1"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_update_odd_row_count_fails() {
        let events = vec![rows_event(
            RowsKind::Update,
            vec![row(&["a", "b"]), row(&["c", "d"]), row(&["e", "f"])],
        )];

        let result = convert_rows_events(1, None, &events);
        assert!(matches!(result, Err(CdcError::InvalidEvent(_))));
    }

    #[test]
    fn test_message_count_matches_rows() {
        let events = vec![
            rows_event(RowsKind::Insert, vec![row(&["a", "b"]); 3]),
            rows_event(RowsKind::Update, vec![row(&["a", "b"]); 4]),
            rows_event(RowsKind::Delete, vec![row(&["a", "b"]); 2]),
        ];

        let messages = convert_rows_events(1, None, &events).unwrap();
        assert_eq!(messages.len(), 3 + 4 / 2 + 2);

        let types: Vec<MessageType> = messages.iter().map(Message::message_type).collect();
        assert_eq!(
            types,
            vec![
                MessageType::Insert,
                MessageType::Insert,
                MessageType::Insert,
                MessageType::Update,
                MessageType::Update,
                MessageType::Delete,
                MessageType::Delete,
            ]
        );
    }
}

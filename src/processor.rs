//! Binlog 이벤트 처리기
//!
//! 이벤트를 파일 순서대로 하나씩 처리하며 트랜잭션 단위로 메시지를 만듭니다.
//!
//! | 이벤트 | 동작 |
//! |---|---|
//! | GTID | 다음 트랜잭션의 GTID 기록 |
//! | QUERY `BEGIN` / `SAVEPOINT ...` | 무시 |
//! | QUERY (그 외) | Query 메시지 즉시 전달 |
//! | TABLE_MAP | 스키마 해석. 실패 시 파일 처리 중단 |
//! | ROWS | 테이블 정보가 있으면 버퍼링, 없으면 경고 후 건너뜀 |
//! | XID | 버퍼를 비우고 메시지로 변환해 순서대로 전달 |

use crate::conversion::{convert_query_event, convert_rows_events, RowEventData};
use crate::error::{CdcError, Result};
use crate::events::{BinlogEvent, BinlogEventData};
use crate::messages::Message;
use crate::consumer::MessageConsumer;
use crate::reader::BinlogFileReader;
use crate::schema::{SchemaSource, TableSchemaResolver};
use crate::transaction::TransactionAccumulator;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// 리더 스레드가 앞서 읽어둘 수 있는 이벤트 수
const EVENT_BUFFER: usize = 256;

/// 파일 하나를 처리한 결과 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub events: u64,
    pub messages: u64,
    pub transactions: u64,
    pub skipped_row_events: u64,
}

/// 파일 하나에 대한 이벤트 상태 머신
pub struct BinlogEventProcessor<'a, S, C> {
    resolver: TableSchemaResolver<S>,
    accumulator: TransactionAccumulator,
    consumer: &'a mut C,
    stats: ProcessStats,
}

impl<'a, S, C> BinlogEventProcessor<'a, S, C>
where
    S: SchemaSource,
    C: MessageConsumer,
{
    pub fn new(source: S, consumer: &'a mut C) -> Self {
        BinlogEventProcessor {
            resolver: TableSchemaResolver::new(source),
            accumulator: TransactionAccumulator::new(),
            consumer,
            stats: ProcessStats::default(),
        }
    }

    pub fn stats(&self) -> ProcessStats {
        self.stats
    }

    pub async fn handle_event(&mut self, event: BinlogEvent) -> Result<()> {
        self.stats.events += 1;
        let header = event.header;

        match event.data {
            BinlogEventData::Gtid(data) => {
                trace!("GTID {}", data.gtid);
                self.accumulator.set_gtid(data.gtid);
            }

            BinlogEventData::Query(data) => {
                let statement = data.query.trim().to_uppercase();

                if statement == "BEGIN" {
                    trace!("Starting transaction");
                } else if statement.starts_with("SAVEPOINT") {
                    trace!("Skipping transaction savepoint");
                } else {
                    debug!(log_pos = header.log_pos, "Query event");
                    self.emit(convert_query_event(&header, &data))?;
                }
            }

            BinlogEventData::Xid(data) => {
                let (events, gtid) = self.accumulator.drain();
                debug!(xid = data.xid, "Ending transaction with {} row events", events.len());

                self.stats.transactions += 1;
                for message in convert_rows_events(data.xid, gtid.as_deref(), &events)? {
                    self.emit(message)?;
                }
            }

            BinlogEventData::TableMap(data) => {
                if let Err(e) = self
                    .resolver
                    .add(data.table_id, &data.schema, &data.table)
                    .await
                {
                    error!(
                        table_id = data.table_id,
                        "Failed to add table information for table {}.{}: {}",
                        data.schema,
                        data.table,
                        e
                    );
                    return Err(e);
                }
            }

            BinlogEventData::Rows(data) => {
                let Some(kind) = header.event_type.rows_kind() else {
                    return Err(CdcError::InvalidEvent(format!(
                        "rows payload with non-rows event type {:?}",
                        header.event_type
                    )));
                };

                match self.resolver.lookup(data.table_id) {
                    Some(table) => {
                        let table = table.clone();
                        self.accumulator
                            .buffer(RowEventData::new(kind, header, data.rows, table));
                    }
                    None => {
                        warn!(
                            table_id = data.table_id,
                            "Skipping event - no table found for table id {}", data.table_id
                        );
                        self.stats.skipped_row_events += 1;
                    }
                }
            }

            BinlogEventData::Other => {}
        }

        Ok(())
    }

    /// 이벤트 스트림 전체 처리. 첫 에러에서 중단
    pub async fn run<I>(&mut self, events: I) -> Result<ProcessStats>
    where
        I: IntoIterator<Item = Result<BinlogEvent>>,
    {
        for event in events {
            self.handle_event(event?).await?;
        }

        Ok(self.finish())
    }

    /// 채널로 들어오는 이벤트 처리. 송신 측이 닫히면 종료
    pub async fn run_receiver(&mut self, mut events: mpsc::Receiver<Result<BinlogEvent>>) -> Result<ProcessStats> {
        while let Some(event) = events.recv().await {
            self.handle_event(event?).await?;
        }

        Ok(self.finish())
    }

    fn finish(&self) -> ProcessStats {
        if !self.accumulator.is_empty() {
            // 커밋 없이 파일이 끝난 트랜잭션은 전달하지 않음
            warn!(
                "{} row events left without commit at end of file",
                self.accumulator.len()
            );
        }

        self.stats
    }

    pub fn into_source(self) -> S {
        self.resolver.into_source()
    }

    fn emit(&mut self, message: Message) -> Result<()> {
        trace!(
            message_type = message.message_type().as_str(),
            table = %message.header().table,
            "Emitting message"
        );
        self.consumer.consume(message)?;
        self.stats.messages += 1;
        Ok(())
    }
}

/// binlog 파일 하나를 처리해 메시지를 `consumer`에 전달
///
/// `source`는 이 파일 전용이어야 합니다 (table id는 파일 안에서만 유효).
/// 파일 읽기와 디코딩은 blocking I/O이므로 `spawn_blocking` 스레드에서 수행하고,
/// 이벤트는 bounded 채널로 처리기에 넘깁니다.
pub async fn process_file<S, C>(path: impl AsRef<Path>, source: S, consumer: &mut C) -> Result<ProcessStats>
where
    S: SchemaSource,
    C: MessageConsumer,
{
    let path = path.as_ref();
    info!("Parsing binlog file {}", path.display());

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let reader_path = path.to_path_buf();
    let reader_task = tokio::task::spawn_blocking(move || read_events(&reader_path, tx));

    let mut processor = BinlogEventProcessor::new(source, consumer);
    // 처리기가 먼저 실패하면 수신 측이 닫혀 리더 스레드도 멈춤
    let result = processor.run_receiver(rx).await;

    reader_task.await.map_err(|e| {
        CdcError::BinlogParseError(format!("Binlog reader for {} failed: {}", path.display(), e))
    })?;
    let stats = result?;

    info!(
        "Parsed {}: {} events, {} transactions, {} messages, {} skipped row events",
        path.display(),
        stats.events,
        stats.transactions,
        stats.messages,
        stats.skipped_row_events
    );

    Ok(stats)
}

/// 파일의 이벤트를 순서대로 채널에 전송. 첫 에러를 보낸 뒤 중단
fn read_events(path: &Path, tx: mpsc::Sender<Result<BinlogEvent>>) {
    let reader = match BinlogFileReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };

    for event in reader {
        let failed = event.is_err();
        if tx.blocking_send(event).is_err() || failed {
            break;
        }
    }
}

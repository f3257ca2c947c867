//! 메시지 필터링 및 출력
//!
//! 모든 predicate가 통과한 메시지만 sink들에 순서대로 전달됩니다.
//! 첫 sink 에러에서 나머지 sink는 건너뛰고 에러를 반환합니다.

use crate::error::{CdcError, Result};
use crate::messages::Message;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, trace};

/// 파서가 메시지를 넘기는 대상
pub trait MessageConsumer {
    fn consume(&mut self, message: Message) -> Result<()>;
}

impl<F> MessageConsumer for F
where
    F: FnMut(Message) -> Result<()>,
{
    fn consume(&mut self, message: Message) -> Result<()> {
        self(message)
    }
}

pub trait MessagePredicate {
    fn evaluate(&self, message: &Message) -> bool;
}

pub trait MessageSink {
    fn accept(&mut self, message: &Message) -> Result<()>;
}

/// 스키마 포함 필터. 헤더의 스키마가 비어 있으면 통과
pub struct SchemaPredicate {
    schemas: HashSet<String>,
}

impl SchemaPredicate {
    pub fn new<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaPredicate {
            schemas: schemas.into_iter().map(Into::into).collect(),
        }
    }
}

impl MessagePredicate for SchemaPredicate {
    fn evaluate(&self, message: &Message) -> bool {
        let schema = &message.header().schema;
        schema.is_empty() || self.schemas.contains(schema)
    }
}

/// 테이블 포함 필터. 헤더의 테이블이 비어 있으면 통과
pub struct TablePredicate {
    tables: HashSet<String>,
}

impl TablePredicate {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TablePredicate {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }
}

impl MessagePredicate for TablePredicate {
    fn evaluate(&self, message: &Message) -> bool {
        let table = &message.header().table;
        table.is_empty() || self.tables.contains(table)
    }
}

/// 메시지당 JSON 한 개 + 개행을 쓰는 sink
pub struct JsonLinesSink<W: Write> {
    writer: W,
    pretty: bool,
    name: String,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, pretty: bool, name: impl Into<String>) -> Self {
        JsonLinesSink {
            writer,
            pretty,
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// `output_dir/filename` 파일 생성. `filename`은 경로가 아닌 파일명만 허용
    pub fn create_in_dir(output_dir: impl AsRef<Path>, filename: &str, pretty: bool) -> Result<Self> {
        if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
            return Err(CdcError::ConfigError(format!(
                "Pass only file name - {} given",
                filename
            )));
        }

        let path: PathBuf = output_dir.as_ref().join(filename);
        let file = File::create(&path).map_err(|e| CdcError::from_io(e, &path))?;

        Ok(JsonLinesSink::new(
            BufWriter::new(file),
            pretty,
            path.display().to_string(),
        ))
    }
}

impl<W: Write> MessageSink for JsonLinesSink<W> {
    fn accept(&mut self, message: &Message) -> Result<()> {
        let json = message.to_json(self.pretty).map_err(|e| {
            error!("Failed to convert message to JSON: {}", e);
            CdcError::from(e)
        })?;

        writeln!(self.writer, "{}", json)
            .and_then(|_| self.writer.flush())
            .map_err(|e| {
                error!("Failed to write message JSON to {}: {}", self.name, e);
                CdcError::SinkError(format!("{}: {}", self.name, e))
            })?;

        trace!("Wrote {} bytes to {}", json.len() + 1, self.name);
        Ok(())
    }
}

/// 메시지를 메모리에 모으는 sink. `messages()` 핸들은 복제해서 공유 가능
#[derive(Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl MessageSink for CollectingSink {
    fn accept(&mut self, message: &Message) -> Result<()> {
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

/// predicate와 sink를 순서대로 적용하는 체인
#[derive(Default)]
pub struct ConsumerChain {
    predicates: Vec<Box<dyn MessagePredicate + Send + Sync>>,
    sinks: Vec<Box<dyn MessageSink + Send>>,
}

impl ConsumerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빈 목록이면 필터를 추가하지 않음
    pub fn include_tables(&mut self, tables: &[String]) {
        if !tables.is_empty() {
            self.add_predicate(TablePredicate::new(tables.iter().cloned()));
        }
    }

    /// 빈 목록이면 필터를 추가하지 않음
    pub fn include_schemas(&mut self, schemas: &[String]) {
        if !schemas.is_empty() {
            self.add_predicate(SchemaPredicate::new(schemas.iter().cloned()));
        }
    }

    pub fn add_predicate(&mut self, predicate: impl MessagePredicate + Send + Sync + 'static) {
        self.predicates.push(Box::new(predicate));
    }

    pub fn add_sink(&mut self, sink: impl MessageSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn passes(&self, message: &Message) -> bool {
        self.predicates.iter().all(|p| p.evaluate(message))
    }
}

impl MessageConsumer for ConsumerChain {
    fn consume(&mut self, message: Message) -> Result<()> {
        if !self.passes(&message) {
            return Ok(());
        }

        for sink in self.sinks.iter_mut() {
            sink.accept(&message)?;
        }

        Ok(())
    }
}

/// 쉼표로 구분된 목록 파싱. 공백 제거, 빈 항목 무시
pub fn parse_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

//! 테이블 스키마 해석
//!
//! TABLE_MAP 이벤트의 table id를 컬럼명 목록으로 연결합니다.
//! table id는 binlog 파일 안에서만 유효하므로 resolver는 파일마다 새로 만듭니다.
//! 컬럼 목록은 `(schema, table)` 기준으로 캐시되어 같은 테이블이 다시 매핑되어도
//! 메타데이터를 다시 조회하지 않습니다. 실행 중 캐시 무효화는 하지 않으므로
//! 파일 중간의 ALTER TABLE은 반영되지 않습니다.

use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// 컬럼 메타데이터 조회 경계 (운영에서는 `MySqlConnection`)
pub trait SchemaSource {
    /// `ORDINAL_POSITION` 순서의 컬럼명 목록
    fn fetch_columns(&mut self, schema: &str, table: &str) -> impl Future<Output = Result<Vec<String>>>;
}

impl<S: SchemaSource> SchemaSource for &mut S {
    async fn fetch_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>> {
        (**self).fetch_columns(schema, table).await
    }
}

/// 테이블 메타데이터. 생성 후 변경되지 않음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub schema: String,
    pub table: String,
    /// 위치(index) 순서의 컬럼명
    pub fields: Arc<[String]>,
}

/// table id -> TableMetadata 해석기
pub struct TableSchemaResolver<S> {
    source: S,
    tables: HashMap<u64, TableMetadata>,
    cache: HashMap<(String, String), Arc<[String]>>,
}

impl<S: SchemaSource> TableSchemaResolver<S> {
    pub fn new(source: S) -> Self {
        TableSchemaResolver {
            source,
            tables: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// TABLE_MAP 이벤트 처리. 캐시에 없으면 컬럼 목록을 한 번 조회함
    ///
    /// 조회 실패는 그대로 반환되며, 호출자는 현재 파일 처리를 중단해야 합니다.
    pub async fn add(&mut self, table_id: u64, schema: &str, table: &str) -> Result<()> {
        let key = (schema.to_string(), table.to_string());

        let fields = match self.cache.get(&key) {
            Some(fields) => fields.clone(),
            None => {
                let fields: Arc<[String]> = self.source.fetch_columns(schema, table).await?.into();
                debug!(
                    table_id,
                    "Resolved {} columns for {}.{}",
                    fields.len(),
                    schema,
                    table
                );
                self.cache.insert(key, fields.clone());
                fields
            }
        };

        self.tables.insert(
            table_id,
            TableMetadata {
                schema: schema.to_string(),
                table: table.to_string(),
                fields,
            },
        );

        Ok(())
    }

    /// I/O 없는 조회. `None`이면 이 파일에서 아직 TABLE_MAP을 보지 못한 것
    pub fn lookup(&self, table_id: u64) -> Option<&TableMetadata> {
        self.tables.get(&table_id)
    }

    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

/// 고정된 컬럼 목록을 돌려주는 메모리 기반 소스
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    tables: HashMap<(String, String), Vec<String>>,
    queries: usize,
}

#[cfg(test)]
impl StaticSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            (schema.to_string(), table.to_string()),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// 지금까지 실행된 조회 수
    pub fn queries(&self) -> usize {
        self.queries
    }
}

#[cfg(test)]
impl SchemaSource for StaticSchemaSource {
    async fn fetch_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.queries += 1;
        // information_schema와 마찬가지로 없는 테이블은 빈 결과
        Ok(self
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

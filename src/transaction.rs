//! 트랜잭션 단위 행 이벤트 버퍼

use crate::conversion::RowEventData;

/// 현재 열려 있는 트랜잭션의 행 이벤트와 GTID를 커밋(XID)까지 보관
///
/// 내용을 읽는 방법은 `drain`뿐이며, 꺼내는 즉시 비워집니다.
#[derive(Debug, Default)]
pub struct TransactionAccumulator {
    buffered: Vec<RowEventData>,
    gtid: Option<String>,
}

impl TransactionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 트랜잭션의 GTID 기록 (이전 값은 덮어씀)
    pub fn set_gtid(&mut self, gtid: String) {
        self.gtid = Some(gtid);
    }

    pub fn buffer(&mut self, event: RowEventData) {
        self.buffered.push(event);
    }

    pub fn drain(&mut self) -> (Vec<RowEventData>, Option<String>) {
        (std::mem::take(&mut self.buffered), self.gtid.take())
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }
}

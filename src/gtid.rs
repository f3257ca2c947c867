//! GTID (Global Transaction ID)
//!
//! GTID 형식: UUID:sequence-number

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 단일 트랜잭션의 GTID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gtid {
    /// 원본 서버 UUID
    pub sid: Uuid,
    /// 서버 내 시퀀스 번호
    pub gno: u64,
}

impl Gtid {
    /// GTID 이벤트의 16바이트 SID와 GNO로 생성
    pub fn from_parts(sid: [u8; 16], gno: u64) -> Self {
        Gtid {
            sid: Uuid::from_bytes(sid),
            gno,
        }
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sid.hyphenated(), self.gno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtid_from_parts() {
        let sid = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        let gtid = Gtid::from_parts(sid, 42);
        assert_eq!(gtid.to_string(), "550e8400-e29b-41d4-a716-446655440000:42");
    }
}

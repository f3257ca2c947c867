//! 인덱스 파일 (한 줄에 파일 경로 하나)
//!
//! MySQL의 binlog 인덱스 파일과, 이미 처리한 binlog 목록을 기록하는
//! "processed index" 파일 모두 같은 형식을 사용합니다.

use crate::error::{CdcError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// 메모리에 올린 인덱스 파일
///
/// `append`는 메모리만 바꾸고, `sync`를 호출해야 디스크에 반영됩니다.
/// `sync`가 실패하면 메모리 상태가 디스크보다 앞서 있게 됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl IndexFile {
    /// 기존 인덱스 파일 읽기. 파일이 없으면 `FileNotFound`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CdcError::from_io(e, path))?;

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        debug!("Loaded {} entries from {}", lines.len(), path.display());

        Ok(IndexFile {
            path: path.to_path_buf(),
            lines,
        })
    }

    /// 인덱스 파일 읽기. 없으면 빈 파일을 만들어 사용
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Creating index file {}", path.display());
            fs::write(path, "").map_err(|e| CdcError::from_io(e, path))?;
        }

        Self::open(path)
    }

    pub fn with_lines(path: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        IndexFile {
            path: path.into(),
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn append<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
    }

    /// 현재 내용으로 파일을 덮어씀 (각 줄 끝에 개행)
    pub fn sync(&self) -> Result<()> {
        let mut content = self.lines.join("\n");
        if !self.lines.is_empty() {
            content.push('\n');
        }

        fs::write(&self.path, content).map_err(|e| {
            error!("Failed to sync index file {}: {}", self.path.display(), e);
            CdcError::from_io(e, &self.path)
        })?;

        debug!("Synced {} entries to {}", self.lines.len(), self.path.display());
        Ok(())
    }

    /// `other`에 없는 줄을 `self`의 순서대로 반환. 중복 제거는 하지 않음
    pub fn diff(&self, other: &IndexFile) -> Vec<String> {
        self.lines
            .iter()
            .filter(|line| !other.lines.contains(line))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = IndexFile::open(dir.path().join("mysql-bin.index"));
        assert!(matches!(result, Err(CdcError::FileNotFound(_))));
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parsed.index");

        let index = IndexFile::open_or_create(&path).unwrap();
        assert!(index.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_sync_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parsed.index");

        for values in [vec![], vec!["a"], vec!["mysql-bin.000001", "mysql-bin.000002"]] {
            let mut index = IndexFile::with_lines(&path, Vec::new());
            index.append(values.iter().copied());
            index.sync().unwrap();

            let reopened = IndexFile::open(&path).unwrap();
            assert_eq!(reopened.lines(), lines(&values).as_slice());
        }
    }

    #[test]
    fn test_sync_writes_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parsed.index");

        let mut index = IndexFile::open_or_create(&path).unwrap();
        index.append(["a", "b"]);
        index.sync().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");

        IndexFile::with_lines(&path, Vec::new()).sync().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_is_in_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parsed.index");
        fs::write(&path, "mysql-bin.000001\n").unwrap();

        let mut index = IndexFile::open(&path).unwrap();
        index.append(["mysql-bin.000002"]);
        assert_eq!(index.len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "mysql-bin.000001\n");
    }

    #[test]
    fn test_sync_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = IndexFile::with_lines(dir.path().join("missing/parsed.index"), Vec::new());
        index.append(["mysql-bin.000001"]);

        assert!(index.sync().is_err());
        assert_eq!(index.lines(), lines(&["mysql-bin.000001"]).as_slice());
    }

    #[test]
    fn test_diff() {
        let a = IndexFile::with_lines("a", lines(&["f1", "f2", "f3", "f2"]));
        let b = IndexFile::with_lines("b", lines(&["f2"]));

        assert!(a.diff(&a).is_empty());
        assert_eq!(a.diff(&b), lines(&["f1", "f3"]));
        assert_eq!(b.diff(&a), Vec::<String>::new());

        let c = IndexFile::with_lines("c", lines(&["f4"]));
        assert_eq!(a.diff(&c), lines(&["f1", "f2", "f3", "f2"]));
    }
}

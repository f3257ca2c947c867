//! binlog 인덱스 감시 및 증분 처리
//!
//! 시작 시 한 번, 이후 인덱스 파일이 있는 디렉터리에 변경이 생길 때마다
//! 아직 처리하지 않은 binlog 파일들을 처리합니다.
//!
//! - 인덱스의 마지막 항목은 MySQL이 쓰고 있는 파일로 보고 처리하지 않음
//! - 파일은 순서대로 하나씩 처리하며 첫 에러에서 멈춤
//! - 에러 전까지 성공한 파일은 processed index에 기록됨
//! - trigger는 mutex로 직렬화되어 동시에 실행되지 않음

use crate::error::{CdcError, Result};
use crate::index::IndexFile;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};

/// binlog 파일 하나를 끝까지 처리하는 작업
pub trait FileProcessor {
    fn process(&self, path: &Path) -> impl Future<Output = Result<()>>;
}

struct WatcherState {
    processed: IndexFile,
    // 마지막 sync 실패 후 디스크에 반영되지 않은 항목이 있음
    unsynced: bool,
}

pub struct IncrementalWatcher<P> {
    index_path: PathBuf,
    processor: P,
    ignore_connection_errors: bool,
    state: Mutex<WatcherState>,
}

impl<P: FileProcessor> IncrementalWatcher<P> {
    /// processed index는 여기서 한 번 읽고 (없으면 생성) 이후 메모리에 유지
    pub fn new(
        index_path: impl Into<PathBuf>,
        processed_index_path: impl AsRef<Path>,
        processor: P,
    ) -> Result<Self> {
        let processed = IndexFile::open_or_create(processed_index_path)?;

        Ok(IncrementalWatcher {
            index_path: index_path.into(),
            processor,
            ignore_connection_errors: false,
            state: Mutex::new(WatcherState {
                processed,
                unsynced: false,
            }),
        })
    }

    /// `watch` 중 DB 연결 에러를 일시적 에러로 보고 다음 trigger까지 넘어감
    pub fn ignore_connection_errors(mut self, ignore: bool) -> Self {
        self.ignore_connection_errors = ignore;
        self
    }

    pub async fn processed(&self) -> Vec<String> {
        self.state.lock().await.processed.lines().to_vec()
    }

    /// 증분 처리 1회 실행. 처리한 파일 수 반환
    pub async fn trigger(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let live = IndexFile::open(&self.index_path)?;

        let files = live.diff(&state.processed);
        if files.len() <= 1 {
            debug!(
                "Nothing to parse in {} ({} new entries)",
                self.index_path.display(),
                files.len()
            );
            return self.flush(&mut state, Vec::new());
        }

        let pending = &files[..files.len() - 1];
        info!("Found {} binlog files to parse", pending.len());

        let index_dir = self.index_path.parent().unwrap_or_else(|| Path::new(""));
        let mut done = Vec::with_capacity(pending.len());
        let mut failure = None;

        for entry in pending {
            let path = resolve_entry(index_dir, entry);

            match self.processor.process(&path).await {
                Ok(()) => {
                    info!("Parsed binlog file {}", path.display());
                    done.push(entry.clone());
                }
                Err(e) => {
                    error!("Failed to parse binlog file {}: {}", path.display(), e);
                    failure = Some(e);
                    break;
                }
            }
        }

        let flushed = self.flush(&mut state, done);
        match failure {
            Some(e) => Err(e),
            None => flushed,
        }
    }

    fn flush(&self, state: &mut WatcherState, done: Vec<String>) -> Result<usize> {
        let count = done.len();
        if count == 0 && !state.unsynced {
            return Ok(0);
        }

        state.processed.append(done);
        state.unsynced = true;
        state.processed.sync()?;
        state.unsynced = false;

        Ok(count)
    }

    /// 초기 trigger 후 `stop`이 오거나 송신측이 닫힐 때까지 디렉터리 변경을 감시
    pub async fn watch(&self, mut stop: oneshot::Receiver<()>) -> Result<()> {
        self.run_trigger().await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            })?;

        let dir = watch_dir(&self.index_path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for binlog index changes", dir.display());

        loop {
            tokio::select! {
                _ = &mut stop => {
                    info!("Stopping binlog index watcher");
                    return Ok(());
                }
                notification = rx.recv() => {
                    match notification {
                        Some(Ok(event)) => trace!("Filesystem event {:?}", event.kind),
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(CdcError::WatchError(
                                "notification channel closed".to_string(),
                            ))
                        }
                    }

                    // trigger 실행 중 쌓인 알림은 한 번의 trigger로 처리
                    while let Ok(queued) = rx.try_recv() {
                        queued?;
                    }

                    self.run_trigger().await?;
                }
            }
        }
    }

    async fn run_trigger(&self) -> Result<()> {
        match self.trigger().await {
            Ok(_) => Ok(()),
            Err(e) if self.ignore_connection_errors && e.is_connection_error() => {
                warn!("Ignoring connection error until next change: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// 인덱스 감시 실행
pub async fn watch_index<P: FileProcessor>(
    index_path: impl Into<PathBuf>,
    processed_index_path: impl AsRef<Path>,
    processor: P,
    ignore_connection_errors: bool,
    stop: oneshot::Receiver<()>,
) -> Result<()> {
    IncrementalWatcher::new(index_path, processed_index_path, processor)?
        .ignore_connection_errors(ignore_connection_errors)
        .watch(stop)
        .await
}

/// 인덱스 항목은 상대 경로일 수 있음 (예: `./mysql-bin.000001`)
fn resolve_entry(index_dir: &Path, entry: &str) -> PathBuf {
    let path = Path::new(entry);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        index_dir.join(path)
    }
}

fn watch_dir(index_path: &Path) -> PathBuf {
    match index_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

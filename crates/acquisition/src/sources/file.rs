//! 파일 데이터 소스
//!
//! `cat` 모드는 파일의 현재 내용을 라인 단위로 리플레이하고 종료합니다.
//! `tail` 모드는 `tail -f`와 유사하게 폴링 방식으로 새 라인을 수집하며,
//! truncation과 (unix) inode 변경 기반 로테이션을 감지합니다.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use logward_core::bus::EventBus;
use logward_core::event::AcquisitionKind;
use logward_core::supervision::Supervisor;

use crate::datasource::{AcquisitionMode, DataSource, MetricsLevel};
use crate::error::{AcquisitionError, task_error};
use crate::sources::emit_line;

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_line_bytes() -> usize {
    64 * 1024
}

/// 파일 소스 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSourceConfig {
    /// 소스 타입 이름 (문서에서 생략 가능 — filenames로 추론됨)
    pub source: Option<String>,
    /// 수집 모드
    #[serde(default)]
    pub mode: AcquisitionMode,
    /// 모든 이벤트에 부착되는 레이블
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// 수집할 파일 경로 목록
    #[serde(default)]
    pub filenames: Vec<PathBuf>,
    /// 파일 상태 폴링 주기 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트) — 초과 라인은 경고 후 건너뜀
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            source: None,
            mode: AcquisitionMode::default(),
            labels: HashMap::new(),
            filenames: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

/// 파일 데이터 소스
#[derive(Debug, Default)]
pub struct FileSource {
    config: FileSourceConfig,
    metrics: MetricsLevel,
}

/// 레지스트리용 생성자
pub(crate) fn build() -> Box<dyn crate::datasource::DynDataSource> {
    Box::new(FileSource::default())
}

impl DataSource for FileSource {
    fn source_type(&self) -> &'static str {
        "file"
    }

    fn mode(&self) -> AcquisitionMode {
        self.config.mode
    }

    fn configure(&mut self, raw: &str, metrics: MetricsLevel) -> Result<(), AcquisitionError> {
        let config: FileSourceConfig =
            serde_yaml::from_str(raw).map_err(|e| AcquisitionError::config(e.to_string()))?;

        if config.filenames.is_empty() {
            return Err(AcquisitionError::config(
                "no filenames configured for file source",
            ));
        }
        if config.poll_interval_ms == 0 {
            return Err(AcquisitionError::config(
                "poll_interval_ms must be greater than 0",
            ));
        }

        self.config = config;
        self.metrics = metrics;
        Ok(())
    }

    fn configure_by_dsn(
        &mut self,
        dsn: &str,
        labels: HashMap<String, String>,
        _since: Option<&str>,
    ) -> Result<(), AcquisitionError> {
        let path = dsn.strip_prefix("file://").ok_or_else(|| {
            AcquisitionError::config(format!(
                "invalid DSN {dsn} for file source, must start with file://"
            ))
        })?;
        if path.is_empty() {
            return Err(AcquisitionError::config("empty file path"));
        }

        self.config = FileSourceConfig {
            mode: AcquisitionMode::Cat,
            labels,
            filenames: vec![PathBuf::from(path)],
            ..FileSourceConfig::default()
        };
        Ok(())
    }

    fn can_run(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    async fn oneshot_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        let token = node.token();

        for path in &self.config.filenames {
            let src = format!("file:{}", path.display());
            let file = File::open(path).await.map_err(|e| {
                AcquisitionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to open {}: {e}", path.display()),
                ))
            })?;
            let mut lines = BufReader::new(file).lines();

            while let Some(line) = lines.next_line().await? {
                if token.is_cancelled() {
                    return Ok(());
                }
                if line.len() > self.config.max_line_bytes {
                    warn!(src = %src, len = line.len(), "skipping oversized line");
                    continue;
                }
                emit_line(
                    &bus,
                    line,
                    &src,
                    &self.config.labels,
                    AcquisitionKind::HistoryReplay,
                    self.metrics,
                    "file",
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn streaming_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        for path in self.config.filenames.clone() {
            let tail = Tail {
                path,
                bus: bus.clone(),
                labels: self.config.labels.clone(),
                token: node.token(),
                interval: Duration::from_millis(self.config.poll_interval_ms),
                max_line_bytes: self.config.max_line_bytes,
                metrics: self.metrics,
            };
            node.spawn(async move { tail.run().await.map_err(|e| task_error("file", e)) });
        }
        Ok(())
    }
}

/// 단일 파일 테일링 태스크의 상태
struct Tail {
    path: PathBuf,
    bus: EventBus,
    labels: HashMap<String, String>,
    token: CancellationToken,
    interval: Duration,
    max_line_bytes: usize,
    metrics: MetricsLevel,
}

impl Tail {
    async fn run(&self) -> Result<(), AcquisitionError> {
        let src = format!("file:{}", self.path.display());

        // 시작 시 파일 끝에서부터 테일링 — 기존 내용은 cat 모드의 영역
        let mut offset: u64 = 0;
        #[cfg(unix)]
        let mut known_inode: Option<u64> = None;

        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            offset = meta.len();
            #[cfg(unix)]
            {
                known_inode = Some(inode_of(&meta));
            }
        }

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.interval) => {}
            }

            let meta = match tokio::fs::metadata(&self.path).await {
                Ok(meta) => meta,
                // 파일이 아직 없거나 로테이션 중 — 다음 폴링에서 재시도
                Err(_) => continue,
            };

            #[cfg(unix)]
            {
                let inode = inode_of(&meta);
                if known_inode.is_some_and(|known| known != inode) {
                    warn!(src = %src, "file was rotated, reopening from start");
                    offset = 0;
                }
                known_inode = Some(inode);
            }

            if meta.len() < offset {
                warn!(src = %src, "file was truncated, reopening from start");
                offset = 0;
            }
            if meta.len() == offset {
                continue;
            }

            offset = self.read_from(offset, &src).await?;
        }
    }

    /// `offset`부터 완결된 라인들을 읽어 발행하고, 새 오프셋을 반환합니다.
    async fn read_from(&self, mut offset: u64, src: &str) -> Result<u64, AcquisitionError> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut reader = BufReader::new(file);
        let mut buf = String::new();

        loop {
            if self.token.is_cancelled() {
                return Ok(offset);
            }
            buf.clear();
            let n = reader.read_line(&mut buf).await?;
            if n == 0 {
                break;
            }
            // 개행 없는 꼬리는 아직 쓰는 중 — 다음 폴링에서 다시 읽음
            if !buf.ends_with('\n') {
                break;
            }
            offset += n as u64;

            let line = buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_line_bytes {
                warn!(src = %src, len = line.len(), "skipping oversized line");
                continue;
            }
            emit_line(
                &self.bus,
                line.to_owned(),
                src,
                &self.labels,
                AcquisitionKind::LiveStream,
                self.metrics,
                "file",
            )
            .await?;
        }

        Ok(offset)
    }
}

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

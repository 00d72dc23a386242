//! journalctl 데이터 소스
//!
//! `journalctl` 서브프로세스를 실행하여 journald 로그를 수집합니다.
//! `cat` 모드는 현재 저널 내용을 한 번 읽고 종료하며, `tail` 모드는
//! `journalctl -f --since now`로 라이브 수집합니다.
//!
//! 실행 능력 점검(`can_run`)은 `journalctl` 실행 파일이 PATH에서
//! 해석되는지 확인합니다. 실패 시 소스는 비활성화(경고)됩니다.

use std::collections::HashMap;
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logward_core::bus::EventBus;
use logward_core::event::AcquisitionKind;
use logward_core::supervision::Supervisor;

use crate::datasource::{AcquisitionMode, DataSource, MetricsLevel};
use crate::error::{AcquisitionError, task_error};
use crate::sources::emit_line;

const JOURNALCTL_BIN: &str = "journalctl";

/// journalctl 소스 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalctlSourceConfig {
    /// 소스 타입 이름 (문서에서 생략 가능 — journalctl_filter로 추론됨)
    pub source: Option<String>,
    /// 수집 모드
    #[serde(default)]
    pub mode: AcquisitionMode,
    /// 모든 이벤트에 부착되는 레이블
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// journalctl에 전달할 필터 인자 (예: `_SYSTEMD_UNIT=ssh.service`)
    #[serde(default)]
    pub journalctl_filter: Vec<String>,
    /// `--since`로 전달할 시작 시점 (journalctl 시각 표기 그대로)
    pub since: Option<String>,
}

/// journalctl 데이터 소스
#[derive(Debug, Default)]
pub struct JournalctlSource {
    config: JournalctlSourceConfig,
    metrics: MetricsLevel,
}

/// 레지스트리용 생성자
pub(crate) fn build() -> Box<dyn crate::datasource::DynDataSource> {
    Box::new(JournalctlSource::default())
}

impl JournalctlSource {
    fn src_descriptor(&self) -> String {
        format!("journalctl:{}", self.config.journalctl_filter.join(","))
    }

    fn command_args(&self, follow: bool) -> Vec<String> {
        let mut args = vec!["-q".to_owned()];
        if follow {
            args.push("-f".to_owned());
            args.push("--since".to_owned());
            args.push(
                self.config
                    .since
                    .clone()
                    .unwrap_or_else(|| "now".to_owned()),
            );
        } else if let Some(since) = &self.config.since {
            args.push("--since".to_owned());
            args.push(since.clone());
        }
        args.extend(self.config.journalctl_filter.iter().cloned());
        args
    }
}

impl DataSource for JournalctlSource {
    fn source_type(&self) -> &'static str {
        "journalctl"
    }

    fn mode(&self) -> AcquisitionMode {
        self.config.mode
    }

    fn configure(&mut self, raw: &str, metrics: MetricsLevel) -> Result<(), AcquisitionError> {
        let config: JournalctlSourceConfig =
            serde_yaml::from_str(raw).map_err(|e| AcquisitionError::config(e.to_string()))?;

        if config.journalctl_filter.is_empty() {
            return Err(AcquisitionError::config(
                "no journalctl_filter configured for journalctl source",
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
        since: Option<&str>,
    ) -> Result<(), AcquisitionError> {
        let params = dsn.strip_prefix("journalctl://").ok_or_else(|| {
            AcquisitionError::config(format!(
                "invalid DSN {dsn} for journalctl source, must start with journalctl://"
            ))
        })?;

        let mut config = JournalctlSourceConfig {
            mode: AcquisitionMode::Cat,
            labels,
            since: since.map(ToOwned::to_owned),
            ..JournalctlSourceConfig::default()
        };

        for pair in params.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AcquisitionError::config(format!("invalid DSN parameter '{pair}'"))
            })?;
            match key {
                "filters" => config.journalctl_filter.push(value.to_owned()),
                "since" => config.since = Some(value.to_owned()),
                other => {
                    return Err(AcquisitionError::config(format!(
                        "unknown DSN parameter '{other}' for journalctl source"
                    )));
                }
            }
        }

        if config.journalctl_filter.is_empty() {
            return Err(AcquisitionError::config(
                "no journalctl filters provided in DSN",
            ));
        }

        self.config = config;
        Ok(())
    }

    /// journalctl 실행 파일이 PATH에서 해석되는지 확인합니다.
    fn can_run(&self) -> Result<(), AcquisitionError> {
        let status = std::process::Command::new(JOURNALCTL_BIN)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(AcquisitionError::Unavailable {
                reason: format!("'{JOURNALCTL_BIN} --version' exited with {status}"),
            }),
            Err(e) => Err(AcquisitionError::Unavailable {
                reason: format!("'{JOURNALCTL_BIN}' not found in PATH: {e}"),
            }),
        }
    }

    async fn oneshot_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        let src = self.src_descriptor();
        let mut child = Command::new(JOURNALCTL_BIN)
            .args(self.command_args(false))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AcquisitionError::Io(std::io::Error::other("failed to capture journalctl stdout"))
        })?;
        let mut lines = BufReader::new(stdout).lines();
        let token = node.token();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Ok(());
                }
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if line.is_empty() {
                            continue;
                        }
                        emit_line(
                            &bus,
                            line,
                            &src,
                            &self.config.labels,
                            AcquisitionKind::HistoryReplay,
                            self.metrics,
                            "journalctl",
                        )
                        .await?;
                    }
                    None => break,
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(AcquisitionError::Io(std::io::Error::other(format!(
                "journalctl exited with {status}"
            ))));
        }
        Ok(())
    }

    async fn streaming_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        let follow = FollowJournal {
            src: self.src_descriptor(),
            args: self.command_args(true),
            labels: self.config.labels.clone(),
            bus,
            token: node.token(),
            metrics: self.metrics,
        };
        node.spawn(async move { follow.run().await.map_err(|e| task_error("journalctl", e)) });
        Ok(())
    }
}

/// `journalctl -f` 서브프로세스 팔로우 태스크
struct FollowJournal {
    src: String,
    args: Vec<String>,
    labels: HashMap<String, String>,
    bus: EventBus,
    token: CancellationToken,
    metrics: MetricsLevel,
}

impl FollowJournal {
    async fn run(&self) -> Result<(), AcquisitionError> {
        debug!(src = %self.src, args = ?self.args, "spawning journalctl");
        let mut child = Command::new(JOURNALCTL_BIN)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AcquisitionError::Io(std::io::Error::other("failed to capture journalctl stdout"))
        })?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Ok(());
                }
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if line.is_empty() {
                            continue;
                        }
                        emit_line(
                            &self.bus,
                            line,
                            &self.src,
                            &self.labels,
                            AcquisitionKind::LiveStream,
                            self.metrics,
                            "journalctl",
                        )
                        .await?;
                    }
                    None => {
                        // 팔로우 중 EOF는 journalctl이 죽었다는 뜻 — 세대 내 재시작 없음
                        warn!(src = %self.src, "journalctl exited while following");
                        let status = child.wait().await?;
                        return Err(AcquisitionError::Io(std::io::Error::other(format!(
                            "journalctl exited while following: {status}"
                        ))));
                    }
                }
            }
        }
    }
}

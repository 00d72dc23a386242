//! 데이터 소스 계약 — 모든 수집 플러그인이 구현하는 능력 인터페이스
//!
//! [`DataSource`] trait은 RPITIT를 사용하므로 `dyn DataSource`가 불가합니다.
//! [`DynDataSource`]는 [`BoxFuture`]를 반환하여 레지스트리와 로더가
//! `Box<dyn DynDataSource>`로 소스를 동적 관리할 수 있게 합니다.
//!
//! # 생명주기
//! ```text
//! 레지스트리 생성 → configure()/configure_by_dsn() → can_run()
//!   → oneshot_acquisition() 또는 streaming_acquisition() → (수퍼비전 노드 종료)
//! ```
//!
//! 소스 인스턴스는 정확히 하나의 수퍼비전 태스크가 소유하며, 태스크가
//! 종료된 뒤 재사용되지 않습니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use logward_core::bus::EventBus;
use logward_core::event::AcquisitionKind;
use logward_core::supervision::{BoxFuture, Supervisor};

use crate::error::AcquisitionError;

/// 수집 모드
///
/// `tail`은 무한 스트리밍, `cat`은 유한한 과거 리플레이입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// 라이브 테일링 (기본값)
    #[default]
    Tail,
    /// 일회성 과거 리플레이
    Cat,
}

impl AcquisitionMode {
    /// 이 모드로 생성되는 이벤트의 수집 유형 마커를 반환합니다.
    pub fn kind(self) -> AcquisitionKind {
        match self {
            Self::Tail => AcquisitionKind::LiveStream,
            Self::Cat => AcquisitionKind::HistoryReplay,
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail => write!(f, "tail"),
            Self::Cat => write!(f, "cat"),
        }
    }
}

/// 소스별 메트릭 상세 수준
///
/// `Aggregated`는 소스 타입 단위로, `Full`은 개별 출처(src) 레이블까지
/// 카운터를 기록합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricsLevel {
    /// 메트릭 기록 안 함
    #[default]
    None,
    /// 소스 타입 단위 집계
    Aggregated,
    /// 출처별 레이블 포함
    Full,
}

/// 모든 데이터 소스가 구현하는 계약
pub trait DataSource: Send + Sync {
    /// 소스 타입 이름 (레지스트리 키와 동일)
    fn source_type(&self) -> &'static str;

    /// 이 인스턴스의 수집 모드를 반환합니다.
    fn mode(&self) -> AcquisitionMode;

    /// 원시 YAML 문서로 소스를 구성합니다.
    ///
    /// strict 스키마로 파싱하며, 알 수 없는 필드, 필수 필드 누락, 범위 밖
    /// 값은 `Config` 에러가 됩니다.
    fn configure(&mut self, raw: &str, metrics: MetricsLevel) -> Result<(), AcquisitionError>;

    /// 연결 문자열(DSN) 형식으로 소스를 구성합니다.
    ///
    /// `scheme://[user:pass@]host[:port]/[?opt=val&...]` 형식이며, 스킴이
    /// 이 소스의 것과 다르면 `Config` 에러가 됩니다.
    fn configure_by_dsn(
        &mut self,
        dsn: &str,
        labels: HashMap<String, String>,
        since: Option<&str>,
    ) -> Result<(), AcquisitionError>;

    /// 비변경 실행 능력 점검.
    ///
    /// 에러 반환은 치명적이지 않습니다 — 로더가 소스를 비활성화하고
    /// 경고를 남깁니다.
    fn can_run(&self) -> Result<(), AcquisitionError>;

    /// 현재 시점에 존재하는 모든 과거 이벤트를 버스에 발행하고 반환합니다.
    ///
    /// 노드 토큰 취소를 관찰하여 조기 종료해야 합니다.
    fn oneshot_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> impl Future<Output = Result<(), AcquisitionError>> + Send;

    /// 백그라운드 스트리밍 작업을 `node`에 등록하고 즉시 반환합니다.
    ///
    /// 시작 자체가 비동기입니다 — 반환은 스트림 종료가 아니라 시작 완료를
    /// 의미하며, 스트림 완료는 수퍼비전 노드의 종료로 통지됩니다.
    fn streaming_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> impl Future<Output = Result<(), AcquisitionError>> + Send;
}

/// dyn-compatible 데이터 소스 trait
///
/// `DataSource`를 구현한 타입은 자동으로 `DynDataSource`도 구현되어
/// `Box<dyn DynDataSource>`로 동적 관리할 수 있습니다.
pub trait DynDataSource: Send + Sync {
    /// 소스 타입 이름
    fn source_type(&self) -> &'static str;

    /// 수집 모드
    fn mode(&self) -> AcquisitionMode;

    /// 원시 YAML 문서로 구성
    fn configure(&mut self, raw: &str, metrics: MetricsLevel) -> Result<(), AcquisitionError>;

    /// DSN으로 구성
    fn configure_by_dsn(
        &mut self,
        dsn: &str,
        labels: HashMap<String, String>,
        since: Option<&str>,
    ) -> Result<(), AcquisitionError>;

    /// 실행 능력 점검
    fn can_run(&self) -> Result<(), AcquisitionError>;

    /// 일회성 수집
    fn oneshot_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> BoxFuture<'_, Result<(), AcquisitionError>>;

    /// 스트리밍 수집 시작
    fn streaming_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> BoxFuture<'_, Result<(), AcquisitionError>>;
}

impl<T: DataSource> DynDataSource for T {
    fn source_type(&self) -> &'static str {
        DataSource::source_type(self)
    }

    fn mode(&self) -> AcquisitionMode {
        DataSource::mode(self)
    }

    fn configure(&mut self, raw: &str, metrics: MetricsLevel) -> Result<(), AcquisitionError> {
        DataSource::configure(self, raw, metrics)
    }

    fn configure_by_dsn(
        &mut self,
        dsn: &str,
        labels: HashMap<String, String>,
        since: Option<&str>,
    ) -> Result<(), AcquisitionError> {
        DataSource::configure_by_dsn(self, dsn, labels, since)
    }

    fn can_run(&self) -> Result<(), AcquisitionError> {
        DataSource::can_run(self)
    }

    fn oneshot_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> BoxFuture<'_, Result<(), AcquisitionError>> {
        Box::pin(DataSource::oneshot_acquisition(self, bus, node))
    }

    fn streaming_acquisition(
        &mut self,
        bus: EventBus,
        node: Supervisor,
    ) -> BoxFuture<'_, Result<(), AcquisitionError>> {
        Box::pin(DataSource::streaming_acquisition(self, bus, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::bus;

    #[derive(Default)]
    struct MockSource {
        mode: AcquisitionMode,
        configured: bool,
    }

    impl DataSource for MockSource {
        fn source_type(&self) -> &'static str {
            "mock"
        }

        fn mode(&self) -> AcquisitionMode {
            self.mode
        }

        fn configure(&mut self, raw: &str, _metrics: MetricsLevel) -> Result<(), AcquisitionError> {
            if raw.contains("mode: cat") {
                self.mode = AcquisitionMode::Cat;
            }
            self.configured = true;
            Ok(())
        }

        fn configure_by_dsn(
            &mut self,
            dsn: &str,
            _labels: HashMap<String, String>,
            _since: Option<&str>,
        ) -> Result<(), AcquisitionError> {
            if !dsn.starts_with("mock://") {
                return Err(AcquisitionError::config(format!(
                    "invalid DSN {dsn} for mock source, must start with mock://"
                )));
            }
            self.configured = true;
            Ok(())
        }

        fn can_run(&self) -> Result<(), AcquisitionError> {
            Ok(())
        }

        async fn oneshot_acquisition(
            &mut self,
            bus: EventBus,
            _node: Supervisor,
        ) -> Result<(), AcquisitionError> {
            let line = logward_core::event::LogLine::new("replayed", "mock:oneshot");
            bus.publish(logward_core::event::Event::new(
                line,
                AcquisitionKind::HistoryReplay,
            ))
            .await
            .map_err(|e| AcquisitionError::Channel(e.to_string()))
        }

        async fn streaming_acquisition(
            &mut self,
            _bus: EventBus,
            _node: Supervisor,
        ) -> Result<(), AcquisitionError> {
            Ok(())
        }
    }

    #[test]
    fn mode_serde_lowercase() {
        #[derive(serde::Deserialize)]
        struct Probe {
            mode: AcquisitionMode,
        }
        let probe: Probe = serde_yaml::from_str("mode: cat").unwrap();
        assert_eq!(probe.mode, AcquisitionMode::Cat);
        let probe: Probe = serde_yaml::from_str("mode: tail").unwrap();
        assert_eq!(probe.mode, AcquisitionMode::Tail);
        assert!(serde_yaml::from_str::<Probe>("mode: follow").is_err());
    }

    #[test]
    fn mode_maps_to_event_kind() {
        assert_eq!(AcquisitionMode::Tail.kind(), AcquisitionKind::LiveStream);
        assert_eq!(AcquisitionMode::Cat.kind(), AcquisitionKind::HistoryReplay);
    }

    #[test]
    fn default_mode_is_tail() {
        assert_eq!(AcquisitionMode::default(), AcquisitionMode::Tail);
    }

    #[tokio::test]
    async fn dyn_data_source_can_be_boxed() {
        let mut source: Box<dyn DynDataSource> = Box::new(MockSource::default());
        assert_eq!(source.source_type(), "mock");

        source.configure("mode: cat", MetricsLevel::None).unwrap();
        assert_eq!(source.mode(), AcquisitionMode::Cat);
        source.can_run().unwrap();

        let (bus_tx, mut bus_rx) = bus::channel(4, 0);
        let node = Supervisor::root("test");
        source.oneshot_acquisition(bus_tx, node).await.unwrap();

        let event = bus_rx.recv().await.unwrap();
        assert_eq!(event.raw_str(), "replayed");
    }

    #[test]
    fn dsn_scheme_mismatch_is_config_error() {
        let mut source = MockSource::default();
        let err =
            DataSource::configure_by_dsn(&mut source, "wrong://", HashMap::new(), None).unwrap_err();
        assert!(matches!(err, AcquisitionError::Config { .. }));
        assert!(err.to_string().contains("must start with mock://"));
    }
}

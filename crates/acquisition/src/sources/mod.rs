//! 내장 데이터 소스
//!
//! # 소스 목록
//! - [`file`]: 파일 테일링 / 일회성 리플레이
//! - [`journalctl`]: journalctl 서브프로세스 수집
//! - [`loki`]: Loki 로그 쿼리 백엔드 스트리밍
//!
//! # 아키텍처
//! 각 소스는 자체 수퍼비전 노드 아래의 tokio 태스크에서 실행되며,
//! 수집한 라인을 [`EventBus`]를 통해 발행합니다. 빌드 포함 여부는
//! cargo feature로 결정됩니다 (레지스트리 모듈 참조).

#[cfg(feature = "source-file")]
pub mod file;
#[cfg(feature = "source-journalctl")]
pub mod journalctl;
#[cfg(feature = "source-loki")]
pub mod loki;

use std::collections::HashMap;

use logward_core::bus::EventBus;
use logward_core::event::{AcquisitionKind, Event, LogLine};
use logward_core::metrics as m;

use crate::datasource::MetricsLevel;
use crate::error::AcquisitionError;

/// 수집한 라인 하나를 이벤트로 정규화해 버스에 발행합니다.
///
/// 소비자가 느리면 배압으로 대기합니다. 수신 측이 사라진 경우
/// `Channel` 에러를 반환합니다.
pub(crate) async fn emit_line(
    bus: &EventBus,
    raw: String,
    src: &str,
    labels: &HashMap<String, String>,
    kind: AcquisitionKind,
    metrics: MetricsLevel,
    source_type: &'static str,
) -> Result<(), AcquisitionError> {
    let line = LogLine::new(raw, src).with_labels(labels.clone());
    bus.publish(Event::new(line, kind))
        .await
        .map_err(|e| AcquisitionError::Channel(e.to_string()))?;

    match metrics {
        MetricsLevel::None => {}
        MetricsLevel::Aggregated => {
            metrics::counter!(m::ACQUISITION_EVENTS_READ_TOTAL, m::LABEL_SOURCE_TYPE => source_type)
                .increment(1);
        }
        MetricsLevel::Full => {
            metrics::counter!(
                m::ACQUISITION_EVENTS_READ_TOTAL,
                m::LABEL_SOURCE_TYPE => source_type,
                "src" => src.to_owned(),
            )
            .increment(1);
        }
    }

    Ok(())
}

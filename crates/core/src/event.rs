//! 이벤트 시스템 — 수집 계층과 상관분석 계층 사이의 기본 전송 단위
//!
//! 모든 데이터 소스는 수집한 원시 로그 라인을 [`Event`]로 정규화하여
//! 이벤트 버스에 발행합니다. [`EventMetadata`]는 모든 이벤트에 공통으로
//! 포함되는 추적 정보이며, [`AcquisitionKind`]는 과거 리플레이와
//! 라이브 스트림을 구분하는 마커입니다.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// --- 모듈명 상수 ---

/// 수집 계층 모듈명
pub const MODULE_ACQUISITION: &str = "acquisition";
/// 상관분석 계층 모듈명
pub const MODULE_CORRELATION: &str = "correlation";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 발생 시각, 생성 모듈, 분산 추적 ID를 담고 있어
/// 이벤트 흐름을 추적하고 디버깅할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "acquisition")
    pub source_module: String,
    /// 분산 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 수집 유형 마커
///
/// 과거 데이터의 일회성 리플레이(`HistoryReplay`)와 무한 라이브
/// 테일링(`LiveStream`)을 구분합니다. 상관분석 엔진은 이 마커로
/// 리플레이 이벤트의 시각 처리 방식을 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionKind {
    /// 일회성 과거 리플레이 (cat 모드)
    HistoryReplay,
    /// 라이브 스트리밍 (tail 모드)
    LiveStream,
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryReplay => write!(f, "history-replay"),
            Self::LiveStream => write!(f, "live-stream"),
        }
    }
}

/// 수집된 원시 로그 라인
///
/// 데이터 소스가 생성하는 정규화 이전의 라인 데이터와 출처 정보입니다.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// 원시 로그 바이트
    pub raw: Bytes,
    /// 수집 출처 식별자 (예: "file:/var/log/syslog", "loki:http://host:3100")
    pub src: String,
    /// 소스 설정에서 부여된 레이블 — 이 소스의 모든 이벤트에 부착됩니다
    pub labels: HashMap<String, String>,
    /// 수집 시각
    pub received_at: SystemTime,
}

impl LogLine {
    /// 새 로그 라인을 생성합니다.
    pub fn new(raw: impl Into<Bytes>, src: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            src: src.into(),
            labels: HashMap::new(),
            received_at: SystemTime::now(),
        }
    }

    /// 소스 레이블을 부착합니다.
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// 정규화된 수집 이벤트
///
/// 데이터 소스가 생성하고 이벤트 버스가 소유하며, 상관분석 엔진이
/// 소비합니다. 생성 이후 불변입니다.
#[derive(Debug, Clone)]
pub struct Event {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 수집된 로그 라인
    pub line: LogLine,
    /// 수집 유형 (리플레이 / 라이브)
    pub kind: AcquisitionKind,
}

impl Event {
    /// 새로운 trace를 시작하는 수집 이벤트를 생성합니다.
    pub fn new(line: LogLine, kind: AcquisitionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_ACQUISITION),
            line,
            kind,
        }
    }

    /// 기존 trace에 연결된 수집 이벤트를 생성합니다.
    pub fn with_trace(line: LogLine, kind: AcquisitionKind, trace_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_ACQUISITION, trace_id),
            line,
            kind,
        }
    }

    /// 원시 라인을 UTF-8 문자열로 반환합니다 (손실 변환).
    pub fn raw_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.line.raw)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{}] src={} kind={} len={}",
            &self.id[..8.min(self.id.len())],
            self.line.src,
            self.kind,
            self.line.raw.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> LogLine {
        let mut labels = HashMap::new();
        labels.insert("type".to_owned(), "syslog".to_owned());
        LogLine::new(Bytes::from_static(b"Failed password for root"), "file:/var/log/auth.log")
            .with_labels(labels)
    }

    #[test]
    fn event_metadata_new_preserves_trace_id() {
        let meta = EventMetadata::new("acquisition", "trace-abc-123");
        assert_eq!(meta.source_module, "acquisition");
        assert_eq!(meta.trace_id, "trace-abc-123");
        assert!(meta.timestamp <= SystemTime::now());
    }

    #[test]
    fn event_metadata_with_new_trace_generates_uuid() {
        let meta = EventMetadata::with_new_trace("acquisition");
        // UUID v4 형식 확인: 8-4-4-4-12
        assert_eq!(meta.trace_id.len(), 36);
        assert_eq!(meta.trace_id.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn event_carries_labels_and_kind() {
        let event = Event::new(sample_line(), AcquisitionKind::LiveStream);
        assert_eq!(event.kind, AcquisitionKind::LiveStream);
        assert_eq!(event.line.labels.get("type").map(String::as_str), Some("syslog"));
        assert_eq!(event.metadata.source_module, "acquisition");
    }

    #[test]
    fn event_with_trace_preserves_trace_id() {
        let event = Event::with_trace(sample_line(), AcquisitionKind::HistoryReplay, "my-trace");
        assert_eq!(event.metadata.trace_id, "my-trace");
        assert_eq!(event.kind, AcquisitionKind::HistoryReplay);
    }

    #[test]
    fn event_display() {
        let event = Event::new(sample_line(), AcquisitionKind::HistoryReplay);
        let display = event.to_string();
        assert!(display.contains("file:/var/log/auth.log"));
        assert!(display.contains("history-replay"));
    }

    #[test]
    fn raw_str_lossy_conversion() {
        let event = Event::new(sample_line(), AcquisitionKind::LiveStream);
        assert_eq!(event.raw_str(), "Failed password for root");
    }

    #[test]
    fn acquisition_kind_display() {
        assert_eq!(AcquisitionKind::HistoryReplay.to_string(), "history-replay");
        assert_eq!(AcquisitionKind::LiveStream.to_string(), "live-stream");
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Event>();
        assert_send_sync::<LogLine>();
    }
}

//! 메트릭 상수
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다. 각 모듈은 이 상수를 사용하여
//! `metrics::counter!()`, `metrics::gauge!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logward_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 데이터 소스 유형 레이블 키 (file, journalctl, loki)
pub const LABEL_SOURCE_TYPE: &str = "source_type";

/// 수집 모드 레이블 키 (tail, cat)
pub const LABEL_MODE: &str = "mode";

// ─── 이벤트 버스 메트릭 ────────────────────────────────────────────

/// 버스에 발행된 이벤트 수 (counter)
pub const BUS_EVENTS_PUBLISHED_TOTAL: &str = "logward_bus_events_published_total";

// ─── 수집 메트릭 ───────────────────────────────────────────────────

/// 활성 데이터 소스 수 (gauge)
pub const ACQUISITION_SOURCES_ACTIVE: &str = "logward_acquisition_sources_active";

/// 설정 단계에서 비활성화된 데이터 소스 수 (counter)
pub const ACQUISITION_SOURCES_DISABLED_TOTAL: &str = "logward_acquisition_sources_disabled_total";

/// 소스가 읽어 들인 라인 수 (counter) — 메트릭 상세 수준에 따라 레이블이 달라짐
pub const ACQUISITION_EVENTS_READ_TOTAL: &str = "logward_acquisition_events_read_total";

// ─── 데몬 메트릭 ───────────────────────────────────────────────────

/// 완료된 리로드 수 (counter)
pub const DAEMON_RELOADS_TOTAL: &str = "logward_daemon_reloads_total";

/// 현재 파이프라인 세대 번호 (gauge)
pub const DAEMON_PIPELINE_GENERATION: &str = "logward_daemon_pipeline_generation";

//! 수집 계층 에러 타입
//!
//! [`AcquisitionError`]는 수집 계층에서 발생하는 모든 에러를 표현합니다.
//! 에러의 *종류*가 프로그램적으로 의미를 가집니다: 로더와 오케스트레이터는
//! variant 매칭으로 복구 가능 여부(문서 단위 실패, 소스 비활성화, 치명적
//! 실패)를 판정합니다.
//!
//! `From<AcquisitionError> for LogwardError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logward_core::error::{LogwardError, PipelineError};

/// 수집 계층 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// 스키마 위반, 필수 필드 누락, 범위 밖 값, 타입 추론 실패
    #[error("{reason}")]
    Config {
        /// 실패 사유 (strict 디코더 진단 그대로 포함)
        reason: String,
    },

    /// 특정 수집 문서에서 발생한 설정 에러 (파일 경로와 0-기반 위치 포함)
    #[error("{path} (document {position}): {reason}")]
    Document {
        /// 수집 설정 파일 경로
        path: String,
        /// 파일 내 0-기반 문서 위치
        position: usize,
        /// 실패 사유
        reason: String,
    },

    /// 이 빌드에 포함되지 않은 소스 타입
    #[error("data source '{name}' is not built into this binary")]
    NotBuilt {
        /// 요청된 소스 타입 이름
        name: String,
    },

    /// 실행 능력 점검(can_run) 실패 — 소스는 경고와 함께 비활성화됩니다
    #[error("data source unavailable: {reason}")]
    Unavailable { reason: String },

    /// 모든 파일 처리 후에도 활성 소스가 없음
    #[error("no data source enabled while loading acquisition config")]
    NoDatasource,

    /// 스트리밍 소스의 백엔드가 준비 시간 내에 응답하지 않음
    #[error("{backend} is not ready: {reason}")]
    NotReady {
        /// 백엔드 이름 (예: "loki")
        backend: String,
        /// 실패 사유 — 타임아웃이면 "deadline exceeded"를 포함합니다
        reason: String,
    },

    /// I/O 에러 (명시된 수집 파일 누락 등)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 이벤트 버스 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl AcquisitionError {
    /// `Config` 에러를 생성하는 단축 생성자
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// `Config` 에러에 문서 위치 문맥을 부여합니다.
    ///
    /// 다른 variant는 종류 정보가 프로그램적으로 의미를 가지므로
    /// (예: `NotBuilt`) 그대로 통과시킵니다.
    pub fn in_document(self, path: &str, position: usize) -> Self {
        match self {
            Self::Config { reason } => Self::Document {
                path: path.to_owned(),
                position,
                reason,
            },
            other => other,
        }
    }
}

impl From<AcquisitionError> for LogwardError {
    fn from(err: AcquisitionError) -> Self {
        LogwardError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}

/// 수퍼비전 태스크용 에러 변환 — 소스 타입을 보존합니다.
pub fn task_error(source_type: &str, err: AcquisitionError) -> LogwardError {
    LogwardError::Pipeline(PipelineError::Source {
        source_type: source_type.to_owned(),
        reason: err.to_string(),
    })
}

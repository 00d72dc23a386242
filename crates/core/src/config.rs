//! 설정 관리 — logward.toml 파싱 및 런타임 설정
//!
//! [`LogwardConfig`]는 데몬 전체의 설정을 담는 최상위 구조체입니다.
//! 수집 문서(YAML) 자체는 acquisition 크레이트가 로드하며, 여기서는
//! 그 경로와 데몬 운영 설정만 다룹니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARD_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`logward.toml`)
//! 4. 기본값 (`Default` 구현)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LogwardError};

/// Logward 통합 설정
///
/// `logward.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 설정
    #[serde(default)]
    pub acquisition: AcquisitionPaths,
    /// 로컬 API 서버 설정
    #[serde(default)]
    pub api: ApiConfig,
    /// 상관분석 단계 설정
    #[serde(default)]
    pub correlation: CorrelationConfig,
}

impl LogwardConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARD_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARD_GENERAL_LOG_FORMAT");
        override_opt_string(&mut self.general.log_dir, "LOGWARD_GENERAL_LOG_DIR");
        override_string(&mut self.general.pid_file, "LOGWARD_GENERAL_PID_FILE");

        // Acquisition
        override_opt_string(
            &mut self.acquisition.config_file,
            "LOGWARD_ACQUISITION_CONFIG_FILE",
        );
        override_opt_string(
            &mut self.acquisition.config_dir,
            "LOGWARD_ACQUISITION_CONFIG_DIR",
        );
        override_usize(
            &mut self.acquisition.bus_capacity,
            "LOGWARD_ACQUISITION_BUS_CAPACITY",
        );

        // API
        override_bool(&mut self.api.enabled, "LOGWARD_API_ENABLED");
        override_string(&mut self.api.bind, "LOGWARD_API_BIND");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.acquisition.config_file.is_none() && self.acquisition.config_dir.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "acquisition".to_owned(),
                reason: "either config_file or config_dir must be set".to_owned(),
            }
            .into());
        }

        if self.acquisition.bus_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "acquisition.bus_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.api.enabled && self.api.bind.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.bind".to_owned(),
                reason: "bind address must not be empty when api is enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 로그 파일 디렉토리 — 없으면 stderr로 출력
    pub log_dir: Option<String>,
    /// PID 파일 경로 (빈 문자열이면 미사용)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            log_dir: None,
            pid_file: String::new(),
        }
    }
}

/// 수집 설정 — 수집 문서의 위치와 버스 용량
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionPaths {
    /// 단일 수집 설정 파일 경로 (지정 시 반드시 존재해야 함)
    pub config_file: Option<String>,
    /// 수집 설정 디렉토리 경로 (`*.yaml`/`*.yml`을 사전순으로 로드)
    pub config_dir: Option<String>,
    /// 이벤트 버스 채널 용량
    pub bus_capacity: usize,
}

impl Default for AcquisitionPaths {
    fn default() -> Self {
        Self {
            config_file: None,
            config_dir: Some("/etc/logward/acquis.d".to_owned()),
            bus_capacity: 1024,
        }
    }
}

/// 로컬 API 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:6060".to_owned(),
        }
    }
}

/// 상관분석 단계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// 드레인 완료 대기 한도 (초)
    pub drain_timeout_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_opt_string(target: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if value.is_empty() {
            *target = None;
        } else {
            *target = Some(value);
        }
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-boolean environment override"),
        }
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        LogwardConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_minimal_toml() {
        let config = LogwardConfig::parse(
            r#"
[general]
log_level = "debug"

[acquisition]
config_dir = "/etc/logward/acquis.d"
"#,
        )
        .unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(
            config.acquisition.config_dir.as_deref(),
            Some("/etc/logward/acquis.d")
        );
    }

    #[test]
    fn parse_rejects_malformed_toml() {
        assert!(LogwardConfig::parse("[general\nlog_level = ").is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = LogwardConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LogwardConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_some_acquisition_path() {
        let mut config = LogwardConfig::default();
        config.acquisition.config_file = None;
        config.acquisition.config_dir = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("config_file or config_dir"));
    }

    #[test]
    fn validate_rejects_zero_bus_capacity() {
        let mut config = LogwardConfig::default();
        config.acquisition.bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies() {
        unsafe {
            std::env::set_var("LOGWARD_GENERAL_LOG_LEVEL", "trace");
            std::env::set_var("LOGWARD_ACQUISITION_BUS_CAPACITY", "42");
        }
        let mut config = LogwardConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGWARD_GENERAL_LOG_LEVEL");
            std::env::remove_var("LOGWARD_ACQUISITION_BUS_CAPACITY");
        }
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.acquisition.bus_capacity, 42);
    }

    #[test]
    #[serial]
    fn env_override_ignores_bad_values() {
        unsafe {
            std::env::set_var("LOGWARD_ACQUISITION_BUS_CAPACITY", "not-a-number");
        }
        let mut config = LogwardConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGWARD_ACQUISITION_BUS_CAPACITY");
        }
        assert_eq!(config.acquisition.bus_capacity, 1024);
    }

    #[tokio::test]
    async fn from_file_reports_missing_file() {
        let err = LogwardConfig::from_file("/nonexistent/logward.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logward.toml");
        tokio::fs::write(
            &path,
            r#"
[general]
log_level = "warn"
log_format = "pretty"

[acquisition]
config_dir = "/tmp/acquis.d"
bus_capacity = 8
"#,
        )
        .await
        .unwrap();

        let config = LogwardConfig::load(&path).await.unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.acquisition.bus_capacity, 8);
    }
}

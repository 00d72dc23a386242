//! 수집 설정 로더
//!
//! 단일 파일 그리고/또는 디렉토리의 YAML 문서에서 데이터 소스를
//! 인스턴스화하고 구성합니다.
//!
//! # 알고리즘
//! 1. 명시된 파일이 있으면 읽습니다 — 없으면 즉시 I/O 에러 (명시된 파일은
//!    반드시 존재해야 합니다).
//! 2. 디렉토리가 있으면 `*.yaml`/`*.yml` 일반 파일을 사전순으로 읽습니다.
//! 3. 각 파일을 `---` 구분자로 문서 분할하고, 문서마다 소스 타입을
//!    결정(명시된 `source:` 또는 시그니처 필드 추론)한 뒤 strict 스키마로
//!    구성합니다. 문서 에러에는 파일 경로와 0-기반 위치가 포함됩니다.
//! 4. 빈 문서는 에러 없이 건너뜁니다. `can_run()` 실패는 경고와 함께
//!    소스를 비활성화합니다.
//! 5. 활성 소스가 0개인지는 모든 파일 처리 후에만 검사하므로, 문서 단위
//!    에러가 [`AcquisitionError::NoDatasource`]에 가려지지 않습니다.

use std::path::PathBuf;

use tracing::{info, warn};

use logward_core::config::AcquisitionPaths;
use logward_core::metrics as m;

use crate::datasource::{DynDataSource, MetricsLevel};
use crate::error::AcquisitionError;
use crate::registry::SourceRegistry;

/// 구성이 끝난 데이터 소스와 그 출처 문서의 위치
pub struct ConfiguredSource {
    /// 수집 설정 파일 경로
    pub path: PathBuf,
    /// 파일 내 0-기반 문서 위치
    pub position: usize,
    /// 소스 타입 이름
    pub source_type: String,
    /// 구성된 소스 인스턴스
    pub source: Box<dyn DynDataSource>,
}

impl std::fmt::Debug for ConfiguredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredSource")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("source_type", &self.source_type)
            .finish_non_exhaustive()
    }
}

/// 로더 결과 — 활성 소스 목록과 복구 가능한 경고들
#[derive(Debug)]
pub struct LoadReport {
    /// 활성(can_run 통과) 소스 목록, 파일/문서 순서대로
    pub sources: Vec<ConfiguredSource>,
    /// 복구 가능한 경고 (비활성화된 소스, 건너뛴 문서)
    pub warnings: Vec<String>,
}

/// 프로세스 전역 레지스트리로 수집 설정을 로드합니다.
pub async fn load(
    settings: &AcquisitionPaths,
    metrics: MetricsLevel,
) -> Result<LoadReport, AcquisitionError> {
    load_with_registry(SourceRegistry::builtin(), settings, metrics).await
}

/// 주입된 레지스트리로 수집 설정을 로드합니다 (테스트용 주입 지점).
pub async fn load_with_registry(
    registry: &SourceRegistry,
    settings: &AcquisitionPaths,
    metrics: MetricsLevel,
) -> Result<LoadReport, AcquisitionError> {
    let files = collect_files(settings).await?;

    let mut sources = Vec::new();
    let mut warnings = Vec::new();
    let mut document_errors: Vec<(AcquisitionError, bool)> = Vec::new();

    for (path, explicit) in files {
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AcquisitionError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {e}", path.display()),
            ))
        })?;
        let path_str = path.display().to_string();
        let sources_before = sources.len();
        let errors_before = document_errors.len();
        let warnings_before = warnings.len();

        for (position, document) in split_documents(&content).into_iter().enumerate() {
            match configure_document(registry, &document, metrics) {
                Ok(None) => {}
                Ok(Some((source_type, source))) => match source.can_run() {
                    Ok(()) => {
                        info!(
                            path = %path_str,
                            position,
                            source_type = %source_type,
                            mode = %source.mode(),
                            "configured data source"
                        );
                        sources.push(ConfiguredSource {
                            path: path.clone(),
                            position,
                            source_type,
                            source,
                        });
                    }
                    Err(e) => {
                        let message = format!(
                            "{path_str} (document {position}): source '{source_type}' disabled: {e}"
                        );
                        warn!(
                            path = %path_str,
                            position,
                            source_type = %source_type,
                            error = %e,
                            "data source disabled"
                        );
                        metrics::counter!(m::ACQUISITION_SOURCES_DISABLED_TOTAL).increment(1);
                        warnings.push(message);
                    }
                },
                Err(e) => {
                    document_errors.push((e.in_document(&path_str, position), explicit));
                }
            }
        }

        // 유효 문서가 하나도 없는 파일 (빈 파일, 주석만 있는 파일)
        if sources.len() == sources_before
            && document_errors.len() == errors_before
            && warnings.len() == warnings_before
        {
            warnings.push(format!("{path_str}: no data source found, skipping"));
        }
    }

    // 명시적으로 지정된 파일의 문서 에러는 항상 치명적
    if let Some(index) = document_errors.iter().position(|(_, explicit)| *explicit) {
        return Err(document_errors.swap_remove(index).0);
    }

    if sources.is_empty() {
        // 더 구체적인 문서 에러가 NoDatasource에 가려지지 않도록 먼저 반환
        if let Some((err, _)) = document_errors.into_iter().next() {
            return Err(err);
        }
        return Err(AcquisitionError::NoDatasource);
    }

    // 활성 소스가 남아 있으면 디렉토리 항목의 문서 에러는 경고로 강등
    for (err, _) in document_errors {
        warn!(error = %err, "skipping invalid acquisition document");
        warnings.push(err.to_string());
    }

    metrics::gauge!(m::ACQUISITION_SOURCES_ACTIVE).set(sources.len() as f64);
    Ok(LoadReport { sources, warnings })
}

/// 로드할 파일 목록을 (경로, 명시 여부)로 수집합니다.
async fn collect_files(
    settings: &AcquisitionPaths,
) -> Result<Vec<(PathBuf, bool)>, AcquisitionError> {
    let mut files = Vec::new();

    if let Some(file) = &settings.config_file {
        let path = PathBuf::from(file);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push((path, true)),
            Ok(_) => {
                return Err(AcquisitionError::Io(std::io::Error::other(format!(
                    "acquisition config file {} is not a regular file",
                    path.display()
                ))));
            }
            Err(e) => {
                return Err(AcquisitionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("acquisition config file {}: {e}", path.display()),
                )));
            }
        }
    }

    if let Some(dir) = &settings.config_dir {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            AcquisitionError::Io(std::io::Error::new(
                e.kind(),
                format!("acquisition config directory {dir}: {e}"),
            ))
        })?;

        let mut dir_files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AcquisitionError::Io(std::io::Error::new(
                e.kind(),
                format!("acquisition config directory {dir}: {e}"),
            ))
        })? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_yaml && is_file {
                dir_files.push(path);
            }
        }
        dir_files.sort();
        files.extend(dir_files.into_iter().map(|path| (path, false)));
    }

    Ok(files)
}

/// 파일 내용을 `---` 구분자 기준으로 문서들로 분할합니다.
///
/// 선행 `---`는 새 문서를 만들지 않습니다 (위치 번호가 밀리지 않도록).
fn split_documents(content: &str) -> Vec<String> {
    let mut documents = vec![String::new()];
    for line in content.lines() {
        if line.trim_end() == "---" {
            documents.push(String::new());
        } else if let Some(current) = documents.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    if documents.len() > 1 && documents.first().is_some_and(|d| d.trim().is_empty()) {
        documents.remove(0);
    }
    documents
}

/// 문서 하나를 소스로 구성합니다. 빈 문서는 `Ok(None)`입니다.
fn configure_document(
    registry: &SourceRegistry,
    document: &str,
    metrics: MetricsLevel,
) -> Result<Option<(String, Box<dyn DynDataSource>)>, AcquisitionError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(document).map_err(|e| AcquisitionError::config(e.to_string()))?;

    let mapping = match value {
        serde_yaml::Value::Null => return Ok(None),
        serde_yaml::Value::Mapping(mapping) => {
            if mapping.is_empty() {
                return Ok(None);
            }
            mapping
        }
        _ => {
            return Err(AcquisitionError::config(
                "expected a mapping of configuration fields",
            ));
        }
    };

    let mut declared: Option<String> = None;
    let mut keys: Vec<String> = Vec::new();
    for (key, val) in &mapping {
        let Some(key) = key.as_str() else { continue };
        keys.push(key.to_owned());
        if key == "source" {
            match val.as_str() {
                Some(name) => declared = Some(name.to_owned()),
                None => return Err(AcquisitionError::config("'source' must be a string")),
            }
        }
    }

    let source_type = match declared {
        Some(name) => name,
        None => registry.sniff(&keys)?.to_owned(),
    };

    let mut source = registry.build(&source_type)?;
    source.configure(document, metrics)?;
    Ok(Some((source_type, source)))
}

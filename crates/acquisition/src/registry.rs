//! 소스 레지스트리 — 소스 타입 이름에서 생성자로의 매핑
//!
//! 레지스트리는 프로세스 초기화 시점에 한 번 채워지고 이후 읽기 전용입니다.
//! 빌드 시점 포함/제외는 cargo feature(`source-file`, `source-journalctl`,
//! `source-loki`)로 결정되며, 런타임 플러그인 탐색은 없습니다. 따라서
//! "이 빌드에 포함되지 않음"은 크래시가 아니라 [`AcquisitionError::NotBuilt`]
//! 라는 일급 에러 종류로 보고됩니다.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::datasource::DynDataSource;
use crate::error::AcquisitionError;

/// 소스 인스턴스를 생성하는 무인자 생성자
pub type SourceBuilder = fn() -> Box<dyn DynDataSource>;

struct RegistryEntry {
    builder: SourceBuilder,
    /// 타입 추론(sniffing)에 사용하는 시그니처 필드 목록
    signature_fields: &'static [&'static str],
}

/// 소스 타입 이름 → 생성자 매핑
pub struct SourceRegistry {
    entries: BTreeMap<&'static str, RegistryEntry>,
}

impl SourceRegistry {
    /// 빈 레지스트리를 생성합니다 (테스트용).
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 소스 타입을 등록합니다.
    pub fn register(
        &mut self,
        name: &'static str,
        signature_fields: &'static [&'static str],
        builder: SourceBuilder,
    ) {
        self.entries.insert(
            name,
            RegistryEntry {
                builder,
                signature_fields,
            },
        );
    }

    /// 이 빌드에 포함된 소스들로 채워진 프로세스 전역 레지스트리를 반환합니다.
    ///
    /// 최초 호출 시 한 번만 생성되며 이후 변경되지 않습니다.
    pub fn builtin() -> &'static SourceRegistry {
        static REGISTRY: OnceLock<SourceRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let mut registry = SourceRegistry::new();

            #[cfg(feature = "source-file")]
            registry.register("file", &["filenames"], crate::sources::file::build);

            #[cfg(feature = "source-journalctl")]
            registry.register(
                "journalctl",
                &["journalctl_filter"],
                crate::sources::journalctl::build,
            );

            #[cfg(feature = "source-loki")]
            registry.register("loki", &["query"], crate::sources::loki::build);

            registry
        })
    }

    /// 등록된 소스 타입 이름 목록을 반환합니다.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// 등록 여부를 확인합니다.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// 이름으로 소스 인스턴스를 생성합니다.
    ///
    /// 등록되지 않은 이름은 — 의도된 최소 빌드든 오타든 —
    /// [`AcquisitionError::NotBuilt`]로 실패합니다.
    pub fn build(&self, name: &str) -> Result<Box<dyn DynDataSource>, AcquisitionError> {
        match self.entries.get(name) {
            Some(entry) => Ok((entry.builder)()),
            None => Err(AcquisitionError::NotBuilt {
                name: name.to_owned(),
            }),
        }
    }

    /// 문서의 필드 이름들로 소스 타입을 추론합니다.
    ///
    /// 시그니처 필드가 존재하는 등록 타입이 정확히 하나일 때만 성공합니다.
    pub fn sniff(&self, keys: &[String]) -> Result<&'static str, AcquisitionError> {
        let candidates: Vec<&'static str> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry
                    .signature_fields
                    .iter()
                    .any(|field| keys.iter().any(|k| k == field))
            })
            .map(|(name, _)| *name)
            .collect();

        match candidates.as_slice() {
            [single] => Ok(single),
            [] => Err(AcquisitionError::config(
                "cannot infer source type: no registered source matches the document fields \
                 and no explicit 'source' key is present",
            )),
            several => Err(AcquisitionError::config(format!(
                "cannot infer source type: document fields match several sources ({})",
                several.join(", ")
            ))),
        }
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

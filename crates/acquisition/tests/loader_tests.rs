//! Acquisition config loader integration tests.
//!
//! These exercise the loader against real files in a tempdir, with a
//! registry assembled per test so that deterministic mock sources can sit
//! next to the real built-in ones.

use std::collections::HashMap;
use std::path::Path;

use logward_acquisition::datasource::{
    AcquisitionMode, DataSource, DynDataSource, MetricsLevel,
};
use logward_acquisition::error::AcquisitionError;
use logward_acquisition::loader::load_with_registry;
use logward_acquisition::registry::SourceRegistry;
use logward_acquisition::sources::file::FileSource;
use logward_core::bus::EventBus;
use logward_core::config::AcquisitionPaths;
use logward_core::supervision::Supervisor;

/// A source whose capability probe always fails, so the loader must
/// disable it with a warning instead of failing the load.
#[derive(Default)]
struct BlockedSource {
    mode: AcquisitionMode,
}

impl DataSource for BlockedSource {
    fn source_type(&self) -> &'static str {
        "blocked"
    }

    fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    fn configure(&mut self, _raw: &str, _metrics: MetricsLevel) -> Result<(), AcquisitionError> {
        Ok(())
    }

    fn configure_by_dsn(
        &mut self,
        _dsn: &str,
        _labels: HashMap<String, String>,
        _since: Option<&str>,
    ) -> Result<(), AcquisitionError> {
        Ok(())
    }

    fn can_run(&self) -> Result<(), AcquisitionError> {
        Err(AcquisitionError::Unavailable {
            reason: "required executable missing from PATH".to_owned(),
        })
    }

    async fn oneshot_acquisition(
        &mut self,
        _bus: EventBus,
        _node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        Ok(())
    }

    async fn streaming_acquisition(
        &mut self,
        _bus: EventBus,
        _node: Supervisor,
    ) -> Result<(), AcquisitionError> {
        Ok(())
    }
}

fn build_file() -> Box<dyn DynDataSource> {
    Box::new(FileSource::default())
}

fn build_blocked() -> Box<dyn DynDataSource> {
    Box::new(BlockedSource::default())
}

fn test_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register("file", &["filenames"], build_file);
    registry.register("blocked", &["blocked_marker"], build_blocked);
    registry
}

fn dir_settings(dir: &Path) -> AcquisitionPaths {
    AcquisitionPaths {
        config_file: None,
        config_dir: Some(dir.display().to_string()),
        ..AcquisitionPaths::default()
    }
}

fn file_settings(file: &Path) -> AcquisitionPaths {
    AcquisitionPaths {
        config_file: Some(file.display().to_string()),
        config_dir: None,
        ..AcquisitionPaths::default()
    }
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn explicit_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let settings = file_settings(&dir.path().join("missing.yaml"));

    let err = load_with_registry(&test_registry(), &settings, MetricsLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::Io(_)));
    assert!(err.to_string().contains("missing.yaml"));
}

#[tokio::test]
async fn unknown_field_fails_with_field_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "input.log", "hello\n");
    let config = write(
        dir.path(),
        "acquis.yaml",
        &format!(
            "source: file\nfilenames: [{}]\n---\nsource: file\nfilenames: [{}]\nfoobar: asd\n",
            log.display(),
            log.display()
        ),
    );

    let err = load_with_registry(&test_registry(), &file_settings(&config), MetricsLevel::None)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, AcquisitionError::Document { position: 1, .. }));
    assert!(msg.contains("acquis.yaml"));
    assert!(msg.contains("document 1"));
    assert!(msg.contains("foobar"));
}

#[tokio::test]
async fn empty_directory_fails_with_no_datasource() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "empty.yaml", "");
    write(dir.path(), "comments.yaml", "# only a comment\n---\n# another\n");
    write(dir.path(), "ignored.txt", "source: file\n");

    let err = load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::NoDatasource));
    assert!(err.to_string().contains("while loading acquisition config"));
}

#[tokio::test]
async fn unknown_source_type_is_not_built() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "cloud.yaml", "source: kafka\nbrokers: [localhost]\n");

    let err = load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::NotBuilt { ref name } if name == "kafka"));
    assert!(err.to_string().contains("kafka"));
}

#[tokio::test]
async fn sniffed_unknown_type_is_config_error_not_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "odd.yaml", "mystery_field: true\n");

    let err = load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::Document { .. }));
    assert!(err.to_string().contains("cannot infer source type"));
}

#[tokio::test]
async fn disabled_source_is_a_warning_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "input.log", "hello\n");
    write(
        dir.path(),
        "acquis.yaml",
        &format!(
            "source: blocked\n---\nsource: file\nfilenames: [{}]\n",
            log.display()
        ),
    );

    let report =
        load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
            .await
            .unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].source_type, "file");
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("blocked") && w.contains("disabled"))
    );
}

#[tokio::test]
async fn all_sources_disabled_fails_with_no_datasource() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "acquis.yaml", "source: blocked\n");

    let err = load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::NoDatasource));
}

#[tokio::test]
async fn bad_directory_document_is_downgraded_when_sources_remain() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "input.log", "hello\n");
    write(
        dir.path(),
        "00-good.yaml",
        &format!("source: file\nfilenames: [{}]\n", log.display()),
    );
    write(dir.path(), "10-bad.yaml", "source: file\nfoobar: 1\n");

    let report =
        load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
            .await
            .unwrap();
    assert_eq!(report.sources.len(), 1);
    assert!(report.warnings.iter().any(|w| w.contains("foobar")));
}

#[tokio::test]
async fn directory_entries_load_in_lexical_order() {
    let dir = tempfile::tempdir().unwrap();
    let log_a = write(dir.path(), "a.log", "a\n");
    let log_b = write(dir.path(), "b.log", "b\n");
    // Written in reverse order on purpose; lexical order must win.
    write(
        dir.path(),
        "10-second.yaml",
        &format!("source: file\nfilenames: [{}]\n", log_b.display()),
    );
    write(
        dir.path(),
        "00-first.yaml",
        &format!("source: file\nfilenames: [{}]\n", log_a.display()),
    );

    let report =
        load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
            .await
            .unwrap();
    assert_eq!(report.sources.len(), 2);
    assert!(
        report.sources[0]
            .path
            .file_name()
            .is_some_and(|n| n == "00-first.yaml")
    );
    assert!(
        report.sources[1]
            .path
            .file_name()
            .is_some_and(|n| n == "10-second.yaml")
    );
}

#[tokio::test]
async fn multi_document_positions_are_zero_based() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "input.log", "hello\n");
    write(
        dir.path(),
        "acquis.yaml",
        &format!(
            "source: file\nfilenames: [{log}]\n---\nsource: file\nfilenames: [{log}]\n",
            log = log.display()
        ),
    );

    let report =
        load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
            .await
            .unwrap();
    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.sources[0].position, 0);
    assert_eq!(report.sources[1].position, 1);
}

#[tokio::test]
async fn type_is_sniffed_from_signature_fields() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "input.log", "hello\n");
    // No `source:` key — filenames identifies the file source.
    write(
        dir.path(),
        "acquis.yaml",
        &format!("filenames: [{}]\nlabels:\n  type: syslog\n", log.display()),
    );

    let report =
        load_with_registry(&test_registry(), &dir_settings(dir.path()), MetricsLevel::None)
            .await
            .unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].source_type, "file");
}

//! Integration tests for stampede-config

use stampede_config::*;
use stampede_core::LogLevel;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = StampedeConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = StampedeConfig::generate_sample();
    assert!(yaml.contains("connect_timeout: 600"));

    let parsed: StampedeConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("STAMPEDE_ENVTEST_MASTER_HOST", Some("localhost")),
        ("STAMPEDE_ENVTEST_MASTER_PORT", Some("5050")),
        ("STAMPEDE_ENVTEST_EXECUTION_TIMEOUT", Some("90")),
        ("STAMPEDE_ENVTEST_LOG_LEVEL", Some("debug")),
        ("STAMPEDE_ENVTEST_SCALING", Some("in-process")),
        ("STAMPEDE_ENVTEST_WORKER_NODESELECTOR", Some("disktype=ssd;bad;disktype=hdd")),
        ("STAMPEDE_ENVTEST_WORKER_RESOURCES_LIMITS", Some("cpu=500m;memory=256Mi")),
        ("STAMPEDE_ENVTEST_WORKER_PRESERVE", Some("true")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::with_prefix("STAMPEDE_ENVTEST");
        let config = loader.from_env().unwrap();

        assert_eq!(config.master.host, "127.0.0.1");
        assert_eq!(config.master.port, 5050);
        assert_eq!(config.master.scaling, ScalingKind::InProcess);
        assert_eq!(config.execution.timeout, Duration::from_secs(90));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.kubernetes.node_selector.len(), 1);
        assert_eq!(config.kubernetes.node_selector["disktype"], "ssd");
        assert_eq!(config.kubernetes.resources_limits["memory"], "256Mi");
        assert!(config.kubernetes.preserve);
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    with_vars(vec![("STAMPEDE_BADENV_MASTER_PORT", Some("eighty"))], || {
        let err = ConfigLoader::with_prefix("STAMPEDE_BADENV").from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });
}

#[test]
fn test_config_file_loading() {
    let yaml = r#"
master:
  host: localhost
  port: 7070
  connect_timeout: 30
  worker_disconnected_behaviour: stop
  scaling: kubernetes

execution:
  timeout: 300
  teardown_grace: 10

kubernetes:
  name: load-worker
  image_name: registry.local/stampede
  image_tag: "1.4"
  node_selector:
    pool: load

logging:
  level: warn
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::with_prefix("STAMPEDE_FILETEST")
        .load(Some(file.path()))
        .unwrap();

    assert_eq!(config.master.host, "127.0.0.1");
    assert_eq!(config.master.port, 7070);
    assert_eq!(config.master.connect_timeout, Duration::from_secs(30));
    assert_eq!(
        config.master.worker_disconnected_behaviour,
        WorkerDisconnectedBehaviour::Stop
    );
    assert_eq!(config.master.scaling, ScalingKind::Kubernetes);
    assert_eq!(config.execution.teardown_grace, Duration::from_secs(10));
    assert_eq!(
        config.kubernetes.image().as_deref(),
        Some("registry.local/stampede:1.4")
    );
    assert_eq!(config.kubernetes.node_selector["pool"], "load");
    assert_eq!(config.kubernetes.pod_create_timeout, Duration::from_secs(120));
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_invalid_file_fails_validation() {
    let yaml = "execution:\n  timeout: 5\n  teardown_grace: 10\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let err = ConfigLoader::with_prefix("STAMPEDE_INVALIDTEST")
        .from_file(file.path())
        .unwrap_err();
    assert!(matches!(err, ConfigError::DomainError { ref domain, .. } if domain == "execution"));
}

#[test]
fn test_missing_file() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/stampede.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileReadError(_)));
}

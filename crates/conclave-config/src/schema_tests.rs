use super::*;

#[test]
fn test_runtime_defaults() {
    let config = Config::default();
    assert_eq!(config.runtime.max_concurrent_agents, 5);
    assert_eq!(config.runtime.default_timeout(), Duration::from_secs(300));
    assert_eq!(config.runtime.poll_interval(), Duration::from_secs(5));
    assert_eq!(config.runtime.shutdown_grace(), Duration::from_secs(5));
    assert!(config.runtime.default_provider.is_none());
}

#[test]
fn test_health_and_logging_defaults() {
    let config = Config::default();
    assert!(config.health.enabled);
    assert_eq!(config.health.interval(), Duration::from_secs(30));
    assert_eq!(config.health.probe_timeout(), Duration::from_secs(10));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file, "conclave.log");
}

#[test]
fn test_provider_kind_tag() {
    let sub: ProviderConfig = toml::from_str(
        r#"
            kind = "subprocess"
            executable = "claude"
            args = ["--stream"]
        "#,
    )
    .unwrap();
    assert_eq!(sub.kind_name(), "subprocess");

    let http: ProviderConfig = toml::from_str(
        r#"
            kind = "http"
            base_url = "https://api.example.com/v1"
            model = "gpt-4o"
        "#,
    )
    .unwrap();
    assert_eq!(http.model(), Some("gpt-4o"));
    match http {
        ProviderConfig::Http(c) => assert_eq!(c.request_timeout_seconds, 120),
        other => panic!("Expected http provider, got {:?}", other),
    }
}

#[test]
fn test_unknown_provider_kind_rejected() {
    let result: Result<ProviderConfig, _> = toml::from_str("kind = \"carrier-pigeon\"");
    assert!(result.is_err());
}

#[test]
fn test_default_provider_fallback_to_single() {
    let mut config = Config::default();
    assert!(config.default_provider().is_none());

    config.providers.insert(
        "local".to_string(),
        ProviderConfig::Subprocess(SubprocessProviderConfig {
            executable: "agent".to_string(),
            ..Default::default()
        }),
    );
    assert_eq!(config.default_provider().map(|(name, _)| name), Some("local"));

    config.runtime.default_provider = Some("missing".to_string());
    assert!(config.default_provider().is_none());
}

#[test]
fn test_logging_directory_override() {
    let logging = LoggingConfig {
        directory: Some(PathBuf::from("/var/log/conclave")),
        ..Default::default()
    };
    assert_eq!(
        logging.resolved_directory(),
        Some(PathBuf::from("/var/log/conclave"))
    );
}

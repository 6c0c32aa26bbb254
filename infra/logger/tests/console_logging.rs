use aliq_domain::config::LoggingConfig;
use aliq_logger::{Logger, LoggerError};

#[test]
fn simulator_console_logging_is_installed_once() {
    let mut config = LoggingConfig { level: "loud".to_owned(), ..LoggingConfig::default() };
    let err = Logger::from_config("aliquot-console", &config).unwrap_err();
    assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    assert!(err.to_string().contains("Unknown log level 'loud'"));

    config.level = " warn ".to_owned();
    config.filter = Some("aliq_protocol=debug".to_owned());
    let logger = Logger::from_config("aliquot-console", &config).unwrap();
    assert!(logger.guard().is_none(), "console output needs no file worker");
    tracing::debug!(target: "aliq_protocol", "filter directives reach the engine");

    // the CLI and an embedded simulator in one process cannot both own the subscriber
    let err = Logger::from_config("aliquot-embedded", &config).unwrap_err();
    assert!(matches!(err, LoggerError::Subscriber { .. }));
}

//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_url_secrets, LogFormat, LoggingConfig,
};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

// Installs the global subscriber; the only test in this binary that does.
#[test]
fn test_global_logging_forwards_to_sink_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("core_auth=debug")
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::debug!(target: "core_auth", "Below the sink level");
    tracing::info!(
        target: "core_auth",
        provider = "notion",
        api_key = "secret_abc",
        "Integration token stored"
    );
    tracing::info!(target: "core_sync", "Filtered out by directive");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Integration token stored");
        assert_eq!(entries[0].fields.get("provider").map(String::as_str), Some("notion"));
        assert_eq!(
            entries[0].fields.get("api_key").map(String::as_str),
            Some("[REDACTED]")
        );
    }

    let again = init_logging(LoggingConfig::default());
    assert!(matches!(again, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_is_rejected() {
    // Fails while building the filter, before any global state is touched.
    let result = init_logging(LoggingConfig::default().with_filter("core_auth=loud"));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_redirect_locations_are_safe_to_log() {
    let location =
        "http://localhost:8765/callback#access_token=ya29.a0&token_type=Bearer&state=s1";
    assert_eq!(strip_url_secrets(location), "http://localhost:8765/callback");

    assert_eq!(redact_if_sensitive("bearer_token", "ya29.a0"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("code_verifier", "dBjftJeZ4CVP"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("calendar_id", "primary"), "primary");
}

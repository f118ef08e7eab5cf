use anyhow::Context;

use super::logging::LogDestination;

/// Startup configuration, read once from the environment (with `.env`
/// support for development).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the dashboard API, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Organization to subscribe to at startup.
    pub org: Option<String>,
    /// Conversation to open at startup.
    pub conversation: Option<String>,
    /// Where log output goes (`BEACON_LOG`: terminal, file, or both).
    pub log_destination: LogDestination,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let base_url =
            std::env::var("BEACON_API_URL").context("BEACON_API_URL is not set")?;
        let log_destination = std::env::var("BEACON_LOG")
            .map(|value| parse_log_destination(&value))
            .unwrap_or(LogDestination::Terminal);
        Ok(Self {
            base_url,
            org: std::env::var("BEACON_ORG").ok(),
            conversation: std::env::var("BEACON_CONVERSATION").ok(),
            log_destination,
        })
    }
}

fn parse_log_destination(value: &str) -> LogDestination {
    match value.to_ascii_lowercase().as_str() {
        "file" => LogDestination::File,
        "both" => LogDestination::Both,
        _ => LogDestination::Terminal,
    }
}

//! Command-line parsing and validation.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 600;

/// CLI options for the speakterm console. Everything here is resolved before
/// the session engine is constructed.
#[derive(Debug, Parser, Clone)]
#[command(about = "Speakterm TTS console", version)]
pub struct Cli {
    /// Override the persisted config location
    #[arg(long = "config-path", env = "SPEAKTERM_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Base URL for the speech service (defaults to the built-in proxy)
    #[arg(long = "base-url", env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Speech model identifier sent with every request
    #[arg(long, env = "SPEAKTERM_TTS_MODEL", default_value = "gpt-4o-mini-tts")]
    pub model: String,

    /// Request timeout for buffered synthesis (seconds)
    #[arg(long = "timeout-secs", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Print the selectable voices and exit
    #[arg(long = "list-voices", default_value_t = false)]
    pub list_voices: bool,

    /// Install the optional virtual speaker device, then exit
    #[arg(long = "install-virtual-speaker", default_value_t = false)]
    pub install_virtual_speaker: bool,

    /// Force the virtual speaker install even if the device appears present
    #[arg(long = "force-virtual-speaker", default_value_t = false)]
    pub force_virtual_speaker: bool,

    /// Disable the durable activity log
    #[arg(long = "no-logs", env = "SPEAKTERM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Keep submitted texts out of the durable activity log
    #[arg(long = "no-log-content", env = "SPEAKTERM_NO_LOG_CONTENT", default_value_t = false)]
    pub no_log_content: bool,

    /// Write structured JSON traces to a side file
    #[arg(long = "trace", env = "SPEAKTERM_TRACE", default_value_t = false)]
    pub trace: bool,
}

impl Cli {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let cli = Self::parse();
        cli.validate()?;
        Ok(cli)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            bail!(
                "--timeout-secs must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            );
        }
        if let Some(url) = &self.base_url {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                bail!("--base-url must not be empty");
            }
            if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                bail!("--base-url must start with http:// or https://, got {trimmed:?}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cli = Cli::parse_from(["test-app"]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.model, "gpt-4o-mini-tts");
        assert_eq!(cli.timeout_secs, 60);
        // The transcript archives submitted texts unless explicitly opted out.
        assert!(!cli.no_log_content);
        assert!(!cli.no_logs);
    }

    #[test]
    fn rejects_timeout_out_of_bounds() {
        let cli = Cli::parse_from(["test-app", "--timeout-secs", "0"]);
        assert!(cli.validate().is_err());
        let cli = Cli::parse_from(["test-app", "--timeout-secs", "601"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let cli = Cli::parse_from(["test-app", "--base-url", "api.example.com"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn accepts_http_and_https_base_urls() {
        for url in ["http://localhost:8080/v1", "https://api.example.com/openai/v1"] {
            let cli = Cli::parse_from(["test-app", "--base-url", url]);
            assert!(cli.validate().is_ok(), "{url} should validate");
        }
    }
}

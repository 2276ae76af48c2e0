pub mod ansible;
pub mod cli;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_url, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "grafana-provision")]
#[command(about = "Provision the disk monitoring dashboard and alerting in Grafana")]
pub struct CliConfig {
    /// Grafana URL (e.g., http://grafana.example.com:3000)
    #[arg(long)]
    pub grafana_url: String,

    /// Grafana API key with dashboard creation permissions
    #[arg(long, env = "GRAFANA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Also create alert rules, notification template, contact point and policy route
    #[arg(long)]
    pub with_alerts: bool,

    /// Print alerting payloads and the state found in Grafana
    #[arg(long)]
    pub debug_alerts: bool,

    /// Directory containing group_vars/all.yml and host-inventory.yml
    #[arg(long, default_value = ".")]
    pub config_dir: String,

    /// Where JSON files are written when the API key lacks alerting permissions
    #[arg(long, default_value = ".")]
    pub export_dir: String,

    /// Render payloads to --export-dir without calling Grafana
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit log lines as JSON")]
    pub json_logs: bool,
}

impl ConfigProvider for CliConfig {
    fn grafana_url(&self) -> &str {
        self.grafana_url.trim_end_matches('/')
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn with_alerts(&self) -> bool {
        self.with_alerts
    }

    fn debug_alerts(&self) -> bool {
        self.debug_alerts
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("--grafana-url", &self.grafana_url)?;
        validate_non_empty_string("--api-key", &self.api_key)?;
        validate_path("--config-dir", &self.config_dir)?;
        validate_path("--export-dir", &self.export_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_required_flags() {
        let config = CliConfig::try_parse_from([
            "grafana-provision",
            "--grafana-url",
            "http://grafana.local:3000/",
            "--api-key",
            "glsa_test",
            "--with-alerts",
        ])
        .unwrap();

        assert_eq!(config.grafana_url(), "http://grafana.local:3000");
        assert!(config.with_alerts());
        assert!(!config.debug_alerts());
        assert_eq!(config.config_dir, ".");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grafana_url_is_required() {
        let result = CliConfig::try_parse_from(["grafana-provision", "--api-key", "k"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_url_fails_validation() {
        let config = CliConfig::try_parse_from([
            "grafana-provision",
            "--grafana-url",
            "grafana.local",
            "--api-key",
            "k",
        ])
        .unwrap();

        assert!(config.validate().is_err());
    }
}

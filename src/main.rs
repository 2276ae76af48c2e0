use clap::Parser;
use grafana_provision::domain::model::{AlertingOutcome, DashboardOutcome, ProvisionReport};
use grafana_provision::utils::{logger, validation::Validate};
use grafana_provision::{CliConfig, GrafanaPipeline, LocalStorage, ProvisionEngine, ProvisionError};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::debug!(
        "grafana_url={} config_dir={} export_dir={} with_alerts={} debug_alerts={} dry_run={}",
        config.grafana_url,
        config.config_dir,
        config.export_dir,
        config.with_alerts,
        config.debug_alerts,
        config.dry_run
    );

    match run(config).await {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::error!(
                "❌ Provisioning failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ Error: {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }
}

async fn run(config: CliConfig) -> Result<ProvisionReport, ProvisionError> {
    config.validate()?;

    let source = LocalStorage::new(config.config_dir.clone());
    let exports = LocalStorage::new(config.export_dir.clone());
    let pipeline = GrafanaPipeline::new(source, exports, config)?;

    ProvisionEngine::new(pipeline).run().await
}

fn print_report(report: &ProvisionReport) {
    match &report.dashboard {
        DashboardOutcome::Published { url, .. } => tracing::info!("✅ Dashboard published: {}", url),
        DashboardOutcome::Exported(path) => println!("📁 Dashboard JSON written to: {}", path),
    }

    match &report.alerting {
        AlertingOutcome::Skipped => tracing::info!("Alerting not requested (use --with-alerts)"),
        AlertingOutcome::Applied(actions) => {
            println!("✅ Alerting configured ({} objects):", actions.len());
            for action in actions {
                println!("   {:?} {} '{}'", action.outcome, action.kind, action.name);
            }
        }
        AlertingOutcome::Exported(paths) => {
            println!("📁 Alerting JSON written for manual import:");
            for path in paths {
                println!("   {}", path);
            }
        }
    }
}

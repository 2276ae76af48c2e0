use crate::domain::model::ProvisionReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

pub struct ProvisionEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ProvisionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<ProvisionReport> {
        tracing::info!("🚀 Starting Grafana provisioning");

        tracing::info!("📋 Loading configuration...");
        let inventory = self.pipeline.extract().await?;
        tracing::info!("📋 Loaded {} hosts", inventory.hosts.len());

        tracing::info!("🛠️ Rendering payloads...");
        let plan = self.pipeline.transform(inventory).await?;
        if let Some(alerting) = &plan.alerting {
            tracing::info!("🛠️ Rendered {} alert rules", alerting.rules.len());
        }

        tracing::info!("📡 Applying to Grafana...");
        let report = self.pipeline.load(plan).await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dashboard::build_dashboard;
    use crate::domain::model::{
        AlertingOutcome, DashboardOutcome, Inventory, MonitoringSettings, ProvisionPlan,
    };
    use crate::utils::error::ProvisionError;
    use std::sync::Mutex;

    struct MockPipeline {
        fail_load: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockPipeline {
        fn new(fail_load: bool) -> Self {
            Self {
                fail_load,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for MockPipeline {
        async fn extract(&self) -> Result<Inventory> {
            self.calls.lock().unwrap().push("extract");
            Ok(Inventory {
                hosts: vec!["nas01".to_string()],
                settings: MonitoringSettings::new("telegraf"),
            })
        }

        async fn transform(&self, inventory: Inventory) -> Result<ProvisionPlan> {
            self.calls.lock().unwrap().push("transform");
            Ok(ProvisionPlan {
                dashboard: build_dashboard(&inventory),
                alerting: None,
            })
        }

        async fn load(&self, _plan: ProvisionPlan) -> Result<ProvisionReport> {
            self.calls.lock().unwrap().push("load");
            if self.fail_load {
                return Err(ProvisionError::ApiError {
                    endpoint: "/api/dashboards/db".to_string(),
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(ProvisionReport {
                dashboard: DashboardOutcome::Published {
                    uid: "disk-monitoring".to_string(),
                    url: "http://grafana.local/d/disk-monitoring".to_string(),
                },
                alerting: AlertingOutcome::Skipped,
            })
        }
    }

    #[tokio::test]
    async fn test_engine_runs_steps_in_order() {
        let engine = ProvisionEngine::new(MockPipeline::new(false));
        let report = engine.run().await.unwrap();

        assert_eq!(report.alerting, AlertingOutcome::Skipped);
        assert_eq!(
            *engine.pipeline.calls.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_engine_propagates_load_error() {
        let engine = ProvisionEngine::new(MockPipeline::new(true));
        let result = engine.run().await;

        assert!(matches!(result, Err(ProvisionError::ApiError { status: 500, .. })));
    }
}

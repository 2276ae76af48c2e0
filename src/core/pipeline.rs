use crate::adapters::GrafanaClient;
use crate::config::ansible::{validate_alerting_settings, AnsibleConfigLoader};
use crate::core::alerting::build_alerting;
use crate::core::dashboard::build_dashboard;
use crate::core::reconcile::Reconciler;
use crate::domain::model::{
    AlertingOutcome, AlertingPlan, DashboardOutcome, Inventory, ProvisionPlan, ProvisionReport,
    RenderedDashboard,
};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::Validate;
use serde_json::{json, Value};

pub const DASHBOARD_EXPORT: &str = "disk-dashboard.json";
pub const RULES_EXPORT: &str = "disk-alert-rules.json";
pub const NOTIFICATIONS_EXPORT: &str = "disk-alert-notifications.json";

const DASHBOARDS: [&str; 3] = ["api", "dashboards", "db"];

pub struct GrafanaPipeline<S: Storage, C: ConfigProvider> {
    loader: AnsibleConfigLoader<S>,
    exports: S,
    config: C,
    client: GrafanaClient,
}

impl<S: Storage, C: ConfigProvider> GrafanaPipeline<S, C> {
    pub fn new(source: S, exports: S, config: C) -> Result<Self> {
        let client = GrafanaClient::new(config.grafana_url(), config.api_key())?;
        Ok(Self {
            loader: AnsibleConfigLoader::new(source),
            exports,
            config,
            client,
        })
    }

    async fn write_json(&self, path: &str, value: &Value) -> Result<String> {
        let data = serde_json::to_vec_pretty(value)?;
        self.exports.write_file(path, &data).await?;
        let location = self.exports.locate(path);
        tracing::info!("📁 Wrote {}", location);
        Ok(location)
    }

    async fn publish_dashboard(&self, dashboard: &RenderedDashboard) -> Result<(String, String)> {
        let response = self.client.post_json(&DASHBOARDS, &dashboard.payload).await?;

        let uid = response
            .get("uid")
            .and_then(Value::as_str)
            .ok_or_else(|| ProvisionError::UnexpectedResponse {
                endpoint: format!("/{}", DASHBOARDS.join("/")),
                message: "Dashboard response has no uid".to_string(),
            })?
            .to_string();
        let url = self.client.dashboard_link(&uid);

        println!("✅ Dashboard created successfully!");
        println!("   Dashboard URL: {}", url);
        Ok((uid, url))
    }

    /// 權限不足時輸出兩個 JSON 檔供手動匯入
    async fn export_alerting(
        &self,
        alerting: &AlertingPlan,
        dashboard_uid: Option<&str>,
    ) -> Result<Vec<String>> {
        let rules: Vec<Value> = alerting
            .rules
            .iter()
            .map(|rule| {
                let mut payload = rule.bind(None, dashboard_uid);
                payload["folderTitle"] = json!(alerting.folder_title);
                payload
            })
            .collect();

        let notifications = json!({
            "exported_at": chrono::Utc::now().to_rfc3339(),
            "folder": alerting.folder_title,
            "template": {
                "name": alerting.template.name,
                "template": alerting.template.body
            },
            "contact_point": alerting.contact_point.payload,
            "policy_route": alerting.route
        });

        if self.config.debug_alerts() {
            println!(
                "🔎 Exported alert rules:\n{}",
                serde_json::to_string_pretty(&rules)?
            );
        }

        Ok(vec![
            self.write_json(RULES_EXPORT, &Value::Array(rules)).await?,
            self.write_json(NOTIFICATIONS_EXPORT, &notifications).await?,
        ])
    }

    async fn export_plan(&self, plan: &ProvisionPlan) -> Result<ProvisionReport> {
        tracing::info!("🔍 DRY RUN MODE - Grafana will not be contacted");
        let dashboard_path = self
            .write_json(DASHBOARD_EXPORT, &plan.dashboard.payload)
            .await?;

        let alerting = match &plan.alerting {
            Some(alerting) => {
                AlertingOutcome::Exported(self.export_alerting(alerting, None).await?)
            }
            None => AlertingOutcome::Skipped,
        };

        Ok(ProvisionReport {
            dashboard: DashboardOutcome::Exported(dashboard_path),
            alerting,
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for GrafanaPipeline<S, C> {
    async fn extract(&self) -> Result<Inventory> {
        let inventory = self.loader.load().await?;
        inventory.settings.validate()?;
        if self.config.with_alerts() {
            validate_alerting_settings(&inventory.settings)?;
        }
        Ok(inventory)
    }

    async fn transform(&self, inventory: Inventory) -> Result<ProvisionPlan> {
        let dashboard = build_dashboard(&inventory);
        tracing::debug!(
            "Rendered dashboard with {} panels",
            dashboard.gauge_panels.len() * 3
        );

        let alerting = if self.config.with_alerts() {
            let plan = build_alerting(&inventory, &dashboard)?;
            tracing::debug!("Rendered {} alert rules", plan.rules.len());
            Some(plan)
        } else {
            None
        };

        Ok(ProvisionPlan {
            dashboard,
            alerting,
        })
    }

    async fn load(&self, plan: ProvisionPlan) -> Result<ProvisionReport> {
        if self.config.dry_run() {
            return self.export_plan(&plan).await;
        }

        let (uid, url) = self.publish_dashboard(&plan.dashboard).await?;

        let alerting = match &plan.alerting {
            None => AlertingOutcome::Skipped,
            Some(alerting) => {
                let reconciler = Reconciler::new(&self.client, self.config.debug_alerts());
                match reconciler.apply(alerting, Some(uid.as_str())).await {
                    Ok(actions) => AlertingOutcome::Applied(actions),
                    Err(e) if e.is_permission_denied() => {
                        tracing::warn!("⚠️ {}", e);
                        tracing::warn!(
                            "⚠️ API key cannot manage alerting, exporting JSON for manual import"
                        );
                        let paths = self
                            .export_alerting(alerting, Some(uid.as_str()))
                            .await?;
                        AlertingOutcome::Exported(paths)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(ProvisionReport {
            dashboard: DashboardOutcome::Published { uid, url },
            alerting,
        })
    }
}

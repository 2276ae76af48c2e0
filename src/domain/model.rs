use serde::{Deserialize, Serialize};
use std::fmt;

fn default_disk_usage_threshold() -> f64 {
    85.0
}

fn default_warning_threshold() -> f64 {
    70.0
}

fn default_high_threshold() -> f64 {
    80.0
}

fn default_datasource_uid() -> String {
    "denl7c5ccxam8a".to_string()
}

fn default_alert_folder() -> String {
    "Disk Monitoring".to_string()
}

fn default_alert_group() -> String {
    "disk-usage".to_string()
}

fn default_alert_for() -> String {
    "5m".to_string()
}

fn default_contact_point() -> String {
    "Disk Alerts".to_string()
}

fn default_notification_template() -> String {
    "disk-alerts".to_string()
}

fn default_pushover_priority() -> i64 {
    1
}

/// group_vars/all.yml 中與監控相關的設定，其餘鍵值忽略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub influxdb_database: String,
    #[serde(default = "default_disk_usage_threshold")]
    pub disk_usage_threshold: f64,
    #[serde(default = "default_warning_threshold")]
    pub disk_usage_warning_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub disk_usage_high_threshold: f64,
    #[serde(default = "default_datasource_uid")]
    pub grafana_datasource_uid: String,
    #[serde(default)]
    pub host_domain_suffix: Option<String>,
    #[serde(default = "default_alert_folder")]
    pub grafana_alert_folder: String,
    #[serde(default = "default_alert_group")]
    pub grafana_alert_group: String,
    #[serde(default = "default_alert_for")]
    pub disk_alert_for: String,
    #[serde(default = "default_contact_point")]
    pub grafana_contact_point: String,
    #[serde(default = "default_notification_template")]
    pub grafana_notification_template: String,
    #[serde(default)]
    pub pushover_user_key: Option<String>,
    #[serde(default)]
    pub pushover_api_token: Option<String>,
    #[serde(default = "default_pushover_priority")]
    pub pushover_priority: i64,
}

impl MonitoringSettings {
    pub fn new(influxdb_database: impl Into<String>) -> Self {
        Self {
            influxdb_database: influxdb_database.into(),
            disk_usage_threshold: default_disk_usage_threshold(),
            disk_usage_warning_threshold: default_warning_threshold(),
            disk_usage_high_threshold: default_high_threshold(),
            grafana_datasource_uid: default_datasource_uid(),
            host_domain_suffix: None,
            grafana_alert_folder: default_alert_folder(),
            grafana_alert_group: default_alert_group(),
            disk_alert_for: default_alert_for(),
            grafana_contact_point: default_contact_point(),
            grafana_notification_template: default_notification_template(),
            pushover_user_key: None,
            pushover_api_token: None,
            pushover_priority: default_pushover_priority(),
        }
    }
}

/// 主機清單（保留 inventory 檔案中的順序）與監控設定
#[derive(Debug, Clone)]
pub struct Inventory {
    pub hosts: Vec<String>,
    pub settings: MonitoringSettings,
}

impl Inventory {
    /// 顯示用主機名稱：去掉設定的網域後綴
    pub fn display_name(&self, host: &str) -> String {
        match &self.settings.host_domain_suffix {
            Some(suffix) if !suffix.is_empty() => host
                .strip_suffix(suffix.as_str())
                .unwrap_or(host)
                .to_string(),
            _ => host.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDashboard {
    pub payload: serde_json::Value,
    /// (host, gauge panel id)，供告警規則連結回面板
    pub gauge_panels: Vec<(String, u64)>,
}

#[derive(Debug, Clone)]
pub struct AlertRuleDraft {
    pub title: String,
    pub host: String,
    pub panel_id: u64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ContactPointDraft {
    pub name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AlertingPlan {
    pub folder_title: String,
    pub rules: Vec<AlertRuleDraft>,
    pub template: NotificationTemplate,
    pub contact_point: ContactPointDraft,
    pub route: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub dashboard: RenderedDashboard,
    pub alerting: Option<AlertingPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Folder,
    Template,
    ContactPoint,
    AlertRule,
    NotificationPolicy,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::Folder => "folder",
            ObjectKind::Template => "notification template",
            ObjectKind::ContactPoint => "contact point",
            ObjectKind::AlertRule => "alert rule",
            ObjectKind::NotificationPolicy => "notification policy",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileAction {
    pub kind: ObjectKind,
    pub name: String,
    pub outcome: ReconcileOutcome,
}

impl ReconcileAction {
    pub fn new(kind: ObjectKind, name: impl Into<String>, outcome: ReconcileOutcome) -> Self {
        Self {
            kind,
            name: name.into(),
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardOutcome {
    Published { uid: String, url: String },
    Exported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertingOutcome {
    Skipped,
    Applied(Vec<ReconcileAction>),
    /// 權限不足或 dry run 時寫出的檔案
    Exported(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub dashboard: DashboardOutcome,
    pub alerting: AlertingOutcome,
}

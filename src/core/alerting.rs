use crate::core::dashboard::threshold_value;
use crate::domain::model::{
    AlertRuleDraft, AlertingPlan, ContactPointDraft, Inventory, NotificationTemplate,
    RenderedDashboard,
};
use crate::utils::error::{ProvisionError, Result};
use serde_json::{json, Value};

pub const ALERT_TYPE_LABEL: &str = "alert_type";
pub const ALERT_TYPE_VALUE: &str = "disk_usage";

const EXPRESSION_DATASOURCE: &str = "__expr__";
const QUERY_WINDOW_SECONDS: u64 = 600;

/// 通知範本中定義的名稱
pub const TITLE_DEFINITION: &str = "disk_alerts.title";
pub const MESSAGE_DEFINITION: &str = "disk_alerts.message";

pub fn rule_title(display_name: &str) -> String {
    format!("Disk usage high: {}", display_name)
}

fn expression_datasource() -> Value {
    json!({"type": EXPRESSION_DATASOURCE, "uid": EXPRESSION_DATASOURCE})
}

fn query_step(inventory: &Inventory, host: &str) -> Value {
    let uid = &inventory.settings.grafana_datasource_uid;
    json!({
        "refId": "A",
        "relativeTimeRange": {"from": QUERY_WINDOW_SECONDS, "to": 0},
        "datasourceUid": uid,
        "model": {
            "refId": "A",
            "datasource": {"type": "influxdb", "uid": uid},
            "measurement": "disk",
            "policy": "default",
            "orderByTime": "ASC",
            "resultFormat": "time_series",
            "groupBy": [
                {"params": ["path"], "type": "tag"}
            ],
            "select": [
                [
                    {"params": ["used_percent"], "type": "field"},
                    {"params": [], "type": "last"}
                ]
            ],
            "tags": [{"key": "host", "operator": "=", "value": host}],
            "intervalMs": 1000,
            "maxDataPoints": 43200
        }
    })
}

fn reduce_step() -> Value {
    json!({
        "refId": "B",
        "relativeTimeRange": {"from": 0, "to": 0},
        "datasourceUid": EXPRESSION_DATASOURCE,
        "model": {
            "refId": "B",
            "type": "reduce",
            "expression": "A",
            "reducer": "last",
            "settings": {"mode": "dropNN"},
            "datasource": expression_datasource()
        }
    })
}

fn threshold_step(threshold: f64) -> Value {
    json!({
        "refId": "C",
        "relativeTimeRange": {"from": 0, "to": 0},
        "datasourceUid": EXPRESSION_DATASOURCE,
        "model": {
            "refId": "C",
            "type": "threshold",
            "expression": "B",
            "conditions": [
                {"evaluator": {"type": "gt", "params": [threshold_value(threshold)]}}
            ],
            "datasource": expression_datasource()
        }
    })
}

fn alert_rule(inventory: &Inventory, host: &str, panel_id: u64) -> AlertRuleDraft {
    let settings = &inventory.settings;
    let display_name = inventory.display_name(host);
    let title = rule_title(&display_name);
    let threshold = threshold_value(settings.disk_usage_threshold);

    let payload = json!({
        "title": title,
        "ruleGroup": settings.grafana_alert_group,
        "orgID": 1,
        "condition": "C",
        "data": [
            query_step(inventory, host),
            reduce_step(),
            threshold_step(settings.disk_usage_threshold)
        ],
        "noDataState": "OK",
        "execErrState": "Error",
        "for": settings.disk_alert_for,
        "isPaused": false,
        "annotations": {
            "summary": format!("Disk usage on {} is above {}%", display_name, threshold),
            "description": "Mount {{ $labels.path }} is {{ humanize $values.B.Value }}% full"
        },
        "labels": {
            ALERT_TYPE_LABEL: ALERT_TYPE_VALUE,
            "host": host
        }
    });

    AlertRuleDraft {
        title,
        host: host.to_string(),
        panel_id,
        payload,
    }
}

impl AlertRuleDraft {
    /// 套用執行時才知道的資料夾與儀表板 uid
    pub fn bind(&self, folder_uid: Option<&str>, dashboard_uid: Option<&str>) -> Value {
        let mut payload = self.payload.clone();
        if let Some(uid) = folder_uid {
            payload["folderUID"] = json!(uid);
        }
        if let Some(uid) = dashboard_uid {
            payload["annotations"]["__dashboardUid__"] = json!(uid);
            payload["annotations"]["__panelId__"] = json!(self.panel_id.to_string());
        }
        payload
    }
}

fn notification_template(name: &str) -> NotificationTemplate {
    let body = format!(
        concat!(
            "{{{{ define \"{title}\" }}}}[{{{{ .Status | toUpper }}}}] Disk usage",
            "{{{{ if eq .Status \"firing\" }}}} ({{{{ len .Alerts.Firing }}}}){{{{ end }}}}",
            "{{{{ end }}}}\n",
            "{{{{ define \"{message}\" }}}}{{{{ range .Alerts }}}}",
            "{{{{ .Labels.host }}}} {{{{ .Labels.path }}}}: {{{{ .Annotations.summary }}}}\n",
            "{{{{ end }}}}{{{{ end }}}}"
        ),
        title = TITLE_DEFINITION,
        message = MESSAGE_DEFINITION
    );

    NotificationTemplate {
        name: name.to_string(),
        body,
    }
}

fn contact_point(inventory: &Inventory) -> Result<ContactPointDraft> {
    let settings = &inventory.settings;
    let user_key = settings
        .pushover_user_key
        .as_deref()
        .ok_or_else(|| ProvisionError::MissingConfigError {
            field: "pushover_user_key".to_string(),
        })?;
    let api_token = settings
        .pushover_api_token
        .as_deref()
        .ok_or_else(|| ProvisionError::MissingConfigError {
            field: "pushover_api_token".to_string(),
        })?;

    let payload = json!({
        "name": settings.grafana_contact_point,
        "type": "pushover",
        "settings": {
            "userKey": user_key,
            "apiToken": api_token,
            "priority": settings.pushover_priority,
            "title": format!("{{{{ template \"{}\" . }}}}", TITLE_DEFINITION),
            "message": format!("{{{{ template \"{}\" . }}}}", MESSAGE_DEFINITION)
        },
        "disableResolveMessage": false
    });

    Ok(ContactPointDraft {
        name: settings.grafana_contact_point.clone(),
        payload,
    })
}

pub fn policy_route(receiver: &str) -> Value {
    json!({
        "receiver": receiver,
        "object_matchers": [[ALERT_TYPE_LABEL, "=", ALERT_TYPE_VALUE]],
        "group_by": ["alertname", "host"],
        "group_wait": "30s",
        "group_interval": "5m",
        "repeat_interval": "4h",
        "continue": false
    })
}

/// 依主機清單產生告警規則、通知範本、聯絡點與路由
pub fn build_alerting(
    inventory: &Inventory,
    dashboard: &RenderedDashboard,
) -> Result<AlertingPlan> {
    let settings = &inventory.settings;

    let rules = dashboard
        .gauge_panels
        .iter()
        .map(|(host, panel_id)| alert_rule(inventory, host, *panel_id))
        .collect();

    Ok(AlertingPlan {
        folder_title: settings.grafana_alert_folder.clone(),
        rules,
        template: notification_template(&settings.grafana_notification_template),
        contact_point: contact_point(inventory)?,
        route: policy_route(&settings.grafana_contact_point),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dashboard::build_dashboard;
    use crate::domain::model::MonitoringSettings;

    fn inventory() -> Inventory {
        let mut settings = MonitoringSettings::new("telegraf");
        settings.host_domain_suffix = Some(".example.net".to_string());
        settings.pushover_user_key = Some("user-key".to_string());
        settings.pushover_api_token = Some("app-token".to_string());
        Inventory {
            hosts: vec!["nas01.example.net".to_string(), "web01.example.net".to_string()],
            settings,
        }
    }

    #[test]
    fn test_one_rule_per_host_linked_to_gauge() {
        let inv = inventory();
        let plan = build_alerting(&inv, &build_dashboard(&inv)).unwrap();

        assert_eq!(plan.rules.len(), 2);
        assert_eq!(plan.rules[0].title, "Disk usage high: nas01");
        assert_eq!(plan.rules[0].panel_id, 2);
        assert_eq!(plan.rules[1].title, "Disk usage high: web01");
        assert_eq!(plan.rules[1].panel_id, 5);
        assert_eq!(plan.folder_title, "Disk Monitoring");
    }

    #[test]
    fn test_rule_condition_uses_critical_threshold() {
        let mut inv = inventory();
        inv.settings.disk_usage_threshold = 90.0;
        let plan = build_alerting(&inv, &build_dashboard(&inv)).unwrap();
        let rule = &plan.rules[0].payload;

        assert_eq!(rule["condition"], "C");
        assert_eq!(rule["for"], "5m");
        assert_eq!(rule["ruleGroup"], "disk-usage");
        assert_eq!(rule["data"][0]["model"]["tags"][0]["value"], "nas01.example.net");
        assert_eq!(rule["data"][2]["model"]["conditions"][0]["evaluator"]["params"][0], 90);
        assert_eq!(rule["labels"]["alert_type"], "disk_usage");
        assert_eq!(rule["labels"]["host"], "nas01.example.net");
    }

    #[test]
    fn test_bind_sets_folder_and_dashboard_link() {
        let inv = inventory();
        let plan = build_alerting(&inv, &build_dashboard(&inv)).unwrap();

        let unbound = plan.rules[1].bind(None, None);
        assert!(unbound.get("folderUID").is_none());
        assert!(unbound["annotations"].get("__dashboardUid__").is_none());

        let bound = plan.rules[1].bind(Some("folder-1"), Some("disk-monitoring"));
        assert_eq!(bound["folderUID"], "folder-1");
        assert_eq!(bound["annotations"]["__dashboardUid__"], "disk-monitoring");
        assert_eq!(bound["annotations"]["__panelId__"], "5");
    }

    #[test]
    fn test_contact_point_references_template() {
        let inv = inventory();
        let plan = build_alerting(&inv, &build_dashboard(&inv)).unwrap();
        let settings = &plan.contact_point.payload["settings"];

        assert_eq!(plan.contact_point.name, "Disk Alerts");
        assert_eq!(plan.contact_point.payload["type"], "pushover");
        assert_eq!(settings["userKey"], "user-key");
        assert_eq!(settings["title"], "{{ template \"disk_alerts.title\" . }}");
        assert!(plan
            .template
            .body
            .contains("{{ define \"disk_alerts.message\" }}"));
        assert_eq!(plan.template.name, "disk-alerts");
    }

    #[test]
    fn test_missing_pushover_credentials_fail() {
        let mut inv = inventory();
        inv.settings.pushover_api_token = None;
        let result = build_alerting(&inv, &build_dashboard(&inv));

        assert!(matches!(
            result,
            Err(ProvisionError::MissingConfigError { ref field }) if field == "pushover_api_token"
        ));
    }

    #[test]
    fn test_route_matches_alert_label() {
        let route = policy_route("Disk Alerts");
        assert_eq!(route["receiver"], "Disk Alerts");
        assert_eq!(
            route["object_matchers"],
            json!([["alert_type", "=", "disk_usage"]])
        );
    }
}

use crate::adapters::GrafanaClient;
use crate::core::alerting::{ALERT_TYPE_LABEL, ALERT_TYPE_VALUE};
use crate::domain::model::{
    AlertRuleDraft, AlertingPlan, ContactPointDraft, NotificationTemplate, ObjectKind,
    ReconcileAction, ReconcileOutcome,
};
use crate::utils::error::{ProvisionError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const FOLDERS: [&str; 2] = ["api", "folders"];
const TEMPLATES: [&str; 4] = ["api", "v1", "provisioning", "templates"];
const CONTACT_POINTS: [&str; 4] = ["api", "v1", "provisioning", "contact-points"];
const ALERT_RULES: [&str; 4] = ["api", "v1", "provisioning", "alert-rules"];
const POLICIES: [&str; 4] = ["api", "v1", "provisioning", "policies"];

/// 路由中由本工具管理的鍵，其餘保持原狀
const OWNED_ROUTE_KEYS: [&str; 7] = [
    "receiver",
    "object_matchers",
    "group_by",
    "group_wait",
    "group_interval",
    "repeat_interval",
    "continue",
];

#[derive(Debug, Deserialize)]
struct FolderSummary {
    uid: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct TemplateSummary {
    name: String,
    #[serde(default)]
    template: String,
}

#[derive(Debug, Deserialize)]
struct ContactPointSummary {
    #[serde(default)]
    uid: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlertRuleSummary {
    uid: String,
    title: String,
    #[serde(rename = "folderUID", default)]
    folder_uid: Option<String>,
}

fn parse_list<T: DeserializeOwned>(segments: &[&str], value: Value) -> Result<Vec<T>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| ProvisionError::UnexpectedResponse {
        endpoint: format!("/{}", segments.join("/")),
        message: format!("Cannot parse list: {}", e),
    })
}

fn with_segment<'a>(base: &[&'a str], extra: &'a str) -> Vec<&'a str> {
    let mut segments = base.to_vec();
    segments.push(extra);
    segments
}

fn normalize_matcher(matcher: &str) -> String {
    matcher
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .collect()
}

/// 路由的 matcher 集合恰好是 alert_type=disk_usage 時才視為本工具建立；
/// 使用者自訂的更細路由（例如再加 host 條件）不屬於我們
pub fn is_managed_route(route: &Value) -> bool {
    let expected = json!([[ALERT_TYPE_LABEL, "=", ALERT_TYPE_VALUE]]);
    let legacy = format!("{}={}", ALERT_TYPE_LABEL, ALERT_TYPE_VALUE);

    let object_matchers = route.get("object_matchers").filter(|m| !m.is_null());
    let legacy_matchers = route
        .get("matchers")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty());

    match (object_matchers, legacy_matchers) {
        (Some(matchers), None) => matchers == &expected,
        (None, Some(matchers)) => {
            matchers.len() == 1
                && matchers[0]
                    .as_str()
                    .map_or(false, |m| normalize_matcher(m) == legacy)
        }
        _ => false,
    }
}

/// 將路由併入通知政策樹：更新既有路由、移除重複、不動其他路由
pub fn merge_route(tree: &mut Value, route: &Value) -> Result<ReconcileOutcome> {
    let root = tree
        .as_object_mut()
        .ok_or_else(|| ProvisionError::UnexpectedResponse {
            endpoint: format!("/{}", POLICIES.join("/")),
            message: "Notification policy tree is not an object".to_string(),
        })?;

    let routes = root
        .entry("routes")
        .or_insert_with(|| Value::Array(Vec::new()));
    if routes.is_null() {
        *routes = Value::Array(Vec::new());
    }
    let routes = routes
        .as_array_mut()
        .ok_or_else(|| ProvisionError::UnexpectedResponse {
            endpoint: format!("/{}", POLICIES.join("/")),
            message: "Notification policy routes is not an array".to_string(),
        })?;

    let managed: Vec<usize> = routes
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_object() && is_managed_route(r))
        .map(|(index, _)| index)
        .collect();

    let Some((&first, duplicates)) = managed.split_first() else {
        routes.push(route.clone());
        return Ok(ReconcileOutcome::Created);
    };

    let mut changed = false;
    for &index in duplicates.iter().rev() {
        tracing::warn!("⚠️ Removing duplicate disk alert route at position {}", index);
        routes.remove(index);
        changed = true;
    }

    if let (Some(existing), Some(desired)) = (routes[first].as_object_mut(), route.as_object()) {
        for key in OWNED_ROUTE_KEYS {
            match desired.get(key) {
                Some(value) if existing.get(key) != Some(value) => {
                    existing.insert(key.to_string(), value.clone());
                    changed = true;
                }
                None if existing.contains_key(key) => {
                    existing.remove(key);
                    changed = true;
                }
                _ => {}
            }
        }
    }

    Ok(if changed {
        ReconcileOutcome::Updated
    } else {
        ReconcileOutcome::Unchanged
    })
}

/// 告警相關物件的 create-or-update
pub struct Reconciler<'a> {
    client: &'a GrafanaClient,
    debug: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a GrafanaClient, debug: bool) -> Self {
        Self { client, debug }
    }

    fn dump(&self, label: &str, value: &Value) {
        if self.debug {
            println!(
                "🔎 {}:\n{}",
                label,
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
    }

    fn record(&self, kind: ObjectKind, name: &str, outcome: ReconcileOutcome) -> ReconcileAction {
        match outcome {
            ReconcileOutcome::Created => tracing::info!("✅ Created {} '{}'", kind, name),
            ReconcileOutcome::Updated => tracing::info!("🔄 Updated {} '{}'", kind, name),
            ReconcileOutcome::Unchanged => {
                tracing::info!("✔️ {} '{}' already up to date", kind, name)
            }
        }
        ReconcileAction::new(kind, name, outcome)
    }

    /// 依序處理：資料夾、範本、聯絡點、規則、政策路由
    pub async fn apply(
        &self,
        plan: &AlertingPlan,
        dashboard_uid: Option<&str>,
    ) -> Result<Vec<ReconcileAction>> {
        let mut actions = Vec::new();

        let (folder_uid, folder_action) = self.ensure_folder(&plan.folder_title).await?;
        actions.push(folder_action);

        actions.push(self.upsert_template(&plan.template).await?);
        actions.push(self.upsert_contact_point(&plan.contact_point).await?);

        let existing_rules = self.existing_rules().await?;
        for rule in &plan.rules {
            actions.push(
                self.upsert_alert_rule(rule, &folder_uid, dashboard_uid, &existing_rules)
                    .await?,
            );
        }

        actions.push(self.merge_policy(&plan.route).await?);
        Ok(actions)
    }

    pub async fn ensure_folder(&self, title: &str) -> Result<(String, ReconcileAction)> {
        let folders: Vec<FolderSummary> =
            parse_list(&FOLDERS, self.client.get_json(&FOLDERS, &[]).await?)?;

        if let Some(folder) = folders.into_iter().find(|f| f.title == title) {
            tracing::debug!("Found folder '{}' ({})", folder.title, folder.uid);
            let action = self.record(ObjectKind::Folder, title, ReconcileOutcome::Unchanged);
            return Ok((folder.uid, action));
        }

        let response = self
            .client
            .post_json(&FOLDERS, &json!({"title": title}))
            .await?;
        self.dump("Folder response", &response);

        let uid = response
            .get("uid")
            .and_then(Value::as_str)
            .ok_or_else(|| ProvisionError::UnexpectedResponse {
                endpoint: format!("/{}", FOLDERS.join("/")),
                message: "Folder response has no uid".to_string(),
            })?
            .to_string();

        Ok((uid, self.record(ObjectKind::Folder, title, ReconcileOutcome::Created)))
    }

    pub async fn upsert_template(
        &self,
        template: &NotificationTemplate,
    ) -> Result<ReconcileAction> {
        let existing: Vec<TemplateSummary> =
            parse_list(&TEMPLATES, self.client.get_json(&TEMPLATES, &[]).await?)?;

        let outcome = match existing.iter().find(|t| t.name == template.name) {
            Some(current) if current.template == template.body => {
                return Ok(self.record(
                    ObjectKind::Template,
                    &template.name,
                    ReconcileOutcome::Unchanged,
                ));
            }
            Some(_) => ReconcileOutcome::Updated,
            None => ReconcileOutcome::Created,
        };

        let body = json!({"name": template.name, "template": template.body});
        self.dump("Notification template payload", &body);

        // 範本只有 PUT，建立與更新同一個端點
        let response = self
            .client
            .put_json(&with_segment(&TEMPLATES, &template.name), &body)
            .await?;
        self.dump("Notification template response", &response);

        Ok(self.record(ObjectKind::Template, &template.name, outcome))
    }

    pub async fn upsert_contact_point(&self, draft: &ContactPointDraft) -> Result<ReconcileAction> {
        let found = self
            .client
            .get_json(&CONTACT_POINTS, &[("name", draft.name.as_str())])
            .await?;
        self.dump("Existing contact points", &found);

        let matching: Vec<ContactPointSummary> =
            parse_list::<ContactPointSummary>(&CONTACT_POINTS, found)?
                .into_iter()
                .filter(|cp| cp.name == draft.name)
                .collect();

        if matching.len() > 1 {
            tracing::warn!(
                "⚠️ {} integrations share the contact point name '{}', updating the first one",
                matching.len(),
                draft.name
            );
        }

        let existing_uid = matching.into_iter().find_map(|cp| cp.uid);
        self.dump("Contact point payload", &draft.payload);

        match existing_uid {
            Some(uid) => {
                let mut body = draft.payload.clone();
                body["uid"] = json!(uid);
                let response = self
                    .client
                    .put_json(&with_segment(&CONTACT_POINTS, &uid), &body)
                    .await?;
                self.dump("Contact point response", &response);
                Ok(self.record(ObjectKind::ContactPoint, &draft.name, ReconcileOutcome::Updated))
            }
            None => {
                let response = self.client.post_json(&CONTACT_POINTS, &draft.payload).await?;
                self.dump("Contact point response", &response);
                Ok(self.record(ObjectKind::ContactPoint, &draft.name, ReconcileOutcome::Created))
            }
        }
    }

    async fn existing_rules(&self) -> Result<Vec<AlertRuleSummary>> {
        let value = self.client.get_json(&ALERT_RULES, &[]).await?;
        self.dump("Existing alert rules", &value);
        parse_list(&ALERT_RULES, value)
    }

    async fn upsert_alert_rule(
        &self,
        rule: &AlertRuleDraft,
        folder_uid: &str,
        dashboard_uid: Option<&str>,
        existing: &[AlertRuleSummary],
    ) -> Result<ReconcileAction> {
        let mut body = rule.bind(Some(folder_uid), dashboard_uid);

        let current = existing.iter().find(|r| {
            r.title == rule.title && r.folder_uid.as_deref().map_or(true, |f| f == folder_uid)
        });

        match current {
            Some(current) => {
                body["uid"] = json!(current.uid);
                self.dump(&format!("Alert rule '{}' payload", rule.title), &body);
                let response = self
                    .client
                    .put_json(&with_segment(&ALERT_RULES, &current.uid), &body)
                    .await?;
                self.dump("Alert rule response", &response);
                Ok(self.record(ObjectKind::AlertRule, &rule.title, ReconcileOutcome::Updated))
            }
            None => {
                self.dump(&format!("Alert rule '{}' payload", rule.title), &body);
                let response = self.client.post_json(&ALERT_RULES, &body).await?;
                self.dump("Alert rule response", &response);
                Ok(self.record(ObjectKind::AlertRule, &rule.title, ReconcileOutcome::Created))
            }
        }
    }

    pub async fn merge_policy(&self, route: &Value) -> Result<ReconcileAction> {
        let mut tree = self.client.get_json(&POLICIES, &[]).await?;
        self.dump("Notification policy tree (before)", &tree);

        let receiver = route
            .get("receiver")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let outcome = merge_route(&mut tree, route)?;

        if outcome != ReconcileOutcome::Unchanged {
            self.dump("Notification policy tree (after)", &tree);
            let response = self.client.put_json(&POLICIES, &tree).await?;
            self.dump("Notification policy response", &response);
        }

        Ok(self.record(ObjectKind::NotificationPolicy, &receiver, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerting::policy_route;

    fn unrelated_route() -> Value {
        json!({
            "receiver": "ops-email",
            "object_matchers": [["team", "=", "ops"]],
            "routes": [
                {"receiver": "ops-pager", "object_matchers": [["severity", "=", "critical"]]}
            ]
        })
    }

    #[test]
    fn test_merge_appends_when_absent() {
        let mut tree = json!({
            "receiver": "grafana-default-email",
            "group_by": ["grafana_folder", "alertname"],
            "routes": [unrelated_route()]
        });

        let outcome = merge_route(&mut tree, &policy_route("Disk Alerts")).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        let routes = tree["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0], unrelated_route());
        assert_eq!(routes[1]["receiver"], "Disk Alerts");
        assert_eq!(tree["receiver"], "grafana-default-email");
    }

    #[test]
    fn test_merge_creates_routes_array() {
        let mut tree = json!({"receiver": "grafana-default-email"});
        let outcome = merge_route(&mut tree, &policy_route("Disk Alerts")).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(tree["routes"].as_array().unwrap().len(), 1);

        let mut null_routes = json!({"receiver": "r", "routes": null});
        merge_route(&mut null_routes, &policy_route("Disk Alerts")).unwrap();
        assert_eq!(null_routes["routes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut tree = json!({"receiver": "grafana-default-email", "routes": [unrelated_route()]});
        let route = policy_route("Disk Alerts");

        merge_route(&mut tree, &route).unwrap();
        let after_first = tree.clone();
        let outcome = merge_route(&mut tree, &route).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(tree, after_first);
    }

    #[test]
    fn test_merge_updates_in_place_and_keeps_extra_keys() {
        let mut tree = json!({
            "receiver": "grafana-default-email",
            "routes": [
                unrelated_route(),
                {
                    "receiver": "Old Pushover",
                    "object_matchers": [["alert_type", "=", "disk_usage"]],
                    "group_wait": "1m",
                    "mute_time_intervals": ["weekends"]
                }
            ]
        });

        let outcome = merge_route(&mut tree, &policy_route("Disk Alerts")).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated);
        let managed = &tree["routes"][1];
        assert_eq!(managed["receiver"], "Disk Alerts");
        assert_eq!(managed["group_wait"], "30s");
        assert_eq!(managed["mute_time_intervals"], json!(["weekends"]));
        assert_eq!(tree["routes"][0], unrelated_route());
    }

    #[test]
    fn test_merge_removes_duplicates() {
        let route = policy_route("Disk Alerts");
        let mut tree = json!({
            "receiver": "grafana-default-email",
            "routes": [route.clone(), unrelated_route(), route.clone()]
        });

        let outcome = merge_route(&mut tree, &route).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated);
        assert_eq!(tree["routes"], json!([route, unrelated_route()]));
    }

    #[test]
    fn test_legacy_matchers_are_recognized() {
        assert!(is_managed_route(&json!({"matchers": ["alert_type = \"disk_usage\""]})));
        assert!(is_managed_route(&json!({"matchers": ["alert_type=disk_usage"]})));
        assert!(!is_managed_route(&json!({"matchers": ["alert_type=cpu"]})));
        assert!(!is_managed_route(&unrelated_route()));
    }

    #[test]
    fn test_merge_keeps_more_specific_user_route() {
        let pager = json!({
            "receiver": "oncall-pager",
            "object_matchers": [["alert_type", "=", "disk_usage"], ["host", "=", "db01"]]
        });
        let route = policy_route("Disk Alerts");
        let mut tree = json!({
            "receiver": "grafana-default-email",
            "routes": [pager.clone(), route.clone()]
        });

        let outcome = merge_route(&mut tree, &route).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(tree["routes"], json!([pager, route]));
    }

    #[test]
    fn test_merge_appends_next_to_specific_user_route() {
        let pager = json!({
            "receiver": "oncall-pager",
            "matchers": ["alert_type=disk_usage", "host=db01"]
        });
        let mut tree = json!({"receiver": "grafana-default-email", "routes": [pager.clone()]});

        let outcome = merge_route(&mut tree, &policy_route("Disk Alerts")).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(tree["routes"][0], pager);
        assert_eq!(tree["routes"][1]["receiver"], "Disk Alerts");
    }

    #[test]
    fn test_merge_rejects_non_object_tree() {
        let mut tree = json!([]);
        assert!(merge_route(&mut tree, &policy_route("Disk Alerts")).is_err());
    }
}

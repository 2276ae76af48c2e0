use crate::domain::model::{Inventory, MonitoringSettings};
use crate::domain::ports::Storage;
use crate::utils::error::{ProvisionError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, Validate,
};
use regex::Regex;
use serde_yaml::Value;

pub const GROUP_VARS_FILE: &str = "group_vars/all.yml";
pub const INVENTORY_FILE: &str = "host-inventory.yml";

/// 從 Ansible 設定目錄讀取 group vars 與 inventory
pub struct AnsibleConfigLoader<S: Storage> {
    storage: S,
}

impl<S: Storage> AnsibleConfigLoader<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn load(&self) -> Result<Inventory> {
        let group_vars = self.read_text(GROUP_VARS_FILE).await?;
        let settings = parse_group_vars(&group_vars)?;

        let inventory = self.read_text(INVENTORY_FILE).await?;
        let hosts = parse_inventory_hosts(&inventory)?;

        tracing::info!("Loaded config for database: {}", settings.influxdb_database);
        tracing::info!("Found {} hosts: {}", hosts.len(), hosts.join(", "));

        Ok(Inventory { hosts, settings })
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.storage.read_file(path).await.map_err(|e| {
            tracing::error!("❌ Cannot read {}: {}", self.storage.locate(path), e);
            e
        })?;

        String::from_utf8(bytes).map_err(|e| ProvisionError::ConfigValidationError {
            field: path.to_string(),
            message: format!("File is not valid UTF-8: {}", e),
        })
    }
}

/// 替換環境變數 (例如 ${PUSHOVER_TOKEN})，未定義的保留原樣
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProvisionError::ConfigValidationError {
        field: "env_substitution".to_string(),
        message: e.to_string(),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

pub fn parse_group_vars(content: &str) -> Result<MonitoringSettings> {
    let processed = substitute_env_vars(content)?;
    let settings: MonitoringSettings = serde_yaml::from_str(&processed)?;
    Ok(settings)
}

/// 收集 all.hosts 以及 all.children.*.hosts，依檔案順序、不重複
pub fn parse_inventory_hosts(content: &str) -> Result<Vec<String>> {
    let processed = substitute_env_vars(content)?;
    let document: Value = serde_yaml::from_str(&processed)?;

    let all = document
        .get("all")
        .ok_or_else(|| ProvisionError::MissingConfigError {
            field: format!("{}: all", INVENTORY_FILE),
        })?;

    let mut hosts = Vec::new();
    collect_group_hosts(all, "all", &mut hosts)?;

    if hosts.is_empty() {
        return Err(ProvisionError::ConfigValidationError {
            field: format!("{}: all.hosts", INVENTORY_FILE),
            message: "Inventory does not define any hosts".to_string(),
        });
    }

    Ok(hosts)
}

fn collect_group_hosts(group: &Value, path: &str, hosts: &mut Vec<String>) -> Result<()> {
    if let Some(group_hosts) = group.get("hosts").and_then(Value::as_mapping) {
        for (key, _) in group_hosts {
            let name = match key {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(ProvisionError::ConfigValidationError {
                        field: format!("{}: {}.hosts", INVENTORY_FILE, path),
                        message: format!("Unsupported host key: {:?}", other),
                    })
                }
            };
            if !hosts.contains(&name) {
                hosts.push(name);
            }
        }
    }

    if let Some(children) = group.get("children").and_then(Value::as_mapping) {
        for (child_name, child) in children {
            let child_path = format!("{}.children.{}", path, child_name.as_str().unwrap_or("?"));
            collect_group_hosts(child, &child_path, hosts)?;
        }
    }

    Ok(())
}

impl Validate for MonitoringSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("influxdb_database", &self.influxdb_database)?;
        validate_non_empty_string("grafana_datasource_uid", &self.grafana_datasource_uid)?;
        validate_range("disk_usage_threshold", self.disk_usage_threshold, 0.0, 100.0)?;
        validate_range(
            "disk_usage_warning_threshold",
            self.disk_usage_warning_threshold,
            0.0,
            100.0,
        )?;
        validate_range(
            "disk_usage_high_threshold",
            self.disk_usage_high_threshold,
            0.0,
            100.0,
        )?;

        // 儀表的色階必須遞增：warning <= high <= critical
        if self.disk_usage_warning_threshold > self.disk_usage_high_threshold
            || self.disk_usage_high_threshold > self.disk_usage_threshold
        {
            return Err(ProvisionError::ConfigValidationError {
                field: "disk_usage_warning_threshold".to_string(),
                message: format!(
                    "Thresholds must be ordered warning ({}) <= high ({}) <= critical ({})",
                    self.disk_usage_warning_threshold,
                    self.disk_usage_high_threshold,
                    self.disk_usage_threshold
                ),
            });
        }
        Ok(())
    }
}

/// 建立告警前需要的額外設定
pub fn validate_alerting_settings(settings: &MonitoringSettings) -> Result<()> {
    validate_non_empty_string("grafana_alert_folder", &settings.grafana_alert_folder)?;
    validate_non_empty_string("grafana_alert_group", &settings.grafana_alert_group)?;
    validate_non_empty_string("grafana_contact_point", &settings.grafana_contact_point)?;
    validate_non_empty_string(
        "grafana_notification_template",
        &settings.grafana_notification_template,
    )?;

    let user_key = validate_required_field("pushover_user_key", &settings.pushover_user_key)?;
    validate_non_empty_string("pushover_user_key", user_key)?;
    let api_token = validate_required_field("pushover_api_token", &settings.pushover_api_token)?;
    validate_non_empty_string("pushover_api_token", api_token)?;

    validate_range("pushover_priority", settings.pushover_priority, -2, 2)?;
    Ok(())
}

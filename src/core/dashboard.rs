use crate::domain::model::{Inventory, RenderedDashboard};
use serde_json::{json, Value};

pub const DASHBOARD_UID: &str = "disk-monitoring";
pub const DASHBOARD_TITLE: &str = "Disk Monitoring";

const HOSTS_PER_ROW: usize = 3;
const SECTION_WIDTH: u64 = 8;
const SECTION_HEIGHT: u64 = 12;

/// 整數門檻輸出為 JSON 整數，與 Grafana 匯出的格式一致
pub fn threshold_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn datasource(inventory: &Inventory) -> Value {
    json!({"type": "influxdb", "uid": inventory.settings.grafana_datasource_uid})
}

fn host_tag(host: &str) -> Value {
    json!([{"key": "host", "operator": "=", "value": host}])
}

fn header_panel(id: u64, display_name: &str, x: u64, y: u64) -> Value {
    json!({
        "id": id,
        "title": "",
        "type": "text",
        "gridPos": {"h": 2, "w": SECTION_WIDTH, "x": x, "y": y},
        "options": {
            "content": format!("**{}**", display_name),
            "mode": "markdown"
        }
    })
}

fn gauge_panel(id: u64, inventory: &Inventory, host: &str, x: u64, y: u64) -> Value {
    let settings = &inventory.settings;
    json!({
        "id": id,
        "title": "Disk Usage",
        "type": "gauge",
        "targets": [{
            "datasource": datasource(inventory),
            "groupBy": [
                {"params": ["path"], "type": "tag"}
            ],
            "measurement": "disk",
            "orderByTime": "ASC",
            "policy": "default",
            "refId": "A",
            "resultFormat": "time_series",
            "select": [
                [
                    {"params": ["used_percent"], "type": "field"},
                    {"params": [], "type": "last"},
                    {"params": ["usage"], "type": "alias"}
                ]
            ],
            "tags": host_tag(host),
            "adhocFilters": []
        }],
        "gridPos": {"h": 4, "w": SECTION_WIDTH, "x": x, "y": y + 2},
        "options": {
            "orientation": "auto",
            "reduceOptions": {
                "values": false,
                "calcs": ["lastNotNull"],
                "fields": ""
            },
            "showThresholdLabels": false,
            "showThresholdMarkers": true
        },
        "fieldConfig": {
            "defaults": {
                "color": {"mode": "thresholds"},
                "mappings": [],
                "thresholds": {
                    "steps": [
                        {"color": "green", "value": null},
                        {
                            "color": "yellow",
                            "value": threshold_value(settings.disk_usage_warning_threshold)
                        },
                        {
                            "color": "orange",
                            "value": threshold_value(settings.disk_usage_high_threshold)
                        },
                        {"color": "red", "value": threshold_value(settings.disk_usage_threshold)}
                    ]
                },
                "unit": "percent",
                "max": 100,
                "min": 0
            },
            "overrides": [
                {
                    "matcher": {"id": "byRegexp", "options": ".*"},
                    "properties": [
                        {"id": "displayName", "value": "${__field.labels.path}"}
                    ]
                }
            ]
        }
    })
}

fn gigabytes_column(field: &str, alias: &str) -> Value {
    json!([
        {"params": [field], "type": "field"},
        {"params": [], "type": "last"},
        {"params": [" / 1073741824"], "type": "math"},
        {"params": [alias], "type": "alias"}
    ])
}

fn gigabytes_override(name: &str, display_name: &str) -> Value {
    json!({
        "matcher": {"id": "byName", "options": name},
        "properties": [
            {"id": "displayName", "value": display_name},
            {"id": "unit", "value": "decgbytes"},
            {"id": "decimals", "value": 1},
            {"id": "custom.width", "value": 100}
        ]
    })
}

fn table_panel(id: u64, inventory: &Inventory, host: &str, x: u64, y: u64) -> Value {
    let settings = &inventory.settings;
    json!({
        "id": id,
        "title": "Disk Details",
        "type": "table",
        "targets": [{
            "datasource": datasource(inventory),
            "groupBy": [
                {"params": ["path"], "type": "tag"}
            ],
            "measurement": "disk",
            "orderByTime": "ASC",
            "policy": "default",
            "refId": "A",
            "resultFormat": "table",
            "select": [
                [
                    {"params": ["used_percent"], "type": "field"},
                    {"params": [], "type": "last"}
                ],
                gigabytes_column("free", "free_gb"),
                gigabytes_column("total", "total_gb")
            ],
            "tags": host_tag(host),
            "adhocFilters": []
        }],
        "gridPos": {"h": 6, "w": SECTION_WIDTH, "x": x, "y": y + 6},
        "fieldConfig": {
            "defaults": {
                "color": {"mode": "thresholds"},
                "custom": {
                    "align": "auto",
                    "cellOptions": {"type": "auto"},
                    "inspect": false
                },
                "mappings": [],
                "thresholds": {
                    "steps": [
                        {"color": "green", "value": null},
                        {
                            "color": "red",
                            "value": threshold_value(settings.disk_usage_high_threshold)
                        }
                    ]
                }
            },
            "overrides": [
                {
                    "matcher": {"id": "byName", "options": "Time"},
                    "properties": [
                        {"id": "custom.hidden", "value": true}
                    ]
                },
                {
                    "matcher": {"id": "byName", "options": "path"},
                    "properties": [
                        {"id": "displayName", "value": "Mount Point"},
                        {"id": "custom.width", "value": 120}
                    ]
                },
                {
                    "matcher": {"id": "byName", "options": "used_percent"},
                    "properties": [
                        {"id": "displayName", "value": "Used (%)"},
                        {"id": "unit", "value": "percent"},
                        {"id": "custom.cellOptions", "value": {"type": "color-background"}},
                        {"id": "thresholds", "value": {
                            "steps": [
                                {"color": "green", "value": null},
                                {
                                    "color": "yellow",
                                    "value": threshold_value(settings.disk_usage_warning_threshold)
                                },
                                {
                                    "color": "red",
                                    "value": threshold_value(settings.disk_usage_threshold)
                                }
                            ]
                        }},
                        {"id": "max", "value": 100},
                        {"id": "min", "value": 0},
                        {"id": "custom.width", "value": 80}
                    ]
                },
                gigabytes_override("free_gb", "Free (GB)"),
                gigabytes_override("total_gb", "Total (GB)")
            ]
        }
    })
}

/// 每台主機一個區塊：標題、使用率儀表、明細表，三台一列
pub fn build_dashboard(inventory: &Inventory) -> RenderedDashboard {
    let mut panels = Vec::with_capacity(inventory.hosts.len() * 3);
    let mut gauge_panels = Vec::with_capacity(inventory.hosts.len());
    let mut panel_id: u64 = 1;

    for (i, host) in inventory.hosts.iter().enumerate() {
        let row = (i / HOSTS_PER_ROW) as u64;
        let col = (i % HOSTS_PER_ROW) as u64;
        let x = col * SECTION_WIDTH;
        let y = row * SECTION_HEIGHT;

        panels.push(header_panel(panel_id, &inventory.display_name(host), x, y));
        panel_id += 1;

        panels.push(gauge_panel(panel_id, inventory, host, x, y));
        gauge_panels.push((host.clone(), panel_id));
        panel_id += 1;

        panels.push(table_panel(panel_id, inventory, host, x, y));
        panel_id += 1;
    }

    let payload = json!({
        "dashboard": {
            "id": null,
            "uid": DASHBOARD_UID,
            "title": DASHBOARD_TITLE,
            "tags": ["disk", "monitoring", "telegraf"],
            "timezone": "browser",
            "refresh": "30s",
            "time": {
                "from": "now-1h",
                "to": "now"
            },
            "timepicker": {
                "refresh_intervals": [
                    "5s", "10s", "30s", "1m", "5m", "15m", "30m", "1h", "2h", "1d"
                ]
            },
            "templating": {
                "list": []
            },
            "panels": panels
        },
        "overwrite": true
    });

    RenderedDashboard {
        payload,
        gauge_panels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MonitoringSettings;

    fn inventory(count: usize) -> Inventory {
        Inventory {
            hosts: (1..=count).map(|i| format!("host{}.example.net", i)).collect(),
            settings: MonitoringSettings::new("telegraf"),
        }
    }

    #[test]
    fn test_three_panels_per_host_with_sequential_ids() {
        let rendered = build_dashboard(&inventory(4));
        let panels = rendered.payload["dashboard"]["panels"].as_array().unwrap();

        assert_eq!(panels.len(), 12);
        for (index, panel) in panels.iter().enumerate() {
            assert_eq!(panel["id"], (index + 1) as u64);
        }
        assert_eq!(
            rendered.gauge_panels,
            vec![
                ("host1.example.net".to_string(), 2),
                ("host2.example.net".to_string(), 5),
                ("host3.example.net".to_string(), 8),
                ("host4.example.net".to_string(), 11),
            ]
        );
    }

    #[test]
    fn test_grid_wraps_after_three_hosts() {
        let rendered = build_dashboard(&inventory(5));
        let panels = rendered.payload["dashboard"]["panels"].as_array().unwrap();

        // 第四台主機的標題面板
        let fourth_header = &panels[9]["gridPos"];
        assert_eq!(fourth_header["x"], 0);
        assert_eq!(fourth_header["y"], 12);

        // 第五台主機的明細表
        let fifth_table = &panels[14]["gridPos"];
        assert_eq!(fifth_table["x"], 8);
        assert_eq!(fifth_table["y"], 18);
        assert_eq!(fifth_table["h"], 6);
    }

    #[test]
    fn test_critical_threshold_drives_red_steps() {
        let mut inv = inventory(1);
        inv.settings.disk_usage_threshold = 92.5;
        let rendered = build_dashboard(&inv);
        let panels = rendered.payload["dashboard"]["panels"].as_array().unwrap();

        let gauge_steps = &panels[1]["fieldConfig"]["defaults"]["thresholds"]["steps"];
        assert_eq!(gauge_steps[3]["color"], "red");
        assert_eq!(gauge_steps[3]["value"], 92.5);

        let used_override = &panels[2]["fieldConfig"]["overrides"][2]["properties"][3];
        assert_eq!(used_override["id"], "thresholds");
        assert_eq!(used_override["value"]["steps"][2]["value"], 92.5);
    }

    #[test]
    fn test_threshold_value_integer_formatting() {
        assert_eq!(threshold_value(85.0), json!(85));
        assert!(threshold_value(85.0).is_i64());
        assert!(threshold_value(85.5).is_f64());
    }

    #[test]
    fn test_header_uses_display_name() {
        let mut inv = inventory(1);
        inv.settings.host_domain_suffix = Some(".example.net".to_string());
        let rendered = build_dashboard(&inv);

        assert_eq!(
            rendered.payload["dashboard"]["panels"][0]["options"]["content"],
            "**host1**"
        );
        assert_eq!(
            rendered.payload["dashboard"]["panels"][1]["targets"][0]["tags"][0]["value"],
            "host1.example.net"
        );
    }
}

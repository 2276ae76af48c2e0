use grafana_provision::config::ansible::{parse_group_vars, parse_inventory_hosts};
use grafana_provision::core::dashboard::build_dashboard;
use grafana_provision::domain::model::Inventory;

const GROUP_VARS: &str = r#"
influxdb_database: telegraf
host_domain_suffix: ".cusack-ruth.name"
telegraf_interval: 10s
"#;

const INVENTORY: &str = r#"
all:
  hosts:
    nas01.cusack-ruth.name:
      ansible_host: 192.168.1.20
"#;

fn inventory() -> Inventory {
    Inventory {
        hosts: parse_inventory_hosts(INVENTORY).unwrap(),
        settings: parse_group_vars(GROUP_VARS).unwrap(),
    }
}

/// 固定輸入產生的儀表板必須與 golden file 完全一致
#[test]
fn test_dashboard_matches_golden_file() {
    let golden: serde_json::Value = serde_json::from_str(include_str!(
        "snapshots/dashboard_single_host.json"
    ))
    .unwrap();

    let rendered = build_dashboard(&inventory());

    assert_eq!(rendered.payload, golden);
}

#[test]
fn test_golden_dashboard_is_stable_across_renders() {
    let first = serde_json::to_string(&build_dashboard(&inventory()).payload).unwrap();
    let second = serde_json::to_string(&build_dashboard(&inventory()).payload).unwrap();
    assert_eq!(first, second);
}

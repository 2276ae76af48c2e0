// Adapters layer: concrete implementations for external systems.

pub mod grafana;

pub use grafana::GrafanaClient;

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::GrafanaClient;
pub use config::{cli::LocalStorage, CliConfig};
pub use core::{engine::ProvisionEngine, pipeline::GrafanaPipeline};
pub use utils::error::{ProvisionError, Result};

pub mod alerting;
pub mod dashboard;
pub mod engine;
pub mod pipeline;
pub mod reconcile;

pub use crate::domain::model::{Inventory, ProvisionPlan, ProvisionReport};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;

use crate::domain::model::{Inventory, ProvisionPlan, ProvisionReport};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 回報檔案實際位置，用於日誌與報告
    fn locate(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn grafana_url(&self) -> &str;
    fn api_key(&self) -> &str;
    fn with_alerts(&self) -> bool;
    fn debug_alerts(&self) -> bool;
    fn dry_run(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Inventory>;
    async fn transform(&self, inventory: Inventory) -> Result<ProvisionPlan>;
    async fn load(&self, plan: ProvisionPlan) -> Result<ProvisionReport>;
}

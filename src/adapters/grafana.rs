use crate::utils::error::{ProvisionError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

const PROVISIONING_PREFIX: [&str; 3] = ["api", "v1", "provisioning"];

/// Grafana HTTP API 的薄包裝：Bearer 驗證、JSON 請求、狀態碼分類
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: Url,
    display_url: String,
    api_key: String,
    client: Client,
}

impl GrafanaClient {
    pub fn new(grafana_url: &str, api_key: &str) -> Result<Self> {
        let display_url = grafana_url.trim_end_matches('/').to_string();
        let base_url =
            Url::parse(&display_url).map_err(|e| ProvisionError::InvalidConfigValueError {
                field: "--grafana-url".to_string(),
                value: grafana_url.to_string(),
                reason: format!("Invalid URL format: {}", e),
            })?;

        let client = Client::builder()
            .user_agent(concat!("grafana-provision/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            display_url,
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn dashboard_link(&self, uid: &str) -> String {
        format!("{}/d/{}", self.display_url, uid)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProvisionError::InvalidConfigValueError {
                field: "--grafana-url".to_string(),
                value: self.display_url.clone(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder, segments: &[&str]) -> RequestBuilder {
        let request = request.bearer_auth(&self.api_key);
        if segments.starts_with(&PROVISIONING_PREFIX) {
            // 允許之後在 UI 中編輯
            request.header("X-Disable-Provenance", "true")
        } else {
            request
        }
    }

    pub async fn get_json(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint(segments)?;
        let mut request = self.authorize(self.client.get(url.clone()), segments);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send("GET", &url, request).await
    }

    pub async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value> {
        let url = self.endpoint(segments)?;
        let request = self.authorize(self.client.post(url.clone()), segments).json(body);
        self.send("POST", &url, request).await
    }

    pub async fn put_json(&self, segments: &[&str], body: &Value) -> Result<Value> {
        let url = self.endpoint(segments)?;
        let request = self.authorize(self.client.put(url.clone()), segments).json(body);
        self.send("PUT", &url, request).await
    }

    async fn send(&self, method: &str, url: &Url, request: RequestBuilder) -> Result<Value> {
        let endpoint = url.path().to_string();
        tracing::debug!("📡 {} {}", method, url);

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("📡 {} {} -> {}", method, endpoint, status);

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| ProvisionError::UnexpectedResponse {
                endpoint,
                message: format!("Response is not JSON: {}", e),
            });
        }

        tracing::error!("❌ {} {} failed: {}", method, endpoint, status.as_u16());
        tracing::error!("   Response: {}", body);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ProvisionError::PermissionDenied {
                endpoint,
                status: status.as_u16(),
                body,
            })
        } else {
            Err(ProvisionError::ApiError {
                endpoint,
                status: status.as_u16(),
                body,
            })
        }
    }
}

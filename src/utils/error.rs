use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Grafana API {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Permission denied by Grafana API {endpoint} ({status}): {body}")]
    PermissionDenied {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Api,
    Permission,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProvisionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProvisionError::HttpError(_) => ErrorCategory::Network,
            ProvisionError::IoError(_) => ErrorCategory::Storage,
            ProvisionError::SerializationError(_) | ProvisionError::UnexpectedResponse { .. } => {
                ErrorCategory::Data
            }
            ProvisionError::ApiError { .. } => ErrorCategory::Api,
            ProvisionError::PermissionDenied { .. } => ErrorCategory::Permission,
            ProvisionError::YamlError(_)
            | ProvisionError::ConfigValidationError { .. }
            | ProvisionError::InvalidConfigValueError { .. }
            | ProvisionError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Permission => ErrorSeverity::Medium,
            ErrorCategory::Network | ErrorCategory::Api | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// 權限不足時改為匯出模式
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProvisionError::PermissionDenied { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check group_vars/all.yml, host-inventory.yml and the command line flags"
            }
            ErrorCategory::Network => "Verify --grafana-url is reachable from this machine",
            ErrorCategory::Api => {
                "Inspect the response body above; the payload may not match this Grafana version"
            }
            ErrorCategory::Permission => {
                "Use an API key with Admin role, or import the exported JSON files manually"
            }
            ErrorCategory::Storage => {
                "Make sure the config and export directories exist and are writable"
            }
            ErrorCategory::Data => "Grafana returned an unexpected payload; re-run with --verbose",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProvisionError::HttpError(e) => format!("Could not reach Grafana: {}", e),
            ProvisionError::ApiError {
                endpoint, status, ..
            } => format!("Grafana rejected the request to {} (HTTP {})", endpoint, status),
            ProvisionError::PermissionDenied { endpoint, .. } => {
                format!("The API key is not allowed to call {}", endpoint)
            }
            ProvisionError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

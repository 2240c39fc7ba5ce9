use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope shared by every `/api/*` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn data(data: impl Serialize) -> Self {
        Self {
            ok: true,
            message: None,
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

/// Body of the gateway's `/health` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub gateway_running: bool,
    pub gateway_pid: u32,
    pub uptime: String,
    pub config_exists: bool,
    pub binary_exists: bool,
    pub binary_path: String,
    pub config_path: String,
    pub health_port: u16,
    pub health: Option<HealthInfo>,
}

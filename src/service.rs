use crate::config::{self, ConfigError, ConfigStore};
use crate::health::HealthProbe;
use crate::log::LogRing;
use crate::paths::Paths;
use crate::process::Supervisor;
use crate::protocol::{ApiResponse, StatusView};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::fs;

/// Pause between stop and start on restart, giving the old gateway a chance
/// to exit and release its port. Not a guarantee.
pub const RESTART_SETTLE_DELAY: Duration = Duration::from_millis(1500);

const CONFIG_NOT_FOUND: &str = "Config not found. Use 'Create Default' to initialize.";

/// Operations behind the HTTP API. Every call answers with an
/// [`ApiResponse`]; nothing here fails the dashboard itself.
pub struct ControlService {
    supervisor: Supervisor,
    config: ConfigStore,
    health: HealthProbe,
    health_port: u16,
    logs: LogRing,
    restart_delay: Duration,
}

impl ControlService {
    /// Build the service for `paths`, reading the health port from the
    /// current config once.
    pub async fn new(paths: &Paths) -> Self {
        let logs = LogRing::new();
        let config = ConfigStore::new(paths.config());
        let health_port = config.health_port().await;
        let supervisor = Supervisor::new(
            paths.binary().to_path_buf(),
            paths.config().to_path_buf(),
            logs.clone(),
        );
        Self::from_parts(supervisor, health_port, logs)
    }

    /// The supervisor must share `logs` for gateway output to show up in
    /// [`logs`](Self::logs).
    pub fn from_parts(supervisor: Supervisor, health_port: u16, logs: LogRing) -> Self {
        Self {
            config: ConfigStore::new(supervisor.config_path()),
            health: HealthProbe::new(health_port),
            health_port,
            supervisor,
            logs,
            restart_delay: RESTART_SETTLE_DELAY,
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn health_port(&self) -> u16 {
        self.health_port
    }

    /// Record where the dashboard is listening and what it found on disk.
    pub async fn announce(&self, port: u16) {
        let binary = self.supervisor.binary_path();
        let binary_exists = fs::try_exists(binary).await.unwrap_or(false);
        let config_exists = self.config.exists().await;

        self.logs.push(format!("Dashboard started on port {port}"));
        self.logs.push(format!(
            "Binary: {} (exists: {binary_exists})",
            binary.display()
        ));
        self.logs.push(format!(
            "Config: {} (exists: {config_exists})",
            self.config.path().display()
        ));
        tracing::info!(
            port,
            binary = %binary.display(),
            binary_exists,
            config = %self.config.path().display(),
            config_exists,
            "dashboard started"
        );
    }

    // -----------------------------------------------------------------------
    // Status & logs
    // -----------------------------------------------------------------------

    pub async fn status_view(&self) -> StatusView {
        let gateway = self.supervisor.status().await;
        let health = if gateway.running {
            self.health.check().await
        } else {
            None
        };
        let binary = self.supervisor.binary_path();

        StatusView {
            gateway_running: gateway.running,
            gateway_pid: gateway.pid,
            uptime: gateway.uptime,
            config_exists: self.config.exists().await,
            binary_exists: fs::try_exists(binary).await.unwrap_or(false),
            binary_path: binary.display().to_string(),
            config_path: self.config.path().display().to_string(),
            health_port: self.health_port,
            health,
        }
    }

    pub async fn status(&self) -> ApiResponse {
        ApiResponse::data(self.status_view().await)
    }

    pub fn logs(&self) -> ApiResponse {
        ApiResponse::data(self.logs.lines())
    }

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    /// Raw bytes of the config file, passed through untouched.
    pub async fn get_config(&self) -> Result<Vec<u8>, ApiResponse> {
        self.config.read().await.map_err(|e| match e {
            ConfigError::NotFound(_) => ApiResponse::error(CONFIG_NOT_FOUND),
            e => ApiResponse::error(e.to_string()),
        })
    }

    pub async fn save_config(&self, body: &[u8]) -> ApiResponse {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return ApiResponse::error(format!("Invalid JSON: {e}")),
        };

        if let Err(e) = self.config.write(&parsed).await {
            tracing::error!(path = %self.config.path().display(), error = %e, "failed to save config");
            return ApiResponse::error(format!("Failed to save: {e}"));
        }

        self.logs
            .push(format!("Config saved to {}", self.config.path().display()));
        tracing::info!(path = %self.config.path().display(), "config saved");
        ApiResponse::success("Configuration saved")
    }

    pub async fn create_default_config(&self) -> ApiResponse {
        match config::bootstrap(self.supervisor.binary_path()).await {
            Ok(output) => {
                self.logs.push(format!("Onboard completed: {output}"));
                ApiResponse::success("Default configuration created")
            }
            Err(ConfigError::BinaryMissing(_)) => ApiResponse::error("PicoClaw binary not found"),
            Err(e) => {
                tracing::warn!(error = %e, "onboard failed");
                ApiResponse::error(format!("Onboard failed: {e}"))
            }
        }
    }

    pub fn validate_config(&self, body: &[u8]) -> ApiResponse {
        let parsed: Map<String, Value> = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => return ApiResponse::error(format!("Invalid JSON: {e}")),
        };

        let warnings = config::validate(&parsed);
        if warnings.is_empty() {
            ApiResponse::success("Configuration looks good!")
        } else {
            ApiResponse::success("Valid JSON with warnings").with_data(warnings)
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub async fn start(&self) -> ApiResponse {
        match self.supervisor.start().await {
            Ok(_) => ApiResponse::success("Gateway started"),
            Err(e) => {
                tracing::warn!(error = %e, "start refused");
                ApiResponse::error(e.to_string())
            }
        }
    }

    pub async fn stop(&self) -> ApiResponse {
        match self.supervisor.stop().await {
            Ok(()) => ApiResponse::success("Gateway stop signal sent"),
            Err(e) => ApiResponse::error(e.to_string()),
        }
    }

    /// Stop (ignoring "not running"), wait the settle delay, start. If the
    /// old gateway is still exiting the start reports it as already running.
    pub async fn restart(&self) -> ApiResponse {
        let _ = self.supervisor.stop().await;
        tokio::time::sleep(self.restart_delay).await;
        match self.supervisor.start().await {
            Ok(_) => ApiResponse::success("Gateway restarted"),
            Err(e) => ApiResponse::error(e.to_string()),
        }
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}

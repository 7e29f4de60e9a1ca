use std::path::PathBuf;
use std::time::Duration;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Top-level config ──────────────────────────────────────────

/// Effective process configuration, assembled by the binary from CLI
/// flags and environment variables.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Path to the YAML rule configuration.
    pub config_file: PathBuf,
    /// Events older than this are dropped before evaluation. Zero disables.
    pub discard: Duration,
    /// Bind address of the metrics HTTP server.
    pub listen_address: String,
    pub kube: KubeSettings,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("/etc/eventexporter/config.yaml"),
            discard: Duration::from_secs(60),
            listen_address: "0.0.0.0:9102".to_string(),
            kube: KubeSettings::default(),
        }
    }
}

impl ExporterConfig {
    pub fn discard_enabled(&self) -> bool {
        !self.discard.is_zero()
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  rules:       {}", self.config_file.display());
        if self.discard_enabled() {
            tracing::info!("  discard:     older than {}", humantime::format_duration(self.discard));
        } else {
            tracing::info!("  discard:     disabled");
        }
        tracing::info!("  listen:      {}", self.listen_address);
        tracing::info!(
            "  kubeconfig:  {}",
            self.kube
                .kubeconfig
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default loading rules)".to_string())
        );
        tracing::info!("  context:     {}", self.kube.context.as_deref().unwrap_or("(current)"));
        tracing::info!("  namespace:   {}", self.kube.namespace.as_deref().unwrap_or("(all)"));
    }
}

// ── Cluster access ────────────────────────────────────────────

/// Selection of cluster credentials. Everything unset means: `$KUBECONFIG`,
/// then `~/.kube/config`, then the in-cluster service account.
#[derive(Debug, Clone, Default)]
pub struct KubeSettings {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Restrict the event watch to one namespace.
    pub namespace: Option<String>,
}

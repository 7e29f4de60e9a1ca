//! eventexporter: counts Kubernetes events matching configured rules.
//!
//! Loads the rule file, registers one counter per rule, serves them on
//! `/metrics` and feeds every watched event through the rules until
//! SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use eventexporter_core::config::load_dotenv;
use eventexporter_core::{ExporterConfig, KubeSettings};
use eventexporter_rules::{load_file, AgeFilter};
use eventexporter_server::http::spawn_metrics_server;
use eventexporter_server::kube::{EventWatcher, KubeClient};
use eventexporter_server::{EventRouter, PrometheusEmitter};

// ── CLI ─────────────────────────────────────────────────────────────

/// Export Kubernetes events as Prometheus counters.
#[derive(Parser, Debug)]
#[command(name = "eventexporter", version, about)]
struct Cli {
    /// Path to the rule configuration.
    #[arg(long, env = "EVENTEXPORTER_CONFIG", default_value = "/etc/eventexporter/config.yaml")]
    config: PathBuf,

    /// Drop events last seen longer ago than this. `0s` keeps everything.
    #[arg(long, env = "EVENTEXPORTER_DISCARD", default_value = "60s", value_parser = humantime::parse_duration)]
    discard: Duration,

    /// Bind address of the metrics server.
    #[arg(long, env = "EVENTEXPORTER_LISTEN_ADDRESS", default_value = "0.0.0.0:9102")]
    listen_address: String,

    /// Kubeconfig to use instead of the default loading rules.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use.
    #[arg(long, env = "EVENTEXPORTER_CONTEXT")]
    context: Option<String>,

    /// Only watch events in this namespace.
    #[arg(long, env = "EVENTEXPORTER_NAMESPACE")]
    namespace: Option<String>,
}

impl Cli {
    fn into_config(self) -> ExporterConfig {
        ExporterConfig {
            config_file: self.config,
            discard: self.discard,
            listen_address: self.listen_address,
            kube: KubeSettings {
                kubeconfig: self.kubeconfig,
                context: self.context,
                namespace: self.namespace,
            },
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();
    config.log_summary();

    let rules = load_file(&config.config_file)
        .with_context(|| format!("loading rules from {}", config.config_file.display()))?;
    let rules = Arc::new(rules);
    let emitter = Arc::new(PrometheusEmitter::register(&rules).context("registering metrics")?);

    let client = Arc::new(KubeClient::from_settings(&config.kube).context("configuring cluster access")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (_, server) = spawn_metrics_server(&config.listen_address, emitter.clone(), shutdown_rx)
        .await
        .with_context(|| format!("binding metrics server to {}", config.listen_address))?;

    let mut router = EventRouter::new(
        rules,
        client.clone(),
        emitter,
        AgeFilter::new(config.discard),
    );
    let watcher = EventWatcher::new(client, config.kube.namespace.clone());

    info!("eventexporter started");
    let result = tokio::select! {
        result = watcher.run(&mut router) => result.context("watching events"),
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    router.drain().await;
    let _ = shutdown_tx.send(true);
    if let Err(e) = server.await {
        tracing::error!(error = %e, "metrics server task failed");
    }
    info!("eventexporter stopped");

    result
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}

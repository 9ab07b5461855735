//! # qamatch
//!
//! Binary entry point: loads settings, opens the record store, loads the
//! embedding model and runs the requested command.

#![deny(unsafe_code)]

mod import;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qamatch_embeddings::{
    BackfillOptions, Embedder, EmbeddingConfig, OnnxEmbeddingService, QaController,
};
use qamatch_settings::QaSettings;
use qamatch_server::{QaServer, ServerConfig};
use qamatch_store::{RecordRepository, RecordScope};

/// Semantic question/answer matcher.
#[derive(Parser, Debug)]
#[command(name = "qamatch", about = "Semantic question/answer matcher")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Path to the settings file (defaults to `~/.qamatch/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Encode every record whose vector is missing or malformed, then exit.
    Backfill {
        /// Restrict to one partition.
        #[arg(long)]
        partition_key: Option<String>,
    },
    /// Load records from a JSON Lines file.
    Import {
        /// File with one record object per line.
        file: PathBuf,
    },
}

impl Cli {
    fn apply_overrides(&self, settings: &mut QaSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

async fn build_controller(settings: &QaSettings, repo: RecordRepository) -> Result<QaController> {
    let config = EmbeddingConfig::from_settings(&settings.embedding);
    tracing::info!(model = %config.model, dimensions = config.dimensions, "loading embedding model");
    let service = OnnxEmbeddingService::load(config)
        .await
        .context("Failed to load embedding model")?;
    Ok(QaController::new(
        Embedder::new(Arc::new(service)),
        repo,
        BackfillOptions::from_settings(&settings.backfill),
        settings.backfill.page_size,
    ))
}

async fn serve(settings: &QaSettings, controller: QaController) -> Result<()> {
    let metrics = qamatch_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = QaServer::new(ServerConfig::from_settings(&settings.server), controller)
        .with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("qamatch listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(handle, None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(qamatch_settings::settings_path);
    let mut settings = qamatch_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply_overrides(&mut settings);

    logging::init_subscriber(&settings.logging);
    tracing::debug!(?settings.store, "settings loaded");

    let pool = qamatch_store::open(&settings.store).context("Failed to open record store")?;
    let repo = RecordRepository::new(pool);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let controller = build_controller(&settings, repo).await?;
            serve(&settings, controller).await
        }
        Command::Backfill { partition_key } => {
            let controller = build_controller(&settings, repo).await?;
            let report = controller
                .backfill(RecordScope::from_partition(partition_key))
                .await
                .context("Backfill failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Import { file } => {
            let ids = import::import_file(&repo, &file)?;
            println!("imported {} records", ids.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::parse_from(["qamatch"]);
        assert!(cli.command.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_port_overrides_settings() {
        let cli = Cli::parse_from(["qamatch", "--port", "8080"]);
        let mut settings = QaSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn cli_without_flags_keeps_settings() {
        let cli = Cli::parse_from(["qamatch", "serve"]);
        let mut settings = QaSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.port, 5000);
        assert_eq!(cli.command, Some(Command::Serve));
    }

    #[test]
    fn cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["qamatch", "serve", "--host", "127.0.0.1"]);
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn cli_backfill_partition() {
        let cli = Cli::parse_from(["qamatch", "backfill", "--partition-key", "A"]);
        assert_eq!(
            cli.command,
            Some(Command::Backfill {
                partition_key: Some("A".into())
            })
        );
    }

    #[test]
    fn cli_backfill_all() {
        let cli = Cli::parse_from(["qamatch", "backfill"]);
        assert_eq!(
            cli.command,
            Some(Command::Backfill {
                partition_key: None
            })
        );
    }

    #[test]
    fn cli_import_file() {
        let cli = Cli::parse_from(["qamatch", "import", "records.jsonl"]);
        assert_eq!(
            cli.command,
            Some(Command::Import {
                file: PathBuf::from("records.jsonl")
            })
        );
    }

    #[test]
    fn cli_settings_path() {
        let cli = Cli::parse_from(["qamatch", "--settings", "/tmp/qa.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/qa.json")));
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["qamatch", "frobnicate"]).is_err());
    }
}

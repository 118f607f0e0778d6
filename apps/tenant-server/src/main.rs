//! Tenant service server binary.
//!
//! ```bash
//! tenant-server --config config/tenant-service.yaml serve
//! TENANT_SERVICE_DATABASE__DSN=postgres://tenants@db/tenants tenant-server
//! tenant-server --config config/tenant-service.yaml check-model
//! ```

mod bootstrap;
mod config;
mod logging;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "tenant-server", version, about = "Tenant service")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    #[default]
    Serve,
    /// Check that the authorization store runs the expected model, then exit.
    CheckModel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        cfg.logging.level = level;
    }
    logging::init(&cfg.logging);

    let result = match cli.command.unwrap_or_default() {
        Command::Serve => bootstrap::serve(&cfg).await,
        Command::CheckModel => bootstrap::check_model(&cfg).await,
    };
    if let Err(e) = &result {
        tracing::error!(error = ?e, "tenant service failed");
    }
    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["tenant-server", "--log-level", "debug"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli =
            Cli::try_parse_from(["tenant-server", "check-model", "--config", "c.yaml"]).unwrap();

        assert!(matches!(cli.command, Some(Command::CheckModel)));
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
    }
}

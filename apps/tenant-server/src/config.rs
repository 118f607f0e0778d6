//! Layered server configuration: serde defaults, then an optional YAML file,
//! then `TENANT_SERVICE_*` environment variables.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use tenant_authz::OpenFgaConfig;
use tenant_db::DbConfig;
use tenants::{KratosConfig, TenantsConfig};

/// Environment prefix; nested keys are separated by `__`,
/// e.g. `TENANT_SERVICE_DATABASE__DSN`.
pub const ENV_PREFIX: &str = "TENANT_SERVICE_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub authorization: OpenFgaConfig,
    pub identity: KratosConfig,
    pub tenants: TenantsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,

    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `path` (if given) and the environment.
    ///
    /// # Errors
    /// Missing config file, or a value that does not fit the schema.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::from_figment(Self::figment(path)?.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        Ok(figment)
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment
            .extract()
            .context("failed to load configuration")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_without_sources() {
        let cfg = AppConfig::from_figment(AppConfig::figment(None).unwrap()).unwrap();

        assert_eq!(cfg.server.bind_addr.port(), 8080);
        assert!(!cfg.authorization.enabled);
        assert!(cfg.database.auto_migrate);
        assert_eq!(cfg.tenants.invitation_lifetime, Duration::from_secs(24 * 60 * 60));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r"
server:
  bind_addr: 127.0.0.1:9000
database:
  dsn: postgres://tenants@db/tenants
  tx_timeout: 15s
authorization:
  enabled: true
  store_id: store1
  api_token: s3cret
identity:
  admin_url: http://kratos:4434
tenants:
  invitation_lifetime: 2h
logging:
  json: true
"
        )
        .unwrap();

        let cfg = AppConfig::from_figment(AppConfig::figment(Some(file.path())).unwrap()).unwrap();

        assert_eq!(cfg.server.bind_addr.port(), 9000);
        assert_eq!(cfg.database.dsn, "postgres://tenants@db/tenants");
        assert_eq!(cfg.database.tx_timeout, Duration::from_secs(15));
        assert_eq!(cfg.database.max_conns, DbConfig::default().max_conns);
        assert!(cfg.authorization.enabled);
        assert!(cfg.authorization.api_token.is_some());
        assert_eq!(cfg.identity.admin_url, "http://kratos:4434");
        assert_eq!(cfg.tenants.invitation_lifetime, Duration::from_secs(2 * 60 * 60));
        assert!(cfg.logging.json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let figment = Figment::new().merge(Yaml::string("server:\n  port: 1\n"));

        assert!(AppConfig::from_figment(figment).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(AppConfig::figment(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}

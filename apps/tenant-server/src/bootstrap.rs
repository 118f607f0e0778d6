//! Wires the stores, clients and service together and runs the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use tenant_authz::{Authorizer, tuple_store_from_config};
use tenant_db::Db;
use tenants::{KratosClient, Migrator, SeaOrmTenantsRepository, Service};

use crate::config::AppConfig;
use crate::shutdown::shutdown_signal;

/// Builds the authorizer and, when authorization is enabled, checks that the
/// store runs the expected model.
async fn authorizer(cfg: &AppConfig) -> anyhow::Result<Arc<Authorizer>> {
    let store = tuple_store_from_config(&cfg.authorization)
        .context("failed to configure the authorization store")?;
    let authz = Authorizer::new(store).context("failed to load the embedded authorization model")?;
    if cfg.authorization.enabled {
        authz
            .validate_model()
            .await
            .context("authorization model validation failed")?;
    }
    Ok(Arc::new(authz))
}

/// Runs migrations if enabled, validates the authorization model and serves
/// HTTP until a shutdown signal arrives.
///
/// # Errors
/// Any startup failure, or the server failing while running.
pub async fn serve(cfg: &AppConfig) -> anyhow::Result<()> {
    let db = Db::connect(&cfg.database)
        .await
        .context("failed to connect to the database")?;
    if cfg.database.auto_migrate {
        db.migrate::<Migrator>()
            .await
            .context("failed to apply database migrations")?;
        tracing::info!("database migrations applied");
    }

    let authz = authorizer(cfg).await?;
    let identities = Arc::new(
        KratosClient::new(&cfg.identity).context("failed to configure the Kratos client")?,
    );
    let service = Arc::new(Service::new(
        Arc::new(SeaOrmTenantsRepository::new()),
        authz,
        identities,
        cfg.tenants.clone(),
    ));

    let app = tenants::router(db, service);
    let listener = tokio::net::TcpListener::bind(cfg.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind_addr))?;
    tracing::info!(addr = %cfg.server.bind_addr, "tenant service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("tenant service stopped");
    Ok(())
}

/// Validates the authorization model and exits.
///
/// # Errors
/// Store failure or a model mismatch.
pub async fn check_model(cfg: &AppConfig) -> anyhow::Result<()> {
    if !cfg.authorization.enabled {
        tracing::warn!("authorization is disabled; nothing to check");
        return Ok(());
    }
    authorizer(cfg).await?;
    Ok(())
}

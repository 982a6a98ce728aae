//! Bootstrap: open every configured backend and build the session.

use crate::config::ProxyConfig;
use crate::db::{NativeConnection, SqlxConnection};
use crate::error::{DbResult, RouterError, RouterResult};
use crate::models::BackendConfig;
use crate::router::backend::Backend;
use crate::router::registry::Registry;
use crate::router::session::RoutedSession;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Opens the native connection for one configured backend.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &BackendConfig) -> DbResult<Box<dyn NativeConnection>>;
}

/// Connects through sqlx, one dedicated connection per backend.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    pub connect_timeout: Duration,
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, config: &BackendConfig) -> DbResult<Box<dyn NativeConnection>> {
        let conn = SqlxConnection::connect(config, self.connect_timeout).await?;
        Ok(Box::new(conn))
    }
}

/// Connect every backend in configuration order and build the registry.
///
/// Names are checked before anything is opened. If a connection fails, every
/// backend opened so far is closed before the error is returned.
pub async fn load_registry(config: &ProxyConfig, connector: &dyn Connector) -> RouterResult<Registry> {
    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            return Err(RouterError::DuplicateBackend {
                name: backend.name.clone(),
            });
        }
    }

    let mut opened: Vec<Backend> = Vec::with_capacity(config.backends.len());
    for backend_config in &config.backends {
        let built = match connector.connect(backend_config).await {
            Ok(conn) => Backend::with_pattern(&backend_config.name, &backend_config.pattern, conn),
            Err(e) => Err(RouterError::backend(&backend_config.name, e)),
        };
        match built {
            Ok(backend) => opened.push(backend),
            Err(err) => {
                warn!(
                    backend = %backend_config.name,
                    error = %err,
                    opened = opened.len(),
                    "Backend setup failed, closing opened backends"
                );
                for backend in opened.iter_mut() {
                    if let Err(e) = backend.connection().close().await {
                        warn!(backend = %backend.name(), error = %e, "Failed to close backend");
                    }
                }
                return Err(err);
            }
        }
    }

    Registry::build(opened, config.default.as_deref()).await
}

/// Load the configured backends and open a routed session over them.
pub async fn open_session(config: &ProxyConfig, connector: &dyn Connector) -> RouterResult<RoutedSession> {
    let registry = load_registry(config, connector).await?;
    info!(backends = ?registry.names(), "Routed session opened");
    Ok(RoutedSession::new(registry))
}

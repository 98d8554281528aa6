use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};

use crate::configuration::config::Config;
use crate::configuration::types::{StorageBackend, StorageConfig};
use crate::error_handling::types::*;
use crate::session_management::registry::SegmenterRegistry;
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::web_interface::{ApiContext, WebServer};

/// Owns every long-lived component of the service.
///
/// # Fields Overview
///
/// - `config`: the validated configuration the controller was built from
/// - `storage`: the backend selected by `config.storage`
/// - `registry`: per-(wall, author) segmentation workers
/// - `web_server`: the HTTP interface feeding the registry
pub struct Controller {
    pub config: Config,
    storage: Arc<dyn Storage>,
    registry: Arc<SegmenterRegistry>,
    web_server: WebServer,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;

        let storage = Self::build_storage(&config.storage)?;
        let registry = Arc::new(SegmenterRegistry::new(
            config.segmenter.clone(),
            storage.clone(),
        ));

        let ip: IpAddr = config.server.bind_address.parse().map_err(|_| {
            ConfigError::BadIPFormatting(config.server.bind_address.clone())
        })?;
        let addr = SocketAddr::new(ip, config.server.port);
        let web_server = WebServer::new(ApiContext::new(storage.clone(), registry.clone()), addr);

        Ok(Self {
            config,
            storage,
            registry,
            web_server,
        })
    }

    pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, ControllerError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage, nothing will survive a restart");
                Ok(Arc::new(MemoryStorage::new()))
            }
            StorageBackend::File => {
                let storage = FileStorage::new(&config.path).map_err(|e| {
                    error!("Unable to open storage at {}: {}", config.path.display(), e);
                    e
                })?;
                info!("Using file storage at {}", storage.base_path().display());
                Ok(Arc::new(storage))
            }
        }
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn registry(&self) -> Arc<SegmenterRegistry> {
        self.registry.clone()
    }

    pub fn addr(&self) -> SocketAddr {
        self.web_server.addr()
    }

    /// Serves HTTP until Ctrl-C, then tears every worker down.
    pub async fn run(&self) -> Result<(), ControllerError> {
        info!("Controller running");
        let outcome = tokio::select! {
            _ = self.web_server.start() => {
                warn!("Web interface stopped on its own");
                Ok(())
            }
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!("Ctrl-C received, shutting down");
                    Ok(())
                }
                Err(e) => Err(ControllerError::InitializationFailed(format!(
                    "unable to listen for Ctrl-C: {}",
                    e
                ))),
            },
        };
        self.shutdown().await;
        outcome
    }

    /// Stops every worker. Open sessions are dropped without being finalized.
    pub async fn shutdown(&self) {
        info!("Shutting down the controller");
        self.registry.shutdown_all().await;
    }
}

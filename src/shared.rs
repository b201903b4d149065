//! Shared Client Module
//!
//! One store client per process, created explicitly with [`init_shared`] or
//! on first use by [`shared_client`], and released by [`shutdown_shared`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::client::StoreClient;
use crate::config::Config;
use crate::error::Result;

static SHARED: Mutex<Option<Arc<StoreClient>>> = Mutex::const_new(None);

/// Connects the process-wide client from `config`.
///
/// If a client is already running it is returned unchanged.
pub async fn init_shared(config: &Config) -> Result<Arc<StoreClient>> {
    let mut slot = SHARED.lock().await;
    if let Some(client) = slot.as_ref() {
        return Ok(Arc::clone(client));
    }

    let client = match StoreClient::connect(config).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Impossible to instantiate a store client: {}", e);
            return Err(e);
        }
    };
    info!(backend = ?config.backend, "Shared store client initialized");
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Returns the process-wide client, connecting it with [`Config::load`] on first use.
pub async fn shared_client() -> Result<Arc<StoreClient>> {
    {
        let slot = SHARED.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }
    }
    init_shared(&Config::load()?).await
}

/// Shuts the process-wide client down. A later call to [`shared_client`]
/// connects a fresh one.
pub async fn shutdown_shared() -> Result<()> {
    let client = SHARED.lock().await.take();
    if let Some(client) = client {
        client.shutdown().await?;
        info!("Shared store client shut down");
    }
    Ok(())
}

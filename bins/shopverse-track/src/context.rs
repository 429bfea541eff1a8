//! Wiring shared by the commands

use shopverse_api_client::{ClientConfig, DirectionsApi, DirectionsClientConfig, ShopverseClient};
use shopverse_core::config::Config;
use shopverse_core::Result;
use shopverse_crypto::SealingKey;
use shopverse_tracking::backend::SupabaseAuthBackend;
use shopverse_tracking::route::{RouteEngine, RouteEngineConfig};
use shopverse_tracking::storage::EncryptedFileStorage;
use shopverse_tracking::token_store::TokenStore;
use shopverse_tracking::{SessionManager, TrackingError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const KEY_FILE: &str = "master.key";
const CREDENTIALS_FILE: &str = "credentials.sealed";
const CREDENTIALS_AAD: &[u8] = b"shopverse-track/credentials/v1";

pub struct AppContext {
    pub config: Config,
    pub storage_dir: PathBuf,
    pub key_fingerprint: String,
    pub client: ShopverseClient,
    pub auth: SupabaseAuthBackend,
    pub session: Arc<SessionManager>,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path)?;
        let storage_dir = config.schema.storage.resolve_dir();

        let key = SealingKey::load_or_create(&storage_dir.join(KEY_FILE)).map_err(TrackingError::from)?;
        let key_fingerprint = key.fingerprint();
        let storage = EncryptedFileStorage::new(storage_dir.join(CREDENTIALS_FILE), key, CREDENTIALS_AAD);

        let client = ShopverseClient::with_config(ClientConfig::from_backend(&config.schema.backend))
            .map_err(TrackingError::from)?;
        let auth = SupabaseAuthBackend::new(client.clone());
        let session = SessionManager::new(TokenStore::new(Arc::new(storage)), Arc::new(auth.clone()));

        debug!(
            storage = %storage_dir.display(),
            backend = %client.base_url(),
            fingerprint = %key_fingerprint,
            "Context ready"
        );

        Ok(Self {
            config,
            storage_dir,
            key_fingerprint,
            client,
            auth,
            session: Arc::new(session),
        })
    }

    pub fn route_engine(&self) -> Result<Arc<RouteEngine>> {
        let directions = DirectionsApi::new(DirectionsClientConfig::from_directions(&self.config.schema.directions))
            .map_err(TrackingError::from)?;
        Ok(Arc::new(RouteEngine::new(
            Arc::new(directions),
            RouteEngineConfig::from(&self.config.schema.route),
        )))
    }
}

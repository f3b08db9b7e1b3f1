//! Recovery-vault adapter over the backup-management REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use opswarden_application::{ProtectedItem, RecoveryVault, RecoveryVaults};
use opswarden_core::{AppError, AppResult, NonEmptyString};

const VAULTS_API_VERSION: &str = "2024-04-01";
const BACKUP_ITEMS_API_VERSION: &str = "2024-04-01";

/// Recovery-vault adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpRecoveryVaultsConfig {
    /// Base URL of the resource-manager API.
    pub base_url: Url,
    /// Pre-acquired bearer token for the run.
    pub bearer_token: NonEmptyString,
}

/// Backup-management client for vault and protected-item enumeration.
#[derive(Clone)]
pub struct HttpRecoveryVaults {
    http_client: reqwest::Client,
    config: HttpRecoveryVaultsConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VaultResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProtectedItemResponse {
    properties: ProtectedItemProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtectedItemProperties {
    source_resource_id: Option<String>,
}

impl HttpRecoveryVaults {
    /// Creates a new backup-management client.
    pub fn new(config: HttpRecoveryVaultsConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|error| {
                AppError::Setup(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    async fn get_list<T>(&self, path: &str) -> AppResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}/{path}")).map_err(|error| {
            AppError::Query(format!("invalid backup endpoint '{path}': {error}"))
        })?;

        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(self.config.bearer_token.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to call backup management API: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Query(format!(
                "backup management API returned status {} for {url}: {body}",
                status.as_u16()
            )));
        }

        let listing = response.json::<ListResponse<T>>().await.map_err(|error| {
            AppError::Query(format!("failed to parse backup listing: {error}"))
        })?;

        Ok(listing.value)
    }
}

#[async_trait]
impl RecoveryVaults for HttpRecoveryVaults {
    async fn list_vaults(&self, subscription_id: &str) -> AppResult<Vec<RecoveryVault>> {
        let vaults: Vec<VaultResponse> = self
            .get_list(&format!(
                "subscriptions/{subscription_id}/providers/Microsoft.RecoveryServices/vaults?api-version={VAULTS_API_VERSION}"
            ))
            .await?;

        Ok(vaults
            .into_iter()
            .map(|vault| RecoveryVault {
                id: vault.id,
                name: vault.name,
            })
            .collect())
    }

    async fn list_protected_items(&self, vault: &RecoveryVault) -> AppResult<Vec<ProtectedItem>> {
        // Vault ids are absolute resource paths; strip the leading slash so
        // the join keeps the base path.
        let vault_path = vault.id.trim_start_matches('/');
        let items: Vec<ProtectedItemResponse> = self
            .get_list(&format!(
                "{vault_path}/backupProtectedItems?api-version={BACKUP_ITEMS_API_VERSION}"
            ))
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.properties.source_resource_id)
            .map(|source_resource_id| ProtectedItem { source_resource_id })
            .collect())
    }
}

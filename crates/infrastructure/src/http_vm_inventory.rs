//! VM inventory adapter over the cloud resource-manager REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use opswarden_application::{Subscription, VirtualMachine, VmInventory};
use opswarden_core::{AppError, AppResult, NonEmptyString};

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const COMPUTE_API_VERSION: &str = "2024-07-01";

/// VM inventory adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpVmInventoryConfig {
    /// Base URL of the resource-manager API.
    pub base_url: Url,
    /// Pre-acquired bearer token for the run.
    pub bearer_token: NonEmptyString,
}

/// Resource-manager client for subscription and VM enumeration.
#[derive(Clone)]
pub struct HttpVmInventory {
    http_client: reqwest::Client,
    config: HttpVmInventoryConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    subscription_id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct VirtualMachineResponse {
    id: String,
    name: String,
    location: String,
}

/// Extracts the resource-group segment from a full resource identifier.
fn resource_group_from_id(resource_id: &str) -> String {
    let segments: Vec<&str> = resource_id.split('/').collect();
    segments
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("resourceGroups"))
        .map(|pair| pair[1].to_owned())
        .unwrap_or_default()
}

impl HttpVmInventory {
    /// Creates a new resource-manager client.
    pub fn new(config: HttpVmInventoryConfig) -> AppResult<Self> {
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
            AppError::Query(format!("invalid resource-manager endpoint '{path}': {error}"))
        })?;

        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(self.config.bearer_token.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to call resource manager: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Query(format!(
                "resource manager returned status {} for {url}: {body}",
                status.as_u16()
            )));
        }

        let listing = response.json::<ListResponse<T>>().await.map_err(|error| {
            AppError::Query(format!("failed to parse resource listing: {error}"))
        })?;

        Ok(listing.value)
    }
}

#[async_trait]
impl VmInventory for HttpVmInventory {
    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        let subscriptions: Vec<SubscriptionResponse> = self
            .get_list(&format!(
                "subscriptions?api-version={SUBSCRIPTIONS_API_VERSION}"
            ))
            .await?;

        Ok(subscriptions
            .into_iter()
            .map(|subscription| Subscription {
                id: subscription.subscription_id,
                display_name: subscription.display_name,
            })
            .collect())
    }

    async fn list_virtual_machines(
        &self,
        subscription_id: &str,
    ) -> AppResult<Vec<VirtualMachine>> {
        let machines: Vec<VirtualMachineResponse> = self
            .get_list(&format!(
                "subscriptions/{subscription_id}/providers/Microsoft.Compute/virtualMachines?api-version={COMPUTE_API_VERSION}"
            ))
            .await?;

        Ok(machines
            .into_iter()
            .map(|machine| VirtualMachine {
                resource_group: resource_group_from_id(&machine.id),
                name: machine.name,
                location: machine.location,
                resource_id: machine.id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_is_extracted_from_resource_id() {
        let id = "/subscriptions/0000/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm-1";
        assert_eq!(resource_group_from_id(id), "rg-app");
    }

    #[test]
    fn resource_group_extraction_is_case_insensitive() {
        let id = "/subscriptions/0000/resourcegroups/RG-App/providers/Microsoft.Compute/virtualMachines/vm-1";
        assert_eq!(resource_group_from_id(id), "RG-App");
    }

    #[test]
    fn malformed_resource_id_yields_empty_group() {
        assert_eq!(resource_group_from_id("not-a-resource-id"), "");
    }

    #[test]
    fn vm_response_parses_resource_payload() {
        let payload = serde_json::json!({
            "value": [
                {
                    "id": "/subscriptions/0000/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm-1",
                    "name": "vm-1",
                    "location": "westeurope"
                }
            ]
        });

        let listing: Result<ListResponse<VirtualMachineResponse>, _> =
            serde_json::from_value(payload);
        let listing = listing.unwrap_or_else(|_| panic!("payload parses"));
        assert_eq!(listing.value[0].name, "vm-1");
    }
}

//! Ports onto the cloud VM inventory and backup-vault APIs.

use async_trait::async_trait;

use opswarden_core::AppResult;

/// Subscription visible to the scanning credential.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Subscription identifier used in resource paths.
    pub id: String,
    /// Human-readable subscription name.
    pub display_name: String,
}

/// Virtual machine as listed by the inventory API.
#[derive(Debug, Clone)]
pub struct VirtualMachine {
    /// VM name.
    pub name: String,
    /// Resource group containing the VM.
    pub resource_group: String,
    /// Region the VM is deployed in.
    pub location: String,
    /// Full resource identifier, matched against protected-item sources.
    pub resource_id: String,
}

/// Recovery vault that may hold protected-item records.
#[derive(Debug, Clone)]
pub struct RecoveryVault {
    /// Full vault resource identifier.
    pub id: String,
    /// Vault name.
    pub name: String,
}

/// Backup item inside a vault.
#[derive(Debug, Clone)]
pub struct ProtectedItem {
    /// Resource identifier of the protected source VM.
    pub source_resource_id: String,
}

/// Query port for the VM inventory API.
#[async_trait]
pub trait VmInventory: Send + Sync {
    /// Lists the subscriptions to scan.
    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>>;

    /// Lists every virtual machine in one subscription.
    async fn list_virtual_machines(&self, subscription_id: &str)
    -> AppResult<Vec<VirtualMachine>>;
}

/// Query port for the backup vault API.
#[async_trait]
pub trait RecoveryVaults: Send + Sync {
    /// Lists the recovery vaults of one subscription.
    async fn list_vaults(&self, subscription_id: &str) -> AppResult<Vec<RecoveryVault>>;

    /// Lists the protected items held by one vault.
    async fn list_protected_items(&self, vault: &RecoveryVault) -> AppResult<Vec<ProtectedItem>>;
}

//! Backup coverage evaluation across subscriptions and recovery vaults.

use std::sync::Arc;

use tracing::{info, warn};

use opswarden_core::AppResult;
use opswarden_domain::{BackupRecord, CoverageSummary, unprotected};

use crate::inventory_ports::{RecoveryVault, RecoveryVaults, VirtualMachine, VmInventory};

/// Result of one backup coverage run.
#[derive(Debug)]
pub struct BackupRunReport {
    /// One record per inventoried VM, in evaluation order.
    pub records: Vec<BackupRecord>,
    /// Aggregate counts over `records`.
    pub summary: CoverageSummary,
}

impl BackupRunReport {
    /// Returns the unprotected view of the record set.
    #[must_use]
    pub fn unprotected(&self) -> Vec<&BackupRecord> {
        unprotected(&self.records)
    }
}

/// Cross-references VM inventory against recovery-vault protected items.
#[derive(Clone)]
pub struct BackupService {
    inventory: Arc<dyn VmInventory>,
    vaults: Arc<dyn RecoveryVaults>,
}

impl BackupService {
    /// Creates a new backup coverage service.
    #[must_use]
    pub fn new(inventory: Arc<dyn VmInventory>, vaults: Arc<dyn RecoveryVaults>) -> Self {
        Self { inventory, vaults }
    }

    /// Determines protection status for one VM against its subscription's
    /// vaults.
    ///
    /// A VM is protected iff at least one vault lists a backup item whose
    /// source resource id equals the VM's resource id (case-insensitive);
    /// the scan short-circuits at the first match. A failed vault query is
    /// logged and the remaining vaults are still checked; if every query
    /// fails the VM is conservatively reported as unprotected.
    pub async fn evaluate_vm(
        &self,
        vm: &VirtualMachine,
        subscription_name: &str,
        vaults: &[RecoveryVault],
    ) -> BackupRecord {
        let mut failed_vaults = 0_usize;

        for vault in vaults {
            match self.vaults.list_protected_items(vault).await {
                Ok(items) => {
                    let is_protected = items
                        .iter()
                        .any(|item| item.source_resource_id.eq_ignore_ascii_case(&vm.resource_id));
                    if is_protected {
                        return self.record_for(
                            vm,
                            subscription_name,
                            true,
                            format!("protected by vault '{}'", vault.name),
                        );
                    }
                }
                Err(error) => {
                    failed_vaults += 1;
                    warn!(
                        vm = %vm.name,
                        vault = %vault.name,
                        error = %error,
                        "vault query failed; checking remaining vaults"
                    );
                }
            }
        }

        let note = if vaults.is_empty() {
            "no recovery vaults in subscription".to_owned()
        } else if failed_vaults == vaults.len() {
            "every vault query failed; treated as unprotected".to_owned()
        } else {
            "no backup item references this VM".to_owned()
        };

        self.record_for(vm, subscription_name, false, note)
    }

    /// Enumerates all subscriptions and evaluates every VM sequentially.
    ///
    /// A subscription whose VM listing fails is skipped with a warning. When
    /// only the vault listing fails, each of its VMs still yields a record
    /// tagged with the error, so the summary count matches the inventory.
    pub async fn run(&self) -> AppResult<BackupRunReport> {
        let subscriptions = self.inventory.list_subscriptions().await?;
        info!(
            subscription_count = subscriptions.len(),
            "starting backup coverage scan"
        );

        let mut records = Vec::new();

        for subscription in &subscriptions {
            let vms = match self.inventory.list_virtual_machines(&subscription.id).await {
                Ok(vms) => vms,
                Err(error) => {
                    warn!(
                        subscription = %subscription.display_name,
                        error = %error,
                        "failed to list virtual machines; skipping subscription"
                    );
                    continue;
                }
            };

            if vms.is_empty() {
                continue;
            }

            match self.vaults.list_vaults(&subscription.id).await {
                Ok(vaults) => {
                    for vm in &vms {
                        records.push(
                            self.evaluate_vm(vm, &subscription.display_name, &vaults)
                                .await,
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        subscription = %subscription.display_name,
                        error = %error,
                        "failed to list recovery vaults; flagging every VM as unprotected"
                    );
                    for vm in &vms {
                        records.push(self.record_for(
                            vm,
                            &subscription.display_name,
                            false,
                            format!("vault listing failed: {error}"),
                        ));
                    }
                }
            }
        }

        let summary = CoverageSummary::from_records(&records);
        Ok(BackupRunReport { records, summary })
    }

    fn record_for(
        &self,
        vm: &VirtualMachine,
        subscription_name: &str,
        backup_enabled: bool,
        note: String,
    ) -> BackupRecord {
        BackupRecord {
            vm_name: vm.name.clone(),
            resource_group: vm.resource_group.clone(),
            subscription_name: subscription_name.to_owned(),
            location: vm.location.clone(),
            backup_enabled,
            note,
        }
    }
}

//! Virtual-machine backup coverage records and summary aggregation.

use serde::{Deserialize, Serialize};

/// Backup protection status of one virtual machine.
///
/// One record per VM per run, created during evaluation and immutable
/// afterwards. Error paths still produce a record with the error in `note`,
/// so summary counts always match the inventory count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Virtual machine name.
    pub vm_name: String,
    /// Resource group containing the VM.
    pub resource_group: String,
    /// Display name of the subscription the VM belongs to.
    pub subscription_name: String,
    /// Region the VM is deployed in.
    pub location: String,
    /// Whether at least one recovery vault protects this VM.
    pub backup_enabled: bool,
    /// Human-readable status or error explanation.
    pub note: String,
}

/// Aggregate counts over one run's backup records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Total VMs evaluated.
    pub total: usize,
    /// VMs with backup protection.
    pub protected: usize,
    /// VMs without backup protection.
    pub unprotected: usize,
    /// `protected / total * 100` rounded to two decimals, or `None` when the
    /// inventory was empty (no division is performed).
    pub coverage_percent: Option<f64>,
}

impl CoverageSummary {
    /// Builds the summary from one run's records.
    #[must_use]
    pub fn from_records(records: &[BackupRecord]) -> Self {
        let total = records.len();
        let protected = records.iter().filter(|entry| entry.backup_enabled).count();
        let unprotected = total - protected;
        let coverage_percent = if total == 0 {
            None
        } else {
            let ratio = protected as f64 / total as f64;
            Some((ratio * 100.0 * 100.0).round() / 100.0)
        };

        Self {
            total,
            protected,
            unprotected,
            coverage_percent,
        }
    }
}

/// Returns the unprotected view of a record set. A filter over the same
/// underlying records, never a diverging copy.
#[must_use]
pub fn unprotected(records: &[BackupRecord]) -> Vec<&BackupRecord> {
    records
        .iter()
        .filter(|entry| !entry.backup_enabled)
        .collect()
}

//! Application services and ports.

#![forbid(unsafe_code)]

mod backup_service;
mod directory_ports;
mod expiry_service;
mod inventory_ports;
mod notifier;
mod report;

pub use backup_service::{BackupRunReport, BackupService};
pub use directory_ports::{
    CloudDirectory, CloudDirectoryUser, DirectoryRole, OnPremAccount, OnPremDirectory,
    PasswordPolicy, RoleMember,
};
pub use expiry_service::{
    ExpiryBatchOutcome, ExpiryConfig, ExpiryRunMode, ExpiryRunOptions, ExpiryRunReport,
    ExpiryService, SourceSelection, run_expiry_batch,
};
pub use inventory_ports::{
    ProtectedItem, RecoveryVault, RecoveryVaults, Subscription, VirtualMachine, VmInventory,
};
pub use notifier::{EmailService, Notifier, NotifierConfig};
pub use report::{
    render_backup_report, render_backup_summary, render_operator_error, render_overview,
    render_user_notification,
};

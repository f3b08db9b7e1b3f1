//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_email_service;
mod http_cloud_directory;
mod http_onprem_directory;
mod http_recovery_vaults;
mod http_vm_inventory;
mod smtp_email_service;

pub use console_email_service::ConsoleEmailService;
pub use http_cloud_directory::{HttpCloudDirectory, HttpCloudDirectoryConfig};
pub use http_onprem_directory::{HttpOnPremDirectory, HttpOnPremDirectoryConfig};
pub use http_recovery_vaults::{HttpRecoveryVaults, HttpRecoveryVaultsConfig};
pub use http_vm_inventory::{HttpVmInventory, HttpVmInventoryConfig};
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};

//! Plain-text rendering for overview tables, notifications, and summaries.

use opswarden_core::AppError;
use opswarden_domain::{ExpiryRecord, ExpiryStatus, PasswordExpiry, sort_for_overview};

use crate::backup_service::BackupRunReport;

/// Renders the consolidated password-expiry table, soonest expiry first and
/// never-expiring accounts last.
#[must_use]
pub fn render_overview(records: &[ExpiryRecord]) -> String {
    let mut sorted = records.to_vec();
    sort_for_overview(&mut sorted);

    let mut out = String::new();
    out.push_str(&format!(
        "{:<38} {:<9} {:<13} {:>9}  {}\n",
        "USER", "SOURCE", "LAST CHANGE", "DAYS LEFT", "STATUS"
    ));

    for record in &sorted {
        let last_change = record
            .last_password_change
            .map_or_else(|| "-".to_owned(), |at| at.format("%Y-%m-%d").to_string());
        let days = match record.expiry {
            PasswordExpiry::NeverExpires => "never".to_owned(),
            PasswordExpiry::ExpiresIn { days_remaining } => days_remaining.to_string(),
        };
        out.push_str(&format!(
            "{:<38} {:<9} {:<13} {:>9}  {}\n",
            record.email.as_str(),
            record.source,
            last_change,
            days,
            record.status()
        ));
    }

    out
}

/// Renders the subject and body of one per-user expiry notification.
#[must_use]
pub fn render_user_notification(record: &ExpiryRecord) -> (String, String) {
    let greeting_name = if record.display_name.trim().is_empty() {
        record.email.as_str()
    } else {
        record.display_name.as_str()
    };

    match (record.status(), record.expiry) {
        (ExpiryStatus::Expired, PasswordExpiry::ExpiresIn { days_remaining }) => {
            let subject = "Your password has expired".to_owned();
            let expired_for = days_remaining.abs();
            let body = format!(
                "Hello {greeting_name},\n\n\
                 The password for {email} expired {expired_for} day(s) ago.\n\
                 Please change it now; the account may already be blocked from signing in.\n\n\
                 This is an automated message from the {source} directory check.\n",
                email = record.email,
                source = record.source,
            );
            (subject, body)
        }
        (_, PasswordExpiry::ExpiresIn { days_remaining }) => {
            let subject = format!("Your password expires in {days_remaining} day(s)");
            let body = format!(
                "Hello {greeting_name},\n\n\
                 The password for {email} expires in {days_remaining} day(s).\n\
                 Please change it before it expires to avoid losing access.\n\n\
                 This is an automated message from the {source} directory check.\n",
                email = record.email,
                source = record.source,
            );
            (subject, body)
        }
        (_, PasswordExpiry::NeverExpires) => {
            let subject = "Your password never expires".to_owned();
            let body = format!(
                "Hello {greeting_name},\n\n\
                 The password for {email} has no expiry policy. No action is required.\n",
                email = record.email,
            );
            (subject, body)
        }
    }
}

/// Renders the single run-level error notification for the operator.
#[must_use]
pub fn render_operator_error(context: &str, error: &AppError) -> (String, String) {
    let subject = format!("{context} run failed");
    let body = format!(
        "The {context} run aborted before completing.\n\nError: {error}\n\n\
         See the job log for details.\n"
    );
    (subject, body)
}

/// Renders the backup coverage summary email (counts plus the unprotected
/// VM listing).
#[must_use]
pub fn render_backup_summary(run_report: &BackupRunReport) -> (String, String) {
    let summary = &run_report.summary;
    let subject = format!(
        "VM backup coverage: {} unprotected of {}",
        summary.unprotected, summary.total
    );

    let mut body = String::new();
    body.push_str("Virtual machine backup coverage\n\n");
    body.push_str(&format!("Total VMs:    {}\n", summary.total));
    body.push_str(&format!("Protected:    {}\n", summary.protected));
    body.push_str(&format!("Unprotected:  {}\n", summary.unprotected));
    if let Some(coverage) = summary.coverage_percent {
        body.push_str(&format!("Coverage:     {coverage:.2}%\n"));
    }

    let unprotected_records = run_report.unprotected();
    if unprotected_records.is_empty() {
        if summary.total > 0 {
            body.push_str("\nEvery virtual machine is protected.\n");
        } else {
            body.push_str("\nNo virtual machines found.\n");
        }
        return (subject, body);
    }

    body.push_str("\nUnprotected virtual machines:\n");
    body.push_str(&format!(
        "{:<24} {:<20} {:<20} {:<14} {}\n",
        "VM", "RESOURCE GROUP", "SUBSCRIPTION", "LOCATION", "NOTE"
    ));
    for record in unprotected_records {
        body.push_str(&format!(
            "{:<24} {:<20} {:<20} {:<14} {}\n",
            record.vm_name,
            record.resource_group,
            record.subscription_name,
            record.location,
            record.note
        ));
    }

    (subject, body)
}

/// Renders the full backup detail listing (every VM, in evaluation order)
/// plus the summary footer, for console output.
#[must_use]
pub fn render_backup_report(run_report: &BackupRunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<20} {:<20} {:<14} {:<9} {}\n",
        "VM", "RESOURCE GROUP", "SUBSCRIPTION", "LOCATION", "BACKUP", "NOTE"
    ));

    for record in &run_report.records {
        out.push_str(&format!(
            "{:<24} {:<20} {:<20} {:<14} {:<9} {}\n",
            record.vm_name,
            record.resource_group,
            record.subscription_name,
            record.location,
            if record.backup_enabled { "yes" } else { "NO" },
            record.note
        ));
    }

    let summary = &run_report.summary;
    out.push_str(&format!(
        "\n{} VMs, {} protected, {} unprotected",
        summary.total, summary.protected, summary.unprotected
    ));
    if let Some(coverage) = summary.coverage_percent {
        out.push_str(&format!(", {coverage:.2}% coverage"));
    }
    out.push('\n');

    out
}

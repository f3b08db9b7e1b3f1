//! Outbound notification port and dispatch rules.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use opswarden_core::{AppError, AppResult};
use opswarden_domain::{EmailAddress, ExpiryRecord, ExpiryStatus};

use crate::backup_service::BackupRunReport;
use crate::report;

/// Port for the mail-send API.
///
/// Implementations either deliver the message (live) or log the fully
/// rendered message without any external call (simulate).
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends one plain-text message to one recipient.
    async fn send_email(&self, to: &str, subject: &str, text_body: &str) -> AppResult<()>;
}

/// Fixed addresses used by the notifier.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Operator inbox for the single run-level error notification.
    pub operator_address: EmailAddress,
}

/// Formats and dispatches notifications through the mail port.
#[derive(Clone)]
pub struct Notifier {
    email_service: Arc<dyn EmailService>,
    config: NotifierConfig,
}

impl Notifier {
    /// Creates a new notifier.
    #[must_use]
    pub fn new(email_service: Arc<dyn EmailService>, config: NotifierConfig) -> Self {
        Self {
            email_service,
            config,
        }
    }

    /// Sends one notification per record whose status requires action
    /// (expired or expiring soon).
    ///
    /// A failed send is logged with the recipient and skipped; remaining
    /// recipients are still notified. Returns the number of successful sends.
    pub async fn notify_expiring(&self, records: &[ExpiryRecord]) -> usize {
        let mut sent = 0_usize;

        for record in records {
            let status = record.status();
            if !matches!(status, ExpiryStatus::Expired | ExpiryStatus::Warning) {
                continue;
            }

            let (subject, body) = report::render_user_notification(record);
            match self
                .email_service
                .send_email(record.email.as_str(), &subject, &body)
                .await
            {
                Ok(()) => {
                    sent += 1;
                    info!(recipient = %record.email, status = %status, "expiry notification sent");
                }
                Err(error) => {
                    warn!(
                        recipient = %record.email,
                        error = %error,
                        "failed to send expiry notification; continuing with remaining recipients"
                    );
                }
            }
        }

        sent
    }

    /// Sends the single run-level error notification to the operator
    /// address, distinct from per-user notifications. Its own failure is
    /// logged, never propagated.
    pub async fn notify_operator_error(&self, context: &str, error: &AppError) {
        let (subject, body) = report::render_operator_error(context, error);
        if let Err(send_error) = self
            .email_service
            .send_email(self.config.operator_address.as_str(), &subject, &body)
            .await
        {
            warn!(
                recipient = %self.config.operator_address,
                error = %send_error,
                "failed to send operator error notification"
            );
        }
    }

    /// Emails the backup coverage summary to the given recipient.
    pub async fn notify_backup_summary(
        &self,
        run_report: &BackupRunReport,
        to: &EmailAddress,
    ) -> AppResult<()> {
        let (subject, body) = report::render_backup_summary(run_report);
        self.email_service
            .send_email(to.as_str(), &subject, &body)
            .await
            .map_err(|error| {
                AppError::Notification(format!("failed to send backup summary to {to}: {error}"))
            })
    }
}

//! Password-expiry evaluation: candidate resolution, per-source status
//! computation, and the sequential batch run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use opswarden_core::{AppError, AppResult};
use opswarden_domain::{EmailAddress, ExpiryRecord, ExpirySource, PasswordExpiry};

use crate::directory_ports::{CloudDirectory, OnPremDirectory};
use crate::notifier::Notifier;
use crate::report;

/// Which identity sources a run evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelection {
    /// Cloud directory only.
    CloudOnly,
    /// On-prem directory only.
    OnPremOnly,
    /// Both directories, cloud first.
    Both,
}

impl SourceSelection {
    /// Returns the label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudOnly => "cloud",
            Self::OnPremOnly => "on-prem",
            Self::Both => "both",
        }
    }

    fn includes_cloud(self) -> bool {
        matches!(self, Self::CloudOnly | Self::Both)
    }

    fn includes_on_prem(self) -> bool {
        matches!(self, Self::OnPremOnly | Self::Both)
    }
}

/// Tunables for the expiry evaluator.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Fallback maximum password age for cloud accounts, in days.
    ///
    /// The cloud directory API does not expose the tenant's password-age
    /// policy, so the cloud countdown is an approximation based on this
    /// value. The on-prem countdown uses the real domain policy instead.
    pub cloud_max_password_age_days: i64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            cloud_max_password_age_days: 90,
        }
    }
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct ExpiryRunOptions {
    /// Which sources to evaluate.
    pub sources: SourceSelection,
    /// Explicit principals to evaluate instead of admin-role expansion.
    pub explicit_users: Vec<String>,
    /// Evaluation instant; injected so runs over a frozen directory snapshot
    /// produce identical records.
    pub now: DateTime<Utc>,
}

/// Result of one batch evaluation.
#[derive(Debug)]
pub struct ExpiryRunReport {
    /// One record per (candidate, source) pair that evaluated successfully,
    /// in evaluation order.
    pub records: Vec<ExpiryRecord>,
    /// (candidate, source) pairs skipped because the source did not know the
    /// principal.
    pub not_found: usize,
    /// (candidate, source) pairs skipped because the source query failed.
    pub query_failures: usize,
}

/// Evaluates password-expiration status across both identity sources.
///
/// The cloud directory is the system of record for candidate resolution and
/// is always required; the on-prem directory is only needed when a run
/// selects it.
#[derive(Clone)]
pub struct ExpiryService {
    cloud: Arc<dyn CloudDirectory>,
    on_prem: Option<Arc<dyn OnPremDirectory>>,
    config: ExpiryConfig,
}

impl ExpiryService {
    /// Creates a new expiry service.
    #[must_use]
    pub fn new(
        cloud: Arc<dyn CloudDirectory>,
        on_prem: Option<Arc<dyn OnPremDirectory>>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            cloud,
            on_prem,
            config,
        }
    }

    /// Produces the deduplicated ordered candidate list.
    ///
    /// With an explicit list, each principal is existence-checked against the
    /// cloud directory; unresolvable entries are dropped with a warning.
    /// Otherwise every directory role whose display name contains "admin"
    /// (case-insensitive) is expanded and the member principal names are
    /// unioned. Deduplication is by principal name, not internal object id,
    /// preserving first-seen order.
    pub async fn resolve_candidates(&self, explicit: &[String]) -> AppResult<Vec<String>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<String> = Vec::new();

        if !explicit.is_empty() {
            for principal in explicit {
                match self.cloud.find_user(principal).await {
                    Ok(Some(user)) => {
                        if seen.insert(user.principal_name.to_lowercase()) {
                            candidates.push(user.principal_name);
                        }
                    }
                    Ok(None) => {
                        warn!(principal = %principal, "skipping unknown principal");
                    }
                    Err(error) => {
                        warn!(
                            principal = %principal,
                            error = %error,
                            "existence check failed; skipping principal"
                        );
                    }
                }
            }

            return Ok(candidates);
        }

        let roles = self.cloud.list_roles().await?;
        for role in roles {
            if !role.display_name.to_lowercase().contains("admin") {
                continue;
            }

            let members = match self.cloud.list_role_members(&role.id).await {
                Ok(members) => members,
                Err(error) => {
                    warn!(
                        role = %role.display_name,
                        error = %error,
                        "failed to list role members; skipping role"
                    );
                    continue;
                }
            };

            for member in members {
                let Some(principal_name) = member.principal_name else {
                    warn!(
                        role = %role.display_name,
                        member_id = %member.id,
                        "role member has no principal name; skipping"
                    );
                    continue;
                };

                if seen.insert(principal_name.to_lowercase()) {
                    candidates.push(principal_name);
                }
            }
        }

        Ok(candidates)
    }

    /// Evaluates one principal against the cloud directory.
    ///
    /// Returns `AppError::NotFound` when the directory does not know the
    /// principal; the caller logs the skip and continues the batch.
    pub async fn evaluate_cloud(
        &self,
        principal: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ExpiryRecord> {
        let user = self.cloud.find_user(principal).await?.ok_or_else(|| {
            AppError::NotFound(format!("user '{principal}' not found in cloud directory"))
        })?;

        let email = EmailAddress::new(&user.principal_name)?;
        let expiry = if user.password_never_expires {
            PasswordExpiry::NeverExpires
        } else {
            let last_change = user.last_password_change.ok_or_else(|| {
                AppError::Query(format!(
                    "cloud directory reports no password-change timestamp for '{principal}'"
                ))
            })?;
            let age_days = (now - last_change).num_days();
            PasswordExpiry::ExpiresIn {
                days_remaining: self.config.cloud_max_password_age_days - age_days,
            }
        };

        Ok(ExpiryRecord {
            email,
            display_name: user.display_name,
            last_password_change: user.last_password_change,
            expiry,
            source: ExpirySource::CloudDirectory,
        })
    }

    /// Evaluates one principal against the on-prem directory, using the
    /// domain's actual default password policy.
    pub async fn evaluate_on_prem(
        &self,
        principal: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ExpiryRecord> {
        let Some(on_prem) = &self.on_prem else {
            return Err(AppError::Setup(
                "on-prem directory is not configured".to_owned(),
            ));
        };

        let account = on_prem.find_account(principal).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "account '{principal}' not found in on-prem directory"
            ))
        })?;

        let email = EmailAddress::new(&account.principal_name)?;
        let expiry = if account.password_never_expires {
            PasswordExpiry::NeverExpires
        } else {
            let last_set = account.password_last_set.ok_or_else(|| {
                AppError::Query(format!(
                    "on-prem directory reports no password-set timestamp for '{principal}'"
                ))
            })?;
            let policy = on_prem.default_password_policy().await?;
            let expires_at = last_set + Duration::days(policy.max_password_age_days);
            PasswordExpiry::ExpiresIn {
                days_remaining: (expires_at - now).num_days(),
            }
        };

        Ok(ExpiryRecord {
            email,
            display_name: account.display_name,
            last_password_change: account.password_last_set,
            expiry,
            source: ExpirySource::OnPremDirectory,
        })
    }

    /// Runs the full evaluation batch sequentially.
    ///
    /// A candidate that one source cannot resolve or query is skipped for
    /// that source with a warning; the batch never aborts on per-entity
    /// failures. Candidate resolution failure aborts the run, since there is
    /// nothing to evaluate.
    pub async fn run(&self, options: &ExpiryRunOptions) -> AppResult<ExpiryRunReport> {
        if options.sources.includes_on_prem() && self.on_prem.is_none() {
            return Err(AppError::Setup(
                "on-prem directory is not configured for this run".to_owned(),
            ));
        }

        let candidates = self.resolve_candidates(&options.explicit_users).await?;
        info!(
            candidate_count = candidates.len(),
            sources = options.sources.as_str(),
            "starting password-expiry evaluation"
        );

        let mut records = Vec::new();
        let mut not_found = 0_usize;
        let mut query_failures = 0_usize;

        for candidate in &candidates {
            if options.sources.includes_cloud() {
                match self.evaluate_cloud(candidate, options.now).await {
                    Ok(record) => records.push(record),
                    Err(AppError::NotFound(reason)) => {
                        not_found += 1;
                        warn!(principal = %candidate, source = "cloud", reason = %reason, "candidate skipped");
                    }
                    Err(error) => {
                        query_failures += 1;
                        warn!(principal = %candidate, source = "cloud", error = %error, "source query failed");
                    }
                }
            }

            if options.sources.includes_on_prem() {
                match self.evaluate_on_prem(candidate, options.now).await {
                    Ok(record) => records.push(record),
                    Err(AppError::NotFound(reason)) => {
                        not_found += 1;
                        warn!(principal = %candidate, source = "on-prem", reason = %reason, "candidate skipped");
                    }
                    Err(error) => {
                        query_failures += 1;
                        warn!(principal = %candidate, source = "on-prem", error = %error, "source query failed");
                    }
                }
            }
        }

        Ok(ExpiryRunReport {
            records,
            not_found,
            query_failures,
        })
    }
}

/// How a run reports its results. Overview and individual notifications are
/// mutually exclusive; dry-run simulation is an adapter concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryRunMode {
    /// Send one notification per expiring or expired account.
    Notify,
    /// Render the consolidated status table; send nothing.
    Overview,
}

/// Outcome of one full expiry batch.
#[derive(Debug)]
pub struct ExpiryBatchOutcome {
    /// Evaluation result.
    pub report: ExpiryRunReport,
    /// Individual notifications successfully sent.
    pub notifications_sent: usize,
    /// Rendered overview table; present only in overview mode.
    pub overview: Option<String>,
}

/// Runs evaluation and dispatches the results according to the mode.
pub async fn run_expiry_batch(
    service: &ExpiryService,
    notifier: &Notifier,
    options: &ExpiryRunOptions,
    mode: ExpiryRunMode,
) -> AppResult<ExpiryBatchOutcome> {
    let report = service.run(options).await?;

    match mode {
        ExpiryRunMode::Overview => {
            let overview = report::render_overview(&report.records);
            Ok(ExpiryBatchOutcome {
                report,
                notifications_sent: 0,
                overview: Some(overview),
            })
        }
        ExpiryRunMode::Notify => {
            let notifications_sent = notifier.notify_expiring(&report.records).await;
            Ok(ExpiryBatchOutcome {
                report,
                notifications_sent,
                overview: None,
            })
        }
    }
}

#[cfg(test)]
mod tests;

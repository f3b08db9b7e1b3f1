use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;

use opswarden_core::{AppError, AppResult};
use opswarden_domain::{EmailAddress, ExpirySource, ExpiryStatus, PasswordExpiry};

use crate::directory_ports::{
    CloudDirectory, CloudDirectoryUser, DirectoryRole, OnPremAccount, OnPremDirectory,
    PasswordPolicy, RoleMember,
};
use crate::notifier::{EmailService, Notifier, NotifierConfig};

use super::{
    ExpiryConfig, ExpiryRunMode, ExpiryRunOptions, ExpiryService, SourceSelection,
    run_expiry_batch,
};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("valid timestamp"))
}

fn email(value: &str) -> EmailAddress {
    EmailAddress::new(value).unwrap_or_else(|_| panic!("valid test email"))
}

#[derive(Default)]
struct FakeCloudDirectory {
    users: HashMap<String, CloudDirectoryUser>,
    roles: Vec<DirectoryRole>,
    members: HashMap<String, Vec<RoleMember>>,
    failing_principals: HashSet<String>,
    failing_roles: HashSet<String>,
}

impl FakeCloudDirectory {
    fn with_user(mut self, user: CloudDirectoryUser) -> Self {
        self.users
            .insert(user.principal_name.to_lowercase(), user);
        self
    }

    fn with_role(mut self, id: &str, display_name: &str, members: Vec<RoleMember>) -> Self {
        self.roles.push(DirectoryRole {
            id: id.to_owned(),
            display_name: display_name.to_owned(),
        });
        self.members.insert(id.to_owned(), members);
        self
    }
}

#[async_trait]
impl CloudDirectory for FakeCloudDirectory {
    async fn find_user(&self, principal: &str) -> AppResult<Option<CloudDirectoryUser>> {
        if self.failing_principals.contains(principal) {
            return Err(AppError::Query(format!("lookup failed for '{principal}'")));
        }

        Ok(self.users.get(&principal.to_lowercase()).cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<DirectoryRole>> {
        Ok(self.roles.clone())
    }

    async fn list_role_members(&self, role_id: &str) -> AppResult<Vec<RoleMember>> {
        if self.failing_roles.contains(role_id) {
            return Err(AppError::Query(format!(
                "member listing failed for role '{role_id}'"
            )));
        }

        Ok(self.members.get(role_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeOnPremDirectory {
    accounts: HashMap<String, OnPremAccount>,
    policy_max_age_days: Option<i64>,
}

impl FakeOnPremDirectory {
    fn with_account(mut self, account: OnPremAccount) -> Self {
        self.accounts
            .insert(account.principal_name.to_lowercase(), account);
        self
    }
}

#[async_trait]
impl OnPremDirectory for FakeOnPremDirectory {
    async fn find_account(&self, principal: &str) -> AppResult<Option<OnPremAccount>> {
        Ok(self.accounts.get(&principal.to_lowercase()).cloned())
    }

    async fn default_password_policy(&self) -> AppResult<PasswordPolicy> {
        match self.policy_max_age_days {
            Some(max_password_age_days) => Ok(PasswordPolicy {
                max_password_age_days,
            }),
            None => Err(AppError::Query("policy unavailable".to_owned())),
        }
    }
}

#[derive(Default)]
struct FakeEmailService {
    sent: Mutex<Vec<(String, String, String)>>,
    failing_recipients: HashSet<String>,
}

#[async_trait]
impl EmailService for FakeEmailService {
    async fn send_email(&self, to: &str, subject: &str, text_body: &str) -> AppResult<()> {
        if self.failing_recipients.contains(to) {
            return Err(AppError::Notification(format!("relay rejected '{to}'")));
        }

        self.sent
            .lock()
            .await
            .push((to.to_owned(), subject.to_owned(), text_body.to_owned()));
        Ok(())
    }
}

fn cloud_user(principal: &str, changed_days_ago: Option<i64>, never_expires: bool) -> CloudDirectoryUser {
    CloudDirectoryUser {
        principal_name: principal.to_owned(),
        display_name: format!("User {principal}"),
        last_password_change: changed_days_ago.map(|days| fixed_now() - Duration::days(days)),
        password_never_expires: never_expires,
    }
}

fn on_prem_account(
    principal: &str,
    set_days_ago: Option<i64>,
    never_expires: bool,
) -> OnPremAccount {
    OnPremAccount {
        principal_name: principal.to_owned(),
        display_name: format!("User {principal}"),
        password_last_set: set_days_ago.map(|days| fixed_now() - Duration::days(days)),
        password_never_expires: never_expires,
    }
}

fn member(id: &str, principal: Option<&str>) -> RoleMember {
    RoleMember {
        id: id.to_owned(),
        principal_name: principal.map(str::to_owned),
    }
}

fn service(cloud: FakeCloudDirectory, on_prem: FakeOnPremDirectory) -> ExpiryService {
    ExpiryService::new(
        Arc::new(cloud),
        Some(Arc::new(on_prem)),
        ExpiryConfig::default(),
    )
}

fn options(sources: SourceSelection, explicit: &[&str]) -> ExpiryRunOptions {
    ExpiryRunOptions {
        sources,
        explicit_users: explicit.iter().map(|value| (*value).to_owned()).collect(),
        now: fixed_now(),
    }
}

#[tokio::test]
async fn admin_role_expansion_dedups_by_principal_preserving_order() {
    let cloud = FakeCloudDirectory::default()
        .with_role(
            "role-1",
            "Global Administrator",
            vec![
                member("m1", Some("alice@example.com")),
                member("m2", Some("bob@example.com")),
            ],
        )
        .with_role(
            "role-2",
            "User Administrator",
            vec![
                member("m3", Some("Bob@Example.com")),
                member("m4", Some("carol@example.com")),
            ],
        )
        .with_role(
            "role-3",
            "Directory Readers",
            vec![member("m5", Some("dave@example.com"))],
        );
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let candidates = expiry
        .resolve_candidates(&[])
        .await
        .unwrap_or_else(|_| panic!("resolution succeeds"));

    assert_eq!(
        candidates,
        vec!["alice@example.com", "bob@example.com", "carol@example.com"]
    );
}

#[tokio::test]
async fn explicit_candidates_drop_unresolvable_principals() {
    let cloud =
        FakeCloudDirectory::default().with_user(cloud_user("alice@example.com", Some(10), false));
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let candidates = expiry
        .resolve_candidates(&["alice@example.com".to_owned(), "ghost@example.com".to_owned()])
        .await
        .unwrap_or_else(|_| panic!("resolution succeeds"));

    assert_eq!(candidates, vec!["alice@example.com"]);
}

#[tokio::test]
async fn failed_existence_check_drops_the_principal_without_aborting() {
    let mut cloud =
        FakeCloudDirectory::default().with_user(cloud_user("alice@example.com", Some(10), false));
    cloud.failing_principals.insert("flaky@example.com".to_owned());
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let candidates = expiry
        .resolve_candidates(&["flaky@example.com".to_owned(), "alice@example.com".to_owned()])
        .await
        .unwrap_or_else(|_| panic!("resolution succeeds"));

    assert_eq!(candidates, vec!["alice@example.com"]);
}

#[tokio::test]
async fn member_without_principal_name_is_skipped() {
    let cloud = FakeCloudDirectory::default().with_role(
        "role-1",
        "Helpdesk Administrator",
        vec![member("m1", None), member("m2", Some("erin@example.com"))],
    );
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let candidates = expiry
        .resolve_candidates(&[])
        .await
        .unwrap_or_else(|_| panic!("resolution succeeds"));

    assert_eq!(candidates, vec!["erin@example.com"]);
}

#[tokio::test]
async fn failed_role_member_listing_does_not_abort_other_roles() {
    let mut cloud = FakeCloudDirectory::default()
        .with_role("role-1", "Global Administrator", Vec::new())
        .with_role(
            "role-2",
            "Exchange Administrator",
            vec![member("m1", Some("frank@example.com"))],
        );
    cloud.failing_roles.insert("role-1".to_owned());
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let candidates = expiry
        .resolve_candidates(&[])
        .await
        .unwrap_or_else(|_| panic!("resolution succeeds"));

    assert_eq!(candidates, vec!["frank@example.com"]);
}

#[tokio::test]
async fn cloud_never_expires_flag_wins_over_timestamp() {
    let cloud =
        FakeCloudDirectory::default().with_user(cloud_user("svc@example.com", Some(400), true));
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let record = expiry
        .evaluate_cloud("svc@example.com", fixed_now())
        .await
        .unwrap_or_else(|_| panic!("evaluation succeeds"));

    assert_eq!(record.expiry, PasswordExpiry::NeverExpires);
    assert_eq!(record.status(), ExpiryStatus::NeverExpires);
    assert_eq!(record.source, ExpirySource::CloudDirectory);
}

#[tokio::test]
async fn cloud_countdown_uses_configured_fallback_age() {
    let cloud =
        FakeCloudDirectory::default().with_user(cloud_user("alice@example.com", Some(80), false));
    let expiry = service(cloud, FakeOnPremDirectory::default());

    let record = expiry
        .evaluate_cloud("alice@example.com", fixed_now())
        .await
        .unwrap_or_else(|_| panic!("evaluation succeeds"));

    assert_eq!(
        record.expiry,
        PasswordExpiry::ExpiresIn { days_remaining: 10 }
    );
    assert_eq!(record.email, email("alice@example.com"));
}

#[tokio::test]
async fn on_prem_countdown_uses_domain_policy() {
    let mut on_prem =
        FakeOnPremDirectory::default().with_account(on_prem_account("bob@example.com", Some(100), false));
    on_prem.policy_max_age_days = Some(120);
    let expiry = service(FakeCloudDirectory::default(), on_prem);

    let record = expiry
        .evaluate_on_prem("bob@example.com", fixed_now())
        .await
        .unwrap_or_else(|_| panic!("evaluation succeeds"));

    assert_eq!(
        record.expiry,
        PasswordExpiry::ExpiresIn { days_remaining: 20 }
    );
    assert_eq!(record.source, ExpirySource::OnPremDirectory);
}

#[tokio::test]
async fn missing_on_prem_account_is_not_found() {
    let mut on_prem = FakeOnPremDirectory::default();
    on_prem.policy_max_age_days = Some(90);
    let expiry = service(FakeCloudDirectory::default(), on_prem);

    let result = expiry.evaluate_on_prem("ghost@example.com", fixed_now()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn run_skips_failing_entities_without_aborting() {
    let cloud = FakeCloudDirectory::default()
        .with_user(cloud_user("alice@example.com", Some(80), false))
        .with_user(cloud_user("carol@example.com", Some(85), false));
    // carol has an on-prem account but the policy fetch fails; alice has no
    // on-prem account at all.
    let on_prem =
        FakeOnPremDirectory::default().with_account(on_prem_account("carol@example.com", Some(30), false));
    let expiry = service(cloud, on_prem);

    let report = expiry
        .run(&options(
            SourceSelection::Both,
            &["alice@example.com", "ghost@example.com", "carol@example.com"],
        ))
        .await
        .unwrap_or_else(|_| panic!("run succeeds"));

    // ghost is dropped at resolution; both cloud evaluations succeed; alice
    // is unknown on-prem and carol's on-prem policy query fails.
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.query_failures, 1);
}

#[tokio::test]
async fn run_with_both_sources_emits_one_record_per_pair() {
    let cloud =
        FakeCloudDirectory::default().with_user(cloud_user("alice@example.com", Some(80), false));
    let mut on_prem =
        FakeOnPremDirectory::default().with_account(on_prem_account("alice@example.com", Some(30), false));
    on_prem.policy_max_age_days = Some(60);
    let expiry = service(cloud, on_prem);

    let report = expiry
        .run(&options(SourceSelection::Both, &["alice@example.com"]))
        .await
        .unwrap_or_else(|_| panic!("run succeeds"));

    let sources: Vec<ExpirySource> = report.records.iter().map(|entry| entry.source).collect();
    assert_eq!(
        sources,
        vec![ExpirySource::CloudDirectory, ExpirySource::OnPremDirectory]
    );
}

#[tokio::test]
async fn rerunning_over_a_frozen_snapshot_is_idempotent() {
    let cloud = FakeCloudDirectory::default()
        .with_user(cloud_user("alice@example.com", Some(80), false))
        .with_user(cloud_user("svc@example.com", Some(400), true));
    let expiry = service(cloud, FakeOnPremDirectory::default());
    let run_options = options(
        SourceSelection::CloudOnly,
        &["alice@example.com", "svc@example.com"],
    );

    let first = expiry
        .run(&run_options)
        .await
        .unwrap_or_else(|_| panic!("run succeeds"));
    let second = expiry
        .run(&run_options)
        .await
        .unwrap_or_else(|_| panic!("run succeeds"));

    assert_eq!(first.records, second.records);
}

fn three_candidate_service() -> ExpiryService {
    // alice: 10 days left (warning), bob: expired, carol: 40 days left (ok).
    let cloud = FakeCloudDirectory::default()
        .with_user(cloud_user("alice@example.com", Some(80), false))
        .with_user(cloud_user("bob@example.com", Some(95), false))
        .with_user(cloud_user("carol@example.com", Some(50), false));
    service(cloud, FakeOnPremDirectory::default())
}

fn notifier_with(fake: Arc<FakeEmailService>) -> Notifier {
    Notifier::new(
        fake,
        NotifierConfig {
            operator_address: email("ops@example.com"),
        },
    )
}

#[tokio::test]
async fn notify_mode_sends_exactly_one_mail_per_actionable_record() {
    let expiry = three_candidate_service();
    let mail = Arc::new(FakeEmailService::default());
    let notifier = notifier_with(mail.clone());
    let run_options = options(
        SourceSelection::CloudOnly,
        &["alice@example.com", "bob@example.com", "carol@example.com"],
    );

    let outcome = run_expiry_batch(&expiry, &notifier, &run_options, ExpiryRunMode::Notify)
        .await
        .unwrap_or_else(|_| panic!("batch succeeds"));

    assert_eq!(outcome.notifications_sent, 2);
    assert!(outcome.overview.is_none());

    let sent = mail.sent.lock().await;
    let recipients: Vec<&str> = sent.iter().map(|(to, _, _)| to.as_str()).collect();
    assert_eq!(recipients, vec!["alice@example.com", "bob@example.com"]);
}

#[tokio::test]
async fn overview_mode_suppresses_individual_notifications() {
    let expiry = three_candidate_service();
    let mail = Arc::new(FakeEmailService::default());
    let notifier = notifier_with(mail.clone());
    let run_options = options(
        SourceSelection::CloudOnly,
        &["alice@example.com", "bob@example.com", "carol@example.com"],
    );

    let outcome = run_expiry_batch(&expiry, &notifier, &run_options, ExpiryRunMode::Overview)
        .await
        .unwrap_or_else(|_| panic!("batch succeeds"));

    assert_eq!(outcome.notifications_sent, 0);
    assert!(mail.sent.lock().await.is_empty());

    let overview = outcome
        .overview
        .unwrap_or_else(|| panic!("overview is rendered"));
    assert!(overview.contains("alice@example.com"));
    assert!(overview.contains("carol@example.com"));
}

#[tokio::test]
async fn failed_send_is_skipped_and_remaining_recipients_still_notified() {
    let expiry = three_candidate_service();
    let mut mail = FakeEmailService::default();
    mail.failing_recipients.insert("alice@example.com".to_owned());
    let mail = Arc::new(mail);
    let notifier = notifier_with(mail.clone());
    let run_options = options(
        SourceSelection::CloudOnly,
        &["alice@example.com", "bob@example.com", "carol@example.com"],
    );

    let outcome = run_expiry_batch(&expiry, &notifier, &run_options, ExpiryRunMode::Notify)
        .await
        .unwrap_or_else(|_| panic!("batch succeeds"));

    assert_eq!(outcome.notifications_sent, 1);
    let sent = mail.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "bob@example.com");
}

#[tokio::test]
async fn operator_error_notification_goes_to_the_fixed_address() {
    let mail = Arc::new(FakeEmailService::default());
    let notifier = notifier_with(mail.clone());

    notifier
        .notify_operator_error("password-expiry", &AppError::Setup("token rejected".to_owned()))
        .await;

    let sent = mail.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ops@example.com");
    assert!(sent[0].2.contains("token rejected"));
}

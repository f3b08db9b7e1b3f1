//! VM backup coverage reporter entry point.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use opswarden_application::{
    BackupService, EmailService, Notifier, NotifierConfig, render_backup_report,
};
use opswarden_core::{AppError, AppResult, NonEmptyString};
use opswarden_domain::EmailAddress;
use opswarden_infrastructure::{
    ConsoleEmailService, HttpRecoveryVaults, HttpRecoveryVaultsConfig, HttpVmInventory,
    HttpVmInventoryConfig, SmtpEmailConfig, SmtpEmailService,
};

#[derive(Debug, Parser)]
#[command(
    name = "opswarden-backup",
    about = "Reports which cloud virtual machines lack backup protection",
    version
)]
struct BackupCli {
    /// Email the coverage summary to this address.
    #[arg(long = "summary-to")]
    summary_to: Option<String>,

    /// Log fully rendered notifications instead of sending them.
    #[arg(long)]
    simulate: bool,
}

#[derive(Clone)]
struct BackupAppConfig {
    base_url: Url,
    bearer_token: NonEmptyString,
    operator_address: EmailAddress,
    summary_to: Option<EmailAddress>,
    smtp: Option<SmtpEmailConfig>,
}

impl BackupAppConfig {
    fn load(cli: &BackupCli) -> AppResult<Self> {
        let base_url = required_url("RESOURCE_MANAGER_URL")?;
        let bearer_token = required_token("RESOURCE_MANAGER_TOKEN")?;

        let operator_address = EmailAddress::new(required_env("OPERATOR_ADDRESS")?)
            .map_err(|error| AppError::Setup(format!("invalid OPERATOR_ADDRESS: {error}")))?;

        let summary_to = cli
            .summary_to
            .as_deref()
            .map(|value| {
                EmailAddress::new(value).map_err(|error| {
                    AppError::Setup(format!("invalid --summary-to address: {error}"))
                })
            })
            .transpose()?;

        let smtp = if cli.simulate {
            None
        } else {
            Some(load_smtp_config()?)
        };

        Ok(Self {
            base_url,
            bearer_token,
            operator_address,
            summary_to,
            smtp,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = BackupCli::parse();
    let config = BackupAppConfig::load(&cli)?;

    let email_service: Arc<dyn EmailService> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp.clone())),
        None => Arc::new(ConsoleEmailService::new()),
    };
    let notifier = Notifier::new(
        email_service,
        NotifierConfig {
            operator_address: config.operator_address.clone(),
        },
    );

    let inventory = Arc::new(HttpVmInventory::new(HttpVmInventoryConfig {
        base_url: config.base_url.clone(),
        bearer_token: config.bearer_token.clone(),
    })?);
    let vaults = Arc::new(HttpRecoveryVaults::new(HttpRecoveryVaultsConfig {
        base_url: config.base_url.clone(),
        bearer_token: config.bearer_token.clone(),
    })?);
    let service = BackupService::new(inventory, vaults);

    info!(simulate = cli.simulate, "opswarden-backup started");

    match service.run().await {
        Ok(report) => {
            println!("{}", render_backup_report(&report));

            if let Some(summary_to) = &config.summary_to {
                if let Err(error) = notifier.notify_backup_summary(&report, summary_to).await {
                    warn!(
                        recipient = %summary_to,
                        error = %error,
                        "failed to send backup coverage summary"
                    );
                }
            }

            info!(
                total = report.summary.total,
                protected = report.summary.protected,
                unprotected = report.summary.unprotected,
                "backup coverage run completed"
            );
            Ok(())
        }
        Err(error) => {
            warn!(error = %error, "backup coverage run failed");
            notifier
                .notify_operator_error("backup-coverage", &error)
                .await;
            Err(error)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Setup(format!("{name} is required")))
}

fn required_url(name: &str) -> AppResult<Url> {
    let value = required_env(name)?;
    Url::parse(&value).map_err(|error| AppError::Setup(format!("invalid {name}: {error}")))
}

fn required_token(name: &str) -> AppResult<NonEmptyString> {
    NonEmptyString::new(required_env(name)?)
        .map_err(|_| AppError::Setup(format!("{name} must not be empty")))
}

fn load_smtp_config() -> AppResult<SmtpEmailConfig> {
    let port = required_env("SMTP_PORT")?
        .parse::<u16>()
        .map_err(|error| AppError::Setup(format!("invalid SMTP_PORT: {error}")))?;

    Ok(SmtpEmailConfig {
        host: required_env("SMTP_HOST")?,
        port,
        username: required_env("SMTP_USERNAME")?,
        password: required_env("SMTP_PASSWORD")?,
        from_address: required_env("SMTP_FROM_ADDRESS")?,
    })
}

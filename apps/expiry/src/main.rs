//! Password-expiry notifier entry point.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use opswarden_application::{
    EmailService, ExpiryConfig, ExpiryRunMode, ExpiryRunOptions, ExpiryService, Notifier,
    NotifierConfig, OnPremDirectory, SourceSelection, run_expiry_batch,
};
use opswarden_core::{AppError, AppResult, NonEmptyString};
use opswarden_domain::EmailAddress;
use opswarden_infrastructure::{
    ConsoleEmailService, HttpCloudDirectory, HttpCloudDirectoryConfig, HttpOnPremDirectory,
    HttpOnPremDirectoryConfig, SmtpEmailConfig, SmtpEmailService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    /// Cloud directory only.
    Cloud,
    /// On-prem directory only.
    OnPrem,
    /// Both directories.
    Both,
}

impl From<SourceArg> for SourceSelection {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Cloud => Self::CloudOnly,
            SourceArg::OnPrem => Self::OnPremOnly,
            SourceArg::Both => Self::Both,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "opswarden-expiry",
    about = "Checks password-expiration status across identity directories and notifies affected users",
    version
)]
struct ExpiryCli {
    /// Identity sources to evaluate.
    #[arg(long, value_enum, default_value = "both")]
    source: SourceArg,

    /// Explicit principal to evaluate instead of admin-role expansion; repeatable.
    #[arg(long = "user")]
    users: Vec<String>,

    /// Print the consolidated status table instead of sending individual notifications.
    #[arg(long)]
    overview: bool,

    /// Log fully rendered notifications instead of sending them.
    #[arg(long)]
    simulate: bool,
}

#[derive(Clone)]
struct ExpiryAppConfig {
    cloud: HttpCloudDirectoryConfig,
    on_prem: Option<HttpOnPremDirectoryConfig>,
    operator_address: EmailAddress,
    cloud_max_password_age_days: i64,
    smtp: Option<SmtpEmailConfig>,
}

impl ExpiryAppConfig {
    fn load(cli: &ExpiryCli) -> AppResult<Self> {
        let cloud = HttpCloudDirectoryConfig {
            base_url: required_url("CLOUD_DIRECTORY_URL")?,
            bearer_token: required_token("CLOUD_DIRECTORY_TOKEN")?,
        };

        let on_prem = if matches!(cli.source, SourceArg::OnPrem | SourceArg::Both) {
            Some(HttpOnPremDirectoryConfig {
                base_url: required_url("ONPREM_DIRECTORY_URL")?,
                bearer_token: required_token("ONPREM_DIRECTORY_TOKEN")?,
            })
        } else {
            None
        };

        let operator_address = EmailAddress::new(required_env("OPERATOR_ADDRESS")?)
            .map_err(|error| AppError::Setup(format!("invalid OPERATOR_ADDRESS: {error}")))?;

        let cloud_max_password_age_days = parse_env_i64("CLOUD_MAX_PASSWORD_AGE_DAYS", 90)?;
        if cloud_max_password_age_days <= 0 {
            return Err(AppError::Setup(
                "CLOUD_MAX_PASSWORD_AGE_DAYS must be greater than zero".to_owned(),
            ));
        }

        let smtp = if cli.simulate {
            None
        } else {
            Some(load_smtp_config()?)
        };

        Ok(Self {
            cloud,
            on_prem,
            operator_address,
            cloud_max_password_age_days,
            smtp,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = ExpiryCli::parse();
    let config = ExpiryAppConfig::load(&cli)?;

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

    let cloud = Arc::new(HttpCloudDirectory::new(config.cloud.clone())?);
    let on_prem = match &config.on_prem {
        Some(on_prem_config) => Some(
            Arc::new(HttpOnPremDirectory::new(on_prem_config.clone())?) as Arc<dyn OnPremDirectory>,
        ),
        None => None,
    };
    let service = ExpiryService::new(
        cloud,
        on_prem,
        ExpiryConfig {
            cloud_max_password_age_days: config.cloud_max_password_age_days,
        },
    );

    let options = ExpiryRunOptions {
        sources: cli.source.into(),
        explicit_users: cli.users.clone(),
        now: Utc::now(),
    };
    let mode = if cli.overview {
        ExpiryRunMode::Overview
    } else {
        ExpiryRunMode::Notify
    };

    info!(
        sources = options.sources.as_str(),
        explicit_users = options.explicit_users.len(),
        overview = cli.overview,
        simulate = cli.simulate,
        "opswarden-expiry started"
    );

    match run_expiry_batch(&service, &notifier, &options, mode).await {
        Ok(outcome) => {
            if let Some(overview) = &outcome.overview {
                println!("{overview}");
            }

            info!(
                records = outcome.report.records.len(),
                not_found = outcome.report.not_found,
                query_failures = outcome.report.query_failures,
                notifications_sent = outcome.notifications_sent,
                "password-expiry run completed"
            );
            Ok(())
        }
        Err(error) => {
            warn!(error = %error, "password-expiry run failed");
            notifier
                .notify_operator_error("password-expiry", &error)
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

fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .map_err(|error| AppError::Setup(format!("invalid {name} value '{value}': {error}"))),
        Err(_) => Ok(default),
    }
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

//! On-prem directory adapter over the directory gateway's REST API.
//!
//! The gateway fronts the enterprise directory; this client only reads the
//! password attributes and the default domain policy.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use opswarden_application::{OnPremAccount, OnPremDirectory, PasswordPolicy};
use opswarden_core::{AppError, AppResult, NonEmptyString};

/// On-prem directory gateway configuration.
#[derive(Debug, Clone)]
pub struct HttpOnPremDirectoryConfig {
    /// Base URL of the directory gateway.
    pub base_url: Url,
    /// Pre-acquired bearer token for the run.
    pub bearer_token: NonEmptyString,
}

/// Directory gateway client.
#[derive(Clone)]
pub struct HttpOnPremDirectory {
    http_client: reqwest::Client,
    config: HttpOnPremDirectoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    principal_name: String,
    display_name: Option<String>,
    password_last_set: Option<DateTime<Utc>>,
    password_never_expires: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainPolicyResponse {
    max_password_age_days: i64,
}

impl HttpOnPremDirectory {
    /// Creates a new directory gateway client.
    pub fn new(config: HttpOnPremDirectoryConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| {
                AppError::Setup(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|error| {
            AppError::Query(format!(
                "invalid directory gateway endpoint '{path}': {error}"
            ))
        })
    }

    async fn get_checked(&self, url: Url) -> AppResult<Option<reqwest::Response>> {
        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(self.config.bearer_token.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to call directory gateway: {error}"))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Query(format!(
                "directory gateway returned status {} for {url}: {body}",
                status.as_u16()
            )));
        }

        Ok(Some(response))
    }
}

#[async_trait]
impl OnPremDirectory for HttpOnPremDirectory {
    async fn find_account(&self, principal: &str) -> AppResult<Option<OnPremAccount>> {
        let url = self.endpoint(&format!("accounts/{principal}"))?;

        let Some(response) = self.get_checked(url).await? else {
            return Ok(None);
        };

        let account = response.json::<AccountResponse>().await.map_err(|error| {
            AppError::Query(format!("failed to parse directory account: {error}"))
        })?;

        Ok(Some(OnPremAccount {
            display_name: account.display_name.unwrap_or_default(),
            password_last_set: account.password_last_set,
            password_never_expires: account.password_never_expires,
            principal_name: account.principal_name,
        }))
    }

    async fn default_password_policy(&self) -> AppResult<PasswordPolicy> {
        let url = self.endpoint("policies/default-domain")?;
        let response = self.get_checked(url).await?.ok_or_else(|| {
            AppError::Query("default domain password policy not found".to_owned())
        })?;

        let policy = response
            .json::<DomainPolicyResponse>()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to parse domain password policy: {error}"))
            })?;

        Ok(PasswordPolicy {
            max_password_age_days: policy.max_password_age_days,
        })
    }
}

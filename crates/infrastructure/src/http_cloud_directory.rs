//! Cloud directory adapter over the directory's REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use opswarden_application::{CloudDirectory, CloudDirectoryUser, DirectoryRole, RoleMember};
use opswarden_core::{AppError, AppResult, NonEmptyString};

/// Cloud directory adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpCloudDirectoryConfig {
    /// Base URL of the directory API.
    pub base_url: Url,
    /// Pre-acquired bearer token for the run.
    pub bearer_token: NonEmptyString,
}

/// Cloud directory client speaking the directory's REST API.
#[derive(Clone)]
pub struct HttpCloudDirectory {
    http_client: reqwest::Client,
    config: HttpCloudDirectoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_principal_name: String,
    display_name: Option<String>,
    last_password_change_date_time: Option<DateTime<Utc>>,
    password_policies: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleResponse {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberResponse {
    id: String,
    user_principal_name: Option<String>,
}

/// The directory encodes policy exceptions as a comma-separated flag string
/// on the account.
fn policies_disable_expiration(password_policies: Option<&str>) -> bool {
    password_policies.is_some_and(|policies| {
        policies
            .split(',')
            .any(|flag| flag.trim().eq_ignore_ascii_case("DisablePasswordExpiration"))
    })
}

impl HttpCloudDirectory {
    /// Creates a new cloud directory client.
    pub fn new(config: HttpCloudDirectoryConfig) -> AppResult<Self> {
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
            AppError::Query(format!("invalid cloud directory endpoint '{path}': {error}"))
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
                AppError::Query(format!("failed to call cloud directory: {error}"))
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
                "cloud directory returned status {} for {url}: {body}",
                status.as_u16()
            )));
        }

        Ok(Some(response))
    }
}

#[async_trait]
impl CloudDirectory for HttpCloudDirectory {
    async fn find_user(&self, principal: &str) -> AppResult<Option<CloudDirectoryUser>> {
        let url = self.endpoint(&format!(
            "users/{principal}?$select=userPrincipalName,displayName,lastPasswordChangeDateTime,passwordPolicies"
        ))?;

        let Some(response) = self.get_checked(url).await? else {
            return Ok(None);
        };

        let user = response.json::<UserResponse>().await.map_err(|error| {
            AppError::Query(format!("failed to parse cloud directory user: {error}"))
        })?;

        Ok(Some(CloudDirectoryUser {
            password_never_expires: policies_disable_expiration(user.password_policies.as_deref()),
            display_name: user.display_name.unwrap_or_default(),
            last_password_change: user.last_password_change_date_time,
            principal_name: user.user_principal_name,
        }))
    }

    async fn list_roles(&self) -> AppResult<Vec<DirectoryRole>> {
        let url = self.endpoint("directoryRoles")?;
        let response = self.get_checked(url).await?.ok_or_else(|| {
            AppError::Query("cloud directory role listing endpoint not found".to_owned())
        })?;

        let roles = response
            .json::<ListResponse<RoleResponse>>()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to parse directory role listing: {error}"))
            })?;

        Ok(roles
            .value
            .into_iter()
            .map(|role| DirectoryRole {
                id: role.id,
                display_name: role.display_name,
            })
            .collect())
    }

    async fn list_role_members(&self, role_id: &str) -> AppResult<Vec<RoleMember>> {
        let url = self.endpoint(&format!("directoryRoles/{role_id}/members"))?;
        let response = self.get_checked(url).await?.ok_or_else(|| {
            AppError::Query(format!("directory role '{role_id}' not found"))
        })?;

        let members = response
            .json::<ListResponse<MemberResponse>>()
            .await
            .map_err(|error| {
                AppError::Query(format!("failed to parse role member listing: {error}"))
            })?;

        Ok(members
            .value
            .into_iter()
            .map(|member| RoleMember {
                id: member.id,
                principal_name: member.user_principal_name,
            })
            .collect())
    }
}

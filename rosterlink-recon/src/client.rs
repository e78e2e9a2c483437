//! Person-directory API client
//!
//! Three-operation facade over the external directory service: find, create,
//! set-attribute. All transport failures are translated into
//! [`DirectoryError`] at this boundary; `reqwest` errors never leak upward.
//! Retry and partial-failure policy lives in the driver, not here.

use async_trait::async_trait;
use rosterlink_common::config::ReconConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Header carrying the static directory API token
const AUTH_HEADER: &str = "Authorization-Token";

/// Directory client errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// Non-success HTTP response from the directory
    #[error("directory API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Request never produced an HTTP response (timeout, DNS, connect)
    #[error("directory transport error: {0}")]
    Transport(String),

    /// Response arrived but could not be interpreted
    #[error("directory response parse error: {0}")]
    Parse(String),
}

/// A person record as returned by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "NickName", default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: String,
}

/// The three directory operations the reconciliation core depends on
///
/// Production implementation is [`DirectoryClient`]; tests substitute scripted
/// fakes at this seam.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Find a person matching all three fields exactly (case-sensitive)
    ///
    /// Returns the first match if several exist. `None` always means
    /// "not found", never "error".
    async fn find_person(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<Option<Person>, DirectoryError>;

    /// Create a person, set the named attribute, and return the canonical
    /// created record
    ///
    /// Any sub-step failure fails the whole operation; a created-but-not-
    /// attributed person is repaired by the caller's retry path (find now
    /// succeeds, and `set_attribute` is idempotent).
    async fn create_person(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        attribute_key: &str,
        attribute_value: &str,
    ) -> Result<Person, DirectoryError>;

    /// Set one attribute on an existing person; safe to retry
    async fn set_attribute(
        &self,
        person_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError>;
}

/// Production directory client over HTTP
pub struct DirectoryClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl DirectoryClient {
    pub fn new(config: &ReconConfig) -> Result<Self, DirectoryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.directory_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch the canonical record after create
    async fn get_person(&self, person_id: i64) -> Result<Person, DirectoryError> {
        let response = self
            .http_client
            .get(self.url(&format!("People/{}", person_id)))
            .header(AUTH_HEADER, &self.api_token)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::Parse(e.to_string()))
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn find_person(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<Option<Person>, DirectoryError> {
        let filter = match_filter(first_name, last_name, email);

        tracing::debug!(email = %email, "Querying directory for person");

        let response = self
            .http_client
            .get(self.url("People"))
            .header(AUTH_HEADER, &self.api_token)
            .query(&[("$filter", filter.as_str())])
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Directory find failed");
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let people: Vec<Person> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Parse(e.to_string()))?;

        // First returned match wins; no ranking policy
        Ok(people.into_iter().next())
    }

    async fn create_person(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        attribute_key: &str,
        attribute_value: &str,
    ) -> Result<Person, DirectoryError> {
        let body = serde_json::json!({
            "FirstName": first_name,
            "LastName": last_name,
            "NickName": first_name,
            "Email": email,
            "Gender": 0,
            "IsDeceased": false,
            "EmailPreference": 0,
            "RecordTypeValueId": 1,
            "CommunicationPreference": 1,
            "AgeClassification": 0,
            "IsLockedAsChild": false,
            "AccountProtectionProfile": 0,
            "IsSystem": false,
        });

        let response = self
            .http_client
            .post(self.url("People"))
            .header(AUTH_HEADER, &self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !(status.as_u16() == 200 || status.as_u16() == 201) {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Directory create failed");
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;
        let person_id = parse_created_id(&text)?;

        tracing::info!(
            directory_id = person_id,
            email = %email,
            "Directory person created"
        );

        self.set_attribute(person_id, attribute_key, attribute_value)
            .await?;

        self.get_person(person_id).await
    }

    async fn set_attribute(
        &self,
        person_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError> {
        let response = self
            .http_client
            .post(self.url(&format!("People/AttributeValue/{}", person_id)))
            .header(AUTH_HEADER, &self.api_token)
            .query(&[("attributeKey", key), ("attributeValue", value)])
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // 204 is success and carries no body; only failures are read
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                directory_id = person_id,
                "Directory attribute update failed"
            );
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(directory_id = person_id, attribute = %key, "Attribute set");
        Ok(())
    }
}

/// Build the exact-match filter expression over all three fields
///
/// Single quotes in values are escaped by doubling, per the directory's
/// OData-like query syntax.
fn match_filter(first_name: &str, last_name: &str, email: &str) -> String {
    format!(
        "(Email eq '{}') and (FirstName eq '{}') and (LastName eq '{}')",
        escape_odata(email),
        escape_odata(first_name),
        escape_odata(last_name)
    )
}

fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

/// Parse the id from a person-creation response body
///
/// The directory returns either a bare numeric id or a JSON object carrying
/// `Id` (observed in the wild with both casings).
fn parse_created_id(body: &str) -> Result<i64, DirectoryError> {
    if let Ok(id) = body.trim().parse::<i64>() {
        return Ok(id);
    }

    let value: serde_json::Value = serde_json::from_str(body).map_err(|_| {
        DirectoryError::Parse(format!("No id in person creation response: {}", body))
    })?;
    value
        .get("Id")
        .or_else(|| value.get("id"))
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| {
            DirectoryError::Parse(format!("No id in person creation response: {}", body))
        })
}

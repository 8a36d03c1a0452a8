//! Minimal ClickUp API surface: the workspace-list call used for token
//! validation and migration.
//!
//! The trait is the seam between the engine and the network; tests implement
//! it with in-memory fakes, production uses [`ClickUpClient`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const BASE_URL: &str = "https://api.clickup.com/api/v2";

#[derive(Debug, Error)]
pub enum ClickUpError {
    /// The API answered and refused the token (expired or revoked).
    #[error("ClickUp rejected the token (HTTP {0})")]
    TokenRejected(u16),
    /// The API could not be reached or did not answer within the timeout.
    #[error("ClickUp unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected ClickUp response: {0}")]
    BadResponse(String),
}

/// A ClickUp workspace as returned by the `/team` endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
struct TeamsResponse {
    teams: Vec<Workspace>,
}

/// The slice of the ClickUp API this crate consumes.
#[async_trait]
pub trait ClickUpApi: Send + Sync {
    /// List the workspaces the token is authorized for. Doubles as the
    /// lightweight "is this token still accepted" check.
    async fn list_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ClickUpError>;
}

/// HTTP client for the ClickUp REST API.
///
/// Personal API tokens go in the `Authorization` header verbatim (no Bearer
/// prefix). The timeout bounds every validation call so a slow upstream can
/// never hang a status request.
pub struct ClickUpClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ClickUpClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(BASE_URL.to_string(), timeout)
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn with_base_url(base_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait]
impl ClickUpApi for ClickUpClient {
    async fn list_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ClickUpError> {
        let url = format!("{}/team", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| ClickUpError::Unreachable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClickUpError::TokenRejected(response.status().as_u16()))
            }
            s if !s.is_success() => Err(ClickUpError::BadResponse(format!("HTTP {s}"))),
            _ => {
                let body: TeamsResponse = response
                    .json()
                    .await
                    .map_err(|e| ClickUpError::BadResponse(e.to_string()))?;
                Ok(body.teams)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_list_workspaces() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/team")
            .match_header("Authorization", "pk_token_123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r##"{
                    "teams": [
                        {"id": "9001", "name": "Acme Inc", "color": "#40bc86"},
                        {"id": "9002", "name": "Side Project", "color": "#ffffff"}
                    ]
                }"##,
            )
            .create_async()
            .await;

        let client = ClickUpClient::with_base_url(server.url(), Duration::from_secs(5));
        let workspaces = client.list_workspaces("pk_token_123").await.unwrap();

        assert_eq!(workspaces.len(), 2);
        assert_eq!(workspaces[0].id, "9001");
        assert_eq!(workspaces[0].name, "Acme Inc");
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/team")
            .with_status(401)
            .with_body(r#"{"err": "Token invalid", "ECODE": "OAUTH_025"}"#)
            .create_async()
            .await;

        let client = ClickUpClient::with_base_url(server.url(), Duration::from_secs(5));
        let result = client.list_workspaces("pk_revoked").await;

        assert!(matches!(result, Err(ClickUpError::TokenRejected(401))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_a_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/team")
            .with_status(502)
            .create_async()
            .await;

        let client = ClickUpClient::with_base_url(server.url(), Duration::from_secs(5));
        let result = client.list_workspaces("pk_token_123").await;

        assert!(matches!(result, Err(ClickUpError::BadResponse(_))));
    }
}

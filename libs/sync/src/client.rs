//! HTTP client for the portal REST API.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::credentials::CredentialProvider;
use crate::idempotency::IDEMPOTENCY_KEY_HEADER;
use crate::SyncError;

/// REST client authenticated with the ambient session cookie.
///
/// The cookie is read from the credential provider on every request, so a
/// re-login is picked up without rebuilding the client.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach the session cookie, if there is a session.
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, SyncError> {
        match self.credentials.session() {
            Some(session) => {
                let value = HeaderValue::from_str(&session.cookie).map_err(|_| {
                    SyncError::Config("session cookie is not a valid header value".into())
                })?;
                Ok(request.header(COOKIE, value))
            }
            None => Ok(request),
        }
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        debug!(path, "GET");
        let request = self.authorize(self.client.get(self.url(path)))?;
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Make a PUT request with an optional Idempotency-Key.
    pub async fn put_with_idempotency_key<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<T, SyncError> {
        debug!(path, "PUT");
        let mut request = self.authorize(self.client.put(self.url(path)).json(body))?;
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Make a POST request without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        debug!(path, "POST");
        let request = self.authorize(self.client.post(self.url(path)))?;
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Handle a successful or error response.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, SyncError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| SyncError::Decode(e.to_string()))
        } else {
            self.handle_error(response).await
        }
    }

    /// Handle an error response.
    async fn handle_error<T>(&self, response: reqwest::Response) -> Result<T, SyncError> {
        let status = response.status().as_u16();

        if status == 401 {
            return Err(SyncError::NotAuthenticated);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(ApiErrorResponse::into_message)
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body
                }
            });

        Err(SyncError::api(status, message))
    }
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorResponse {
    fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or(self.error)
    }
}

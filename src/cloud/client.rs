//! Cloud control-plane HTTP client.
//!
//! Thin transport layer: acquires a bearer token from the identity
//! provider, then issues resource PUT/GET/POST calls with a bounded
//! retry loop for transient failures.

use reqwest::{Client, Method, header};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{CloudError, Result, SkyliftError};
use crate::params::{ParamContext, names};

/// Default control-plane endpoint.
const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

/// Default identity-provider endpoint.
const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";

/// Request timeout in seconds. Ensure calls block until the control
/// plane reports completion, which can take minutes for larger resources.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Connection settings for the control plane.
#[derive(Debug, Clone)]
pub struct ArmConfig {
    /// Control-plane base URL.
    pub management_url: String,
    /// Identity-provider base URL.
    pub login_url: String,
    /// Identity-provider tenant.
    pub tenant_id: String,
    /// Client (application) id used to authenticate.
    pub client_id: String,
    /// Client secret used to authenticate.
    pub client_secret: String,
    /// Subscription every resource lives under.
    pub subscription_id: String,
    /// Resource group every resource lives in.
    pub resource_group: String,
    /// Region every resource is placed in.
    pub location: String,
}

impl ArmConfig {
    /// Builds connection settings from the resolved parameter context.
    ///
    /// # Errors
    ///
    /// Returns an error if a required connection parameter is absent.
    pub fn from_params(params: &ParamContext) -> Result<Self> {
        Ok(Self {
            management_url: String::from(DEFAULT_MANAGEMENT_URL),
            login_url: String::from(DEFAULT_LOGIN_URL),
            tenant_id: params.str_value(names::TENANT_ID)?.to_string(),
            client_id: params.str_value(names::CLIENT_ID)?.to_string(),
            client_secret: params.str_value(names::CLIENT_SECRET)?.to_string(),
            subscription_id: params.str_value(names::SUBSCRIPTION_ID)?.to_string(),
            resource_group: params.str_value(names::RESOURCE_GROUP)?.to_string(),
            location: params.str_value(names::LOCATION)?.to_string(),
        })
    }

    /// Overrides the service endpoints (used by tests against a local
    /// HTTP fixture).
    #[must_use]
    pub fn with_endpoints(
        mut self,
        management_url: impl Into<String>,
        login_url: impl Into<String>,
    ) -> Self {
        self.management_url = management_url.into();
        self.login_url = login_url.into();
        self
    }
}

/// Token response from the identity provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Control-plane API client.
#[derive(Debug, Clone)]
pub struct ArmClient {
    /// HTTP client.
    http: Client,
    /// Connection settings.
    config: ArmConfig,
    /// Bearer token acquired at connect time.
    token: String,
}

impl ArmClient {
    /// Connects to the control plane: builds the HTTP client and
    /// acquires a bearer token via the client-credentials flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the
    /// identity provider rejects the credentials.
    pub async fn connect(config: ArmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CloudError::network(format!("Failed to create HTTP client: {e}")))?;

        let token = Self::acquire_token(&http, &config).await?;

        Ok(Self {
            http,
            config,
            token,
        })
    }

    /// Acquires a bearer token from the identity provider.
    async fn acquire_token(http: &Client, config: &ArmConfig) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            config.login_url, config.tenant_id
        );
        let scope = format!("{}/.default", config.management_url);

        debug!("Acquiring control-plane token for tenant {}", config.tenant_id);

        let response = http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CloudError::network(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SkyliftError::Cloud(CloudError::AuthenticationFailed {
                message: format!("{status}: {body}"),
            }));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SkyliftError::Cloud(CloudError::InvalidResponse {
                message: format!("Failed to parse token response: {e}"),
            })
        })?;

        Ok(token.access_token)
    }

    /// Returns the resource-group path prefix every resource lives under.
    #[must_use]
    pub fn group_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.config.subscription_id, self.config.resource_group
        )
    }

    /// Returns the configured region.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.config.location
    }

    /// Issues an idempotent ensure (PUT) call.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails after bounded retries.
    pub async fn put(
        &self,
        path: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.send(Method::PUT, path, api_version, Some(body)).await
    }

    /// Issues a read (GET) call.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails after bounded retries.
    pub async fn get(&self, path: &str, api_version: &str) -> Result<serde_json::Value> {
        self.send(Method::GET, path, api_version, None).await
    }

    /// Issues an action (POST) call.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails after bounded retries.
    pub async fn post(
        &self,
        path: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.send(Method::POST, path, api_version, Some(body)).await
    }

    /// Sends a request with bounded retry for transient failures.
    async fn send(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {path}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.send_once(method.clone(), path, api_version, body).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SkyliftError::Cloud(CloudError::network("Max retries exceeded"))
        }))
    }

    /// Sends a single request.
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}{path}?api-version={api_version}",
            self.config.management_url
        );
        trace!("{method} {url}");

        let mut request = self
            .http
            .request(method, &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            SkyliftError::Cloud(CloudError::network(format!("Request failed: {e}")))
        })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(SkyliftError::Cloud(CloudError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SkyliftError::Cloud(CloudError::AuthenticationFailed {
                message: String::from("Token rejected by the control plane"),
            }));
        }

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SkyliftError::Cloud(CloudError::request(
                status.as_u16(),
                body_text,
            )));
        }

        response.json().await.map_err(|e| {
            SkyliftError::Cloud(CloudError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })
    }
}

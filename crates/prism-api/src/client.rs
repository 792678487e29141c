//! Credential-aware HTTP client for the Prism APIs
//!
//! One client type covers both upstream conventions: the central
//! management API takes requests at `{base}/{path}`, element clusters
//! route everything through their REST gateway at
//! `{base}/PrismGateway/services/rest/{path}/`. Which convention applies
//! is a property of the client, selected at construction from the role
//! class. Every request carries HTTP basic auth from the client's current
//! credential pair; the pair sits behind a read/write lock so a refresh
//! can replace it in place while scrapes keep reading.

use crate::credentials::{CredentialPair, CredentialProvider, RoleClass};
use prism_core::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// TLS verification and timeout policy applied to every request.
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    /// Skip TLS certificate verification (appliance endpoints ship
    /// self-signed certificates).
    pub skip_tls_verify: bool,
    /// Bound on every outbound request, connect to body.
    pub timeout: Duration,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            skip_tls_verify: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// URL convention of an upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `{base}/{path}`
    Central,
    /// `{base}/PrismGateway/services/rest/{path}/`
    Element,
}

impl PathStyle {
    /// Convention used by clients of the given role class.
    pub fn for_role(role: RoleClass) -> Self {
        match role {
            RoleClass::Central => PathStyle::Central,
            RoleClass::Element => PathStyle::Element,
        }
    }

    /// Build the full request URL for an action path.
    pub fn request_url(&self, base: &str, path: &str) -> String {
        let base = base.trim_end_matches('/');
        let path = path.trim_matches('/');
        match self {
            PathStyle::Central => format!("{}/{}", base, path),
            PathStyle::Element => format!("{}/PrismGateway/services/rest/{}/", base, path),
        }
    }
}

/// Optional request components: JSON body and query pairs.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

/// API client bound to one cluster and role.
pub struct PrismClient {
    cluster: String,
    base_url: String,
    role: RoleClass,
    style: PathStyle,
    credentials: RwLock<CredentialPair>,
    http: reqwest::Client,
}

impl PrismClient {
    /// Build a client for the given cluster. Fails when the underlying
    /// HTTP client cannot be constructed.
    pub fn new(
        cluster: impl Into<String>,
        base_url: impl Into<String>,
        role: RoleClass,
        credentials: CredentialPair,
        policy: &ClientPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(policy.timeout)
            .danger_accept_invalid_certs(policy.skip_tls_verify)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cluster: cluster.into(),
            base_url: base_url.into(),
            role,
            style: PathStyle::for_role(role),
            credentials: RwLock::new(credentials),
            http,
        })
    }

    /// Cluster this client is bound to.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Base URL this client is bound to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an action path under this client's convention.
    pub fn request_url(&self, path: &str) -> String {
        self.style.request_url(&self.base_url, path)
    }

    /// Build a request with basic auth from the current credential pair.
    pub async fn create_request(
        &self,
        method: Method,
        path: &str,
        params: &RequestParams,
    ) -> reqwest::RequestBuilder {
        let url = self.request_url(path);
        debug!(cluster = %self.cluster, %url, "sending request");

        let creds = self.credentials.read().await;
        let mut request = self
            .http
            .request(method, &url)
            .basic_auth(&creds.username, Some(&creds.secret))
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = &params.body {
            request = request.json(body);
        }
        if !params.query.is_empty() {
            request = request.query(&params.query);
        }
        request
    }

    /// Send a prepared request, mapping transport failures.
    pub async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| Error::http(format!("request failed: {}", e)))
    }

    /// Issue a request and decode the JSON body.
    ///
    /// 401/403 map to [`Error::Unauthorized`] so callers can trip the
    /// staleness machinery; other non-2xx statuses map to [`Error::Api`].
    pub async fn fetch_json(
        &self,
        method: Method,
        path: &str,
        params: &RequestParams,
    ) -> Result<Value> {
        let request = self.create_request(method, path, params).await;
        let response = self.execute(request).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::unauthorized(&self.cluster));
        }
        if !status.is_success() {
            return Err(Error::api(format!("request to {} failed: {}", path, status)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::api(format!("error decoding response body: {}", e)))
    }

    /// Replace the credential pair in place from the provider.
    pub async fn refresh_credentials(&self, provider: &dyn CredentialProvider) -> Result<()> {
        let fresh = provider.credentials(&self.cluster, self.role).await?;
        *self.credentials.write().await = fresh;
        Ok(())
    }
}

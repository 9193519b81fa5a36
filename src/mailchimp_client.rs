use std::time::Duration;

use reqwest::Client;
use reqwest::Method;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde_json::Map;
use serde_json::Value;

/// Thin client for the MailChimp Marketing API (v3).
///
/// `reqwest::Client` keeps a connection pool internally, so a single
/// `MailChimpClient` is built at startup and shared by every worker.
pub struct MailChimpClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum MailChimpError {
    /// Non-2xx response; `message` is MailChimp's own explanation
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("MailChimp returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl MailChimpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::Decode(_) => None,
        }
    }
}

impl MailChimpClient {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    #[tracing::instrument(name = "GET from MailChimp", skip(self))]
    pub async fn get(
        &self,
        path: &str,
    ) -> Result<Value, MailChimpError> {
        self.send(Method::GET, path, None).await
    }

    #[tracing::instrument(name = "POST to MailChimp", skip(self, body))]
    pub async fn post(
        &self,
        path: &str,
        body: &Map<String, Value>,
    ) -> Result<Value, MailChimpError> {
        self.send(Method::POST, path, Some(body)).await
    }

    #[tracing::instrument(name = "PATCH to MailChimp", skip(self, body))]
    pub async fn patch(
        &self,
        path: &str,
        body: &Map<String, Value>,
    ) -> Result<Value, MailChimpError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    #[tracing::instrument(name = "DELETE from MailChimp", skip(self))]
    pub async fn delete(
        &self,
        path: &str,
    ) -> Result<Value, MailChimpError> {
        self.send(Method::DELETE, path, None).await
    }

    /// Any non-2xx status is an error. An empty success body (e.g. 204 on
    /// delete) is returned as `Value::Null`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Map<String, Value>>,
    ) -> Result<Value, MailChimpError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        // the username is ignored by MailChimp; only the key matters
        let mut request = self
            .http_client
            .request(method, &url)
            .basic_auth("apikey", Some(self.api_key.expose_secret()));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            tracing::warn!(%status, %message, "MailChimp rejected request");
            return Err(MailChimpError::Api { status, message });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// MailChimp errors are RFC 7807 problem documents: prefer `detail`, then
/// `title`, then the status text.
fn error_message(
    status: StatusCode,
    body: &[u8],
) -> String {
    let problem: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    ["detail", "title"]
        .iter()
        .filter_map(|key| problem.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

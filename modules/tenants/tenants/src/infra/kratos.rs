//! Kratos admin API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::ports::{Identity, IdentityDirectory, IdentityError, RecoveryLink};

/// Identity schema used for identities created by the service.
const IDENTITY_SCHEMA: &str = "default";

/// Kratos admin endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KratosConfig {
    /// Base URL of the Kratos admin API, e.g. `http://kratos:4434`.
    pub admin_url: String,

    pub request_timeout_secs: u64,
}

impl Default for KratosConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://127.0.0.1:4434".to_owned(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KratosClient {
    http: reqwest::Client,
    admin_url: Url,
}

#[derive(Deserialize)]
struct WireIdentity {
    id: String,
    #[serde(default)]
    traits: WireTraits,
}

#[derive(Deserialize, Default)]
struct WireTraits {
    #[serde(default)]
    email: String,
}

impl From<WireIdentity> for Identity {
    fn from(w: WireIdentity) -> Self {
        Self {
            id: w.id,
            email: w.traits.email,
        }
    }
}

#[derive(Serialize)]
struct CreateIdentityBody<'a> {
    schema_id: &'a str,
    traits: CreateTraits<'a>,
}

#[derive(Serialize)]
struct CreateTraits<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct RecoveryCodeBody<'a> {
    identity_id: &'a str,
    expires_in: String,
}

#[derive(Deserialize)]
struct RecoveryCodeResponse {
    recovery_link: String,
    recovery_code: String,
}

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: String,
}

impl KratosClient {
    /// # Errors
    /// [`IdentityError::Config`] when the admin URL is invalid or the HTTP client cannot be built.
    pub fn new(cfg: &KratosConfig) -> Result<Self, IdentityError> {
        let mut base = cfg.admin_url.trim_end_matches('/').to_owned();
        base.push('/');
        let admin_url = Url::parse(&base)
            .map_err(|e| IdentityError::Config(format!("invalid Kratos admin url {base}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| IdentityError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, admin_url })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, IdentityError> {
        let url = self
            .admin_url
            .join(path)
            .map_err(|e| IdentityError::Config(format!("invalid path {path}: {e}")))?;
        Ok(self.http.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, IdentityError> {
        let resp = req
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, &resp.text().await.unwrap_or_default()));
        }

        resp.json::<T>()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }
}

fn api_error(status: StatusCode, body: &str) -> IdentityError {
    let parsed: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let message = [parsed.error.message, parsed.error.reason]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(": ");
    IdentityError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            body.to_owned()
        } else {
            message
        },
    }
}

#[async_trait]
impl IdentityDirectory for KratosClient {
    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let req = self
            .request(Method::GET, "admin/identities")?
            .query(&[("credentials_identifier", email)]);
        match self.send::<Vec<WireIdentity>>(req).await {
            Ok(found) => Ok(found.into_iter().next().map(Into::into)),
            Err(IdentityError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn create(&self, email: &str) -> Result<Identity, IdentityError> {
        let body = CreateIdentityBody {
            schema_id: IDENTITY_SCHEMA,
            traits: CreateTraits { email },
        };
        let req = self.request(Method::POST, "admin/identities")?.json(&body);
        let created: WireIdentity = self.send(req).await?;
        Ok(created.into())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Identity, IdentityError> {
        let req = self.request(Method::GET, &format!("admin/identities/{id}"))?;
        match self.send::<WireIdentity>(req).await {
            Ok(identity) => Ok(identity.into()),
            Err(IdentityError::Api { status: 404, .. }) => {
                Err(IdentityError::NotFound(id.to_owned()))
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn issue_recovery_link(
        &self,
        id: &str,
        ttl: Duration,
    ) -> Result<RecoveryLink, IdentityError> {
        let body = RecoveryCodeBody {
            identity_id: id,
            expires_in: format!("{}s", ttl.as_secs()),
        };
        let req = self.request(Method::POST, "admin/recovery/code")?.json(&body);
        let resp: RecoveryCodeResponse = self.send(req).await?;
        Ok(RecoveryLink {
            link: resp.recovery_link,
            code: resp.recovery_code,
        })
    }
}

//! OpenFGA HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tenant_authz_sdk::{AuthorizationModel, AuthzError, ReadPage, Tuple, TupleFilter, TupleStore};
use url::Url;

use crate::config::OpenFgaConfig;

/// [`TupleStore`] backed by an OpenFGA store.
#[derive(Clone)]
pub struct OpenFgaClient {
    http: reqwest::Client,
    store_url: Url,
    model_id: Option<String>,
    token: Option<SecretString>,
    page_size: u32,
}

impl std::fmt::Debug for OpenFgaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFgaClient")
            .field("store_url", &self.store_url.as_str())
            .field("model_id", &self.model_id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

// ---- wire types ----

#[derive(Serialize)]
struct TupleKeys<'a> {
    tuple_keys: &'a [Tuple],
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    tuple_key: &'a Tuple,
    #[serde(skip_serializing_if = "Option::is_none")]
    contextual_tuples: Option<TupleKeys<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

#[derive(Serialize)]
struct ListObjectsRequest<'a> {
    user: &'a str,
    relation: &'a str,
    #[serde(rename = "type")]
    object_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ListObjectsResponse {
    #[serde(default)]
    objects: Vec<String>,
}

#[derive(Serialize)]
struct WriteBatch<'a> {
    tuple_keys: &'a [Tuple],
    #[serde(skip_serializing_if = "Option::is_none")]
    on_duplicate: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    on_missing: Option<&'static str>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    writes: Option<WriteBatch<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletes: Option<WriteBatch<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ReadTupleKey<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relation: Option<&'a str>,
    object: &'a str,
}

#[derive(Serialize)]
struct ReadRequest<'a> {
    tuple_key: ReadTupleKey<'a>,
    page_size: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    continuation_token: &'a str,
}

#[derive(Deserialize)]
struct StoredTuple {
    key: Tuple,
}

#[derive(Deserialize)]
struct ReadResponse {
    #[serde(default)]
    tuples: Vec<StoredTuple>,
    #[serde(default)]
    continuation_token: String,
}

#[derive(Deserialize)]
struct ModelResponse {
    authorization_model: AuthorizationModel,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    authorization_models: Vec<AuthorizationModel>,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl OpenFgaClient {
    /// Builds a client for the store described by `cfg`.
    ///
    /// # Errors
    /// [`AuthzError::Config`] when the store id is missing, the base URL is invalid,
    /// or the HTTP client cannot be built.
    pub fn new(cfg: &OpenFgaConfig) -> Result<Self, AuthzError> {
        if cfg.store_id.trim().is_empty() {
            return Err(AuthzError::Config("store_id is required".to_owned()));
        }
        let base = format!(
            "{}://{}/stores/{}/",
            cfg.api_scheme,
            cfg.api_host.trim_end_matches('/'),
            cfg.store_id
        );
        let store_url = Url::parse(&base)
            .map_err(|e| AuthzError::Config(format!("invalid OpenFGA url {base}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| AuthzError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            store_url,
            model_id: cfg.model_id.clone().filter(|id| !id.is_empty()),
            token: cfg.api_token.clone(),
            page_size: cfg.read_page_size.max(1),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AuthzError> {
        let url = self
            .store_url
            .join(path)
            .map_err(|e| AuthzError::Config(format!("invalid path {path}: {e}")))?;
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AuthzError> {
        let resp = req
            .send()
            .await
            .map_err(|e| AuthzError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, &resp.text().await.unwrap_or_default()));
        }

        resp.json::<T>()
            .await
            .map_err(|e| AuthzError::Decode(e.to_string()))
    }

    async fn write(&self, body: &WriteRequest<'_>) -> Result<(), AuthzError> {
        let req = self.request(Method::POST, "write")?.json(body);
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }

    async fn loaded_model(&self) -> Result<Option<AuthorizationModel>, AuthzError> {
        if let Some(id) = &self.model_id {
            let req = self.request(Method::GET, &format!("authorization-models/{id}"))?;
            let resp: ModelResponse = self.send(req).await?;
            return Ok(Some(resp.authorization_model));
        }
        let req = self
            .request(Method::GET, "authorization-models")?
            .query(&[("page_size", "1")]);
        let resp: ModelsResponse = self.send(req).await?;
        Ok(resp.authorization_models.into_iter().next())
    }
}

fn api_error(status: StatusCode, body: &str) -> AuthzError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = if parsed.code.is_empty() {
        "unknown".to_owned()
    } else {
        parsed.code
    };
    let message = if parsed.message.is_empty() {
        body.to_owned()
    } else {
        parsed.message
    };
    AuthzError::api(status.as_u16(), code, message)
}

#[async_trait]
impl TupleStore for OpenFgaClient {
    #[tracing::instrument(skip(self, contextual), fields(contextual = contextual.len()))]
    async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &[Tuple],
    ) -> Result<bool, AuthzError> {
        let tuple = Tuple::new(user, relation, object);
        let body = CheckRequest {
            tuple_key: &tuple,
            contextual_tuples: (!contextual.is_empty()).then_some(TupleKeys {
                tuple_keys: contextual,
            }),
            authorization_model_id: self.model_id.as_deref(),
        };
        let req = self.request(Method::POST, "check")?.json(&body);
        let resp: CheckResponse = self.send(req).await?;
        Ok(resp.allowed)
    }

    #[tracing::instrument(skip(self))]
    async fn list_objects(
        &self,
        user: &str,
        relation: &str,
        object_type: &str,
    ) -> Result<Vec<String>, AuthzError> {
        let body = ListObjectsRequest {
            user,
            relation,
            object_type,
            authorization_model_id: self.model_id.as_deref(),
        };
        let req = self.request(Method::POST, "list-objects")?.json(&body);
        let resp: ListObjectsResponse = self.send(req).await?;
        Ok(resp.objects)
    }

    #[tracing::instrument(skip(self), fields(tuple = %tuple))]
    async fn write_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
        self.write(&WriteRequest {
            writes: Some(WriteBatch {
                tuple_keys: std::slice::from_ref(tuple),
                on_duplicate: Some("ignore"),
                on_missing: None,
            }),
            deletes: None,
            authorization_model_id: self.model_id.as_deref(),
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(tuple = %tuple))]
    async fn delete_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
        self.delete_tuples(std::slice::from_ref(tuple)).await
    }

    #[tracing::instrument(skip(self, tuples), fields(count = tuples.len()))]
    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<(), AuthzError> {
        if tuples.is_empty() {
            return Ok(());
        }
        self.write(&WriteRequest {
            writes: None,
            deletes: Some(WriteBatch {
                tuple_keys: tuples,
                on_duplicate: None,
                on_missing: Some("ignore"),
            }),
            authorization_model_id: self.model_id.as_deref(),
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(object = %filter.object))]
    async fn read_tuples(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> Result<ReadPage, AuthzError> {
        let body = ReadRequest {
            tuple_key: ReadTupleKey {
                user: filter.user.as_deref(),
                relation: filter.relation.as_deref(),
                object: &filter.object,
            },
            page_size: self.page_size,
            continuation_token,
        };
        let req = self.request(Method::POST, "read")?.json(&body);
        let resp: ReadResponse = self.send(req).await?;
        Ok(ReadPage {
            tuples: resp.tuples.into_iter().map(|t| t.key).collect(),
            continuation_token: resp.continuation_token,
        })
    }

    #[tracing::instrument(skip(self, expected))]
    async fn compare_model(&self, expected: &AuthorizationModel) -> Result<bool, AuthzError> {
        let Some(loaded) = self.loaded_model().await? else {
            tracing::warn!("authorization store has no model loaded");
            return Ok(false);
        };
        Ok(expected.equivalent(&loaded))
    }
}

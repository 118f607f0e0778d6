use secrecy::SecretString;
use serde::Deserialize;

/// Authorization store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenFgaConfig {
    /// When false, a no-op store is used that allows every check and writes nothing.
    pub enabled: bool,

    /// `http` or `https`.
    pub api_scheme: String,

    /// Host and optional port of the OpenFGA HTTP API.
    pub api_host: String,

    pub store_id: String,

    /// Bearer token for the OpenFGA API, if it requires one.
    pub api_token: Option<SecretString>,

    /// Pinned authorization model. When unset, the store's latest model is used.
    pub model_id: Option<String>,

    /// Timeout of a single HTTP request to the store.
    pub request_timeout_secs: u64,

    /// Page size used when reading tuples.
    pub read_page_size: u32,
}

impl Default for OpenFgaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_scheme: "http".to_owned(),
            api_host: "127.0.0.1:8080".to_owned(),
            store_id: String::new(),
            api_token: None,
            model_id: None,
            request_timeout_secs: 10,
            read_page_size: 50,
        }
    }
}

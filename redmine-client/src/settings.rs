//! Connection settings.
//!
//! Read from the same YAML document as the field schema. Explicit overrides
//! win over the document.

use crate::error::{ClientError, ClientResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seconds before a request to the tracker is abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Where the tracker lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Base URI of the tracker, e.g. `http://example.com/redmine/`.
    #[serde(default)]
    pub uri: Option<String>,
    /// Sent as `X-Redmine-API-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Basic auth user.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            uri: None,
            api_key: None,
            user_name: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConnectionSettings {
    /// Settings for a tracker URI with no credentials.
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_basic_auth(
        mut self,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    /// Reads the connection keys of a configuration document. Schema sections
    /// and other keys are ignored.
    pub fn from_document(document: &serde_yaml::Value) -> ClientResult<Self> {
        serde_yaml::from_value(document.clone())
            .map_err(|e| ClientError::Config(format!("malformed connection settings: {e}")))
    }

    /// Applies every field set in `overrides` on top of these settings.
    #[must_use]
    pub fn merge(self, overrides: &Overrides) -> Self {
        Self {
            uri: overrides.uri.clone().or(self.uri),
            api_key: overrides.api_key.clone().or(self.api_key),
            user_name: overrides.user_name.clone().or(self.user_name),
            password: overrides.password.clone().or(self.password),
            timeout_secs: self.timeout_secs,
        }
    }

    /// Parses the configured URI.
    pub fn endpoint(&self) -> ClientResult<Endpoint> {
        let uri = self
            .uri
            .as_deref()
            .ok_or_else(|| ClientError::Config("missing `uri`".into()))?;
        Endpoint::parse(uri)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The API key, unless unset or empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }

    /// The basic auth user, unless unset or empty.
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref().filter(|user| !user.is_empty())
    }
}

/// Values given by the caller that replace the document's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub uri: Option<String>,
    pub api_key: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
}

/// A parsed tracker base URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parses an `http` or `https` URI. One trailing slash is dropped from the
    /// path; the port defaults to the scheme's.
    pub fn parse(uri: &str) -> ClientResult<Self> {
        let invalid = |reason: &str| ClientError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query strings and fragments are not supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let path = url.path();
        let path = path.strip_suffix('/').unwrap_or(path);
        let full = url.as_str();
        let full = full.strip_suffix('/').unwrap_or(full);

        Ok(Self {
            uri: full.to_string(),
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// The normalized URI, without a trailing slash.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path prefix of the tracker, empty at the server root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `{uri}/issues/{id}.json`
    pub fn issue_url(&self, id: u64) -> String {
        format!("{}/issues/{id}.json", self.uri)
    }

    /// `{uri}/issues.json`
    pub fn issues_url(&self) -> String {
        format!("{}/issues.json", self.uri)
    }
}

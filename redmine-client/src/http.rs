//! Blocking HTTP transport for the Redmine REST API.

use crate::error::{ClientError, ClientResult};
use crate::settings::{ConnectionSettings, Endpoint};
use redmine_model::{TicketResult, TicketTransport};
use reqwest::{Method, StatusCode};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

/// Header carrying the tracker's API key.
pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";

const JSON: &str = "application/json";

/// Talks to one tracker over HTTP. Every request carries the API key and basic
/// auth credentials when they are configured.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    settings: ConnectionSettings,
    endpoint: Endpoint,
    client: Client,
}

impl HttpTransport {
    /// Builds a transport. Fails when the URI is missing or unusable.
    pub fn new(settings: ConnectionSettings) -> ClientResult<Self> {
        let endpoint = settings.endpoint()?;
        let client = Client::builder().timeout(settings.timeout()).build()?;
        debug!(
            "HTTP transport for {} (host {}, port {})",
            endpoint.uri(),
            endpoint.host(),
            endpoint.port()
        );
        Ok(Self {
            settings,
            endpoint,
            client,
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// `GET /issues/{id}.json`. 404 is [`ClientError::NotFound`].
    pub fn get_issue(&self, id: u64) -> ClientResult<Value> {
        let response = self
            .request(Method::GET, &self.endpoint.issue_url(id))
            .header(ACCEPT, JSON)
            .send()?;

        match response.status() {
            StatusCode::OK => Ok(response.json()?),
            StatusCode::NOT_FOUND => {
                debug!("Issue {} not found", id);
                Err(ClientError::NotFound(id))
            }
            _ => Err(failure("get issue", response)),
        }
    }

    /// `POST /issues.json`. Only 201 counts as created.
    pub fn post_issue(&self, payload: &Value) -> ClientResult<Value> {
        let response = self
            .request(Method::POST, &self.endpoint.issues_url())
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .json(payload)
            .send()?;

        if response.status() != StatusCode::CREATED {
            return Err(failure("create issue", response));
        }
        let document: Value = response.json()?;
        debug!("POST {} answered 201", self.endpoint.issues_url());
        Ok(document)
    }

    /// `DELETE /issues/{id}.json`. 200 and 204 count as deleted.
    pub fn delete_issue(&self, id: u64) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &self.endpoint.issue_url(id))
            .send()?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!("DELETE issue {} answered {}", id, response.status());
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(id)),
            _ => Err(failure("delete issue", response)),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(api_key) = self.settings.api_key() {
            request = request.header(API_KEY_HEADER, api_key);
        }
        if let Some(user_name) = self.settings.user_name() {
            request = request.basic_auth(user_name, self.settings.password.as_deref());
        }
        request
    }
}

/// Turns a non-success response into a status error, keeping the body as the
/// message.
fn failure(action: &str, response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    warn!("{} failed with {}: {}", action, status, body);
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        body
    };
    ClientError::Status {
        status: status.as_u16(),
        message,
    }
}

impl TicketTransport for HttpTransport {
    fn fetch(&self, id: u64) -> TicketResult<Value> {
        Ok(self.get_issue(id)?)
    }

    fn create_remote(&self, payload: &Value) -> TicketResult<Value> {
        Ok(self.post_issue(payload)?)
    }

    fn delete_remote(&self, id: u64) -> bool {
        match self.delete_issue(id) {
            Ok(()) => true,
            Err(e) => {
                warn!("Delete of issue {} not confirmed: {}", id, e);
                false
            }
        }
    }
}

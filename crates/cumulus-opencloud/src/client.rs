//! HTTP access to the Open Cloud service APIs
//!
//! [`ServiceClient`] carries the endpoint and token of one service and
//! builds its URLs. [`Collection`] adapts one REST collection of that
//! service to the [`RemoteClient`] seam the reconciler drives.

use crate::error::Result;
use async_trait::async_trait;
use cumulus_config::{ConfigError, ProviderConfig, Service};
use cumulus_core::{ReconcileError, RemoteClient, RemoteResponse};
use reqwest::Method;
use reqwest::header::ACCEPT;
use serde_json::Value;

pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Client for one service endpoint
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    project_id: String,
}

impl ServiceClient {
    pub fn new(config: &ProviderConfig, service: Service) -> Result<Self> {
        let endpoint = config.endpoint(service)?;
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let project_id = config.project()?.to_string();

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!("cumulus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http(http, endpoint, token, project_id))
    }

    pub fn with_http(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        token: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
            project_id: project_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Join path segments onto the endpoint with single slashes
    pub fn service_url<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut url = self.endpoint.trim_end_matches('/').to_string();
        for segment in segments {
            let segment = segment.as_ref().trim_matches('/');
            if segment.is_empty() {
                continue;
            }
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// Send one request; any HTTP status is returned as a response
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<RemoteResponse, reqwest::Error> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header(AUTH_HEADER, &self.token)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::debug!("-> {}", status);
        Ok(RemoteResponse::new(status, parse_body(&text)))
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn transport(e: reqwest::Error) -> ReconcileError {
    ReconcileError::Transport(e.to_string())
}

/// How a single object of a collection is fetched
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// `GET <collection>/<id>`
    Direct,
    /// `GET <collection>` and pick the element whose `id_field` matches
    List {
        list_key: &'static str,
        id_field: &'static str,
    },
}

/// One REST collection exposed as a [`RemoteClient`]
#[derive(Clone)]
pub struct Collection {
    client: ServiceClient,
    path: Vec<String>,
    /// Key wrapping request bodies and single-object responses
    envelope: Option<&'static str>,
    lookup: Lookup,
}

impl Collection {
    pub fn new<S: AsRef<str>>(client: ServiceClient, path: &[S]) -> Self {
        Self {
            client,
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            envelope: None,
            lookup: Lookup::Direct,
        }
    }

    pub fn with_envelope(mut self, envelope: &'static str) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn url(&self) -> String {
        self.client.service_url(&self.path)
    }

    pub fn item_url(&self, id: &str) -> String {
        let mut segments = self.path.clone();
        segments.push(id.to_string());
        self.client.service_url(&segments)
    }

    fn wrap(&self, payload: &Value) -> Value {
        match self.envelope {
            Some(key) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert(key.to_string(), payload.clone());
                Value::Object(wrapped)
            }
            None => payload.clone(),
        }
    }

    fn unwrap(&self, mut response: RemoteResponse) -> RemoteResponse {
        if let Some(key) = self.envelope {
            if let Some(inner) = response.body.get_mut(key).map(Value::take) {
                response.body = inner;
            }
        }
        response
    }

    /// `GET <collection>` with query filters; the body is returned as is
    pub async fn list(&self, query: &[(&str, String)]) -> cumulus_core::Result<RemoteResponse> {
        self.client
            .send(Method::GET, &self.url(), query, None)
            .await
            .map_err(transport)
    }
}

/// Element of a list response whose `id_field` equals `id`
pub fn find_in_list(body: &Value, list_key: &str, id_field: &str, id: &str) -> Option<Value> {
    body.get(list_key)?
        .as_array()?
        .iter()
        .find(|item| item.get(id_field).and_then(Value::as_str) == Some(id))
        .cloned()
}

#[async_trait]
impl RemoteClient for Collection {
    async fn create(&self, payload: &Value) -> cumulus_core::Result<RemoteResponse> {
        let body = self.wrap(payload);
        let response = self
            .client
            .send(Method::POST, &self.url(), &[], Some(&body))
            .await
            .map_err(transport)?;
        Ok(self.unwrap(response))
    }

    async fn get(&self, id: &str) -> cumulus_core::Result<RemoteResponse> {
        match &self.lookup {
            Lookup::Direct => {
                let response = self
                    .client
                    .send(Method::GET, &self.item_url(id), &[], None)
                    .await
                    .map_err(transport)?;
                Ok(self.unwrap(response))
            }
            Lookup::List { list_key, id_field } => {
                let response = self.list(&[]).await?;
                if !response.is_success() {
                    return Ok(response);
                }
                Ok(match find_in_list(&response.body, list_key, id_field, id) {
                    Some(item) => RemoteResponse::new(response.status, item),
                    None => RemoteResponse::empty(cumulus_core::remote::STATUS_NOT_FOUND),
                })
            }
        }
    }

    async fn update(&self, id: &str, payload: &Value) -> cumulus_core::Result<RemoteResponse> {
        let body = self.wrap(payload);
        let response = self
            .client
            .send(Method::PUT, &self.item_url(id), &[], Some(&body))
            .await
            .map_err(transport)?;
        Ok(self.unwrap(response))
    }

    async fn delete(&self, id: &str) -> cumulus_core::Result<RemoteResponse> {
        self.client
            .send(Method::DELETE, &self.item_url(id), &[], None)
            .await
            .map_err(transport)
    }
}

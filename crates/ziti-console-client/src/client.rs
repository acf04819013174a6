//! reqwest implementation of [`ManagementApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use ziti_console_core::api::{ListQuery, ManagementApi, Page, WriteAck};
use ziti_console_core::config::ConsoleConfig;
use ziti_console_core::error::ApiError;

use crate::envelope;
use crate::error::{ClientError, ClientResult};

/// Header carrying the API session token.
pub const SESSION_HEADER: &str = "zt-session";

/// HTTP client for one controller's edge management API.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: Client,
    base_url: Url,
}

impl ManagementClient {
    /// Build a client from validated configuration.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if the management URL or session token
    /// is unusable, or `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ConsoleConfig) -> ClientResult<Self> {
        let mut base_url = Url::parse(&config.management_url())
            .map_err(|e| ClientError::Config(format!("Invalid management URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Management URL cannot be a base: {base_url}"
            )));
        }
        let path = base_url.path().trim_end_matches('/').to_string();
        base_url.set_path(&path);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.session_token {
            let mut value = HeaderValue::from_str(token)
                .map_err(|_| ClientError::Config("Session token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(SESSION_HEADER, value);
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http.request(method, self.url(segments))
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await?;
        Self::read(response).await
    }

    async fn read(response: Response) -> ClientResult<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("request failed");
            let (code, message, field) = envelope::error_details(&body, fallback);
            warn!(status = status.as_u16(), code = ?code, "Management API request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
                field,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// List a collection and return the raw normalized page.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport, status or envelope failures.
    #[instrument(skip(self, query), fields(limit = ?query.limit, offset = query.offset))]
    pub async fn list_page(&self, resource: &str, query: &ListQuery) -> ClientResult<Page> {
        let request = self.request(Method::GET, &[resource]).query(&query_params(query));
        let page = envelope::page(self.send(request).await?)?;
        debug!(rows = page.data.len(), total = page.total_count, "Listed");
        Ok(page)
    }

    /// List a sub-resource of one entity.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport, status or envelope failures.
    #[instrument(skip(self, query))]
    pub async fn list_related_page(
        &self,
        resource: &str,
        id: &str,
        related: &str,
        query: &ListQuery,
    ) -> ClientResult<Page> {
        let request = self
            .request(Method::GET, &[resource, id, related])
            .query(&query_params(query));
        envelope::page(self.send(request).await?)
    }

    /// Fetch one entity.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport, status or envelope failures.
    #[instrument(skip(self))]
    pub async fn get_entity(&self, resource: &str, id: &str) -> ClientResult<Value> {
        let request = self.request(Method::GET, &[resource, id]);
        envelope::entity(self.send(request).await?)
    }

    /// POST a new entity.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport, status or envelope failures.
    #[instrument(skip(self, body))]
    pub async fn create_entity(&self, resource: &str, body: &Value) -> ClientResult<WriteAck> {
        let request = self.request(Method::POST, &[resource]).json(body);
        envelope::write_ack(self.send(request).await?)
    }

    /// PATCH an existing entity.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport, status or envelope failures.
    #[instrument(skip(self, body))]
    pub async fn update_entity(
        &self,
        resource: &str,
        id: &str,
        body: &Value,
    ) -> ClientResult<WriteAck> {
        let request = self.request(Method::PATCH, &[resource, id]).json(body);
        envelope::write_ack(self.send(request).await?)
    }

    /// DELETE an entity.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport or status failures.
    #[instrument(skip(self))]
    pub async fn delete_entity(&self, resource: &str, id: &str) -> ClientResult<()> {
        let request = self.request(Method::DELETE, &[resource, id]);
        self.send(request).await?;
        Ok(())
    }

    /// POST an entity action such as `re-enroll`.
    ///
    /// # Errors
    /// Returns a `ClientError` for transport or status failures.
    #[instrument(skip(self, body))]
    pub async fn post_action(
        &self,
        resource: &str,
        id: &str,
        action: &str,
        body: &Value,
    ) -> ClientResult<()> {
        let request = self.request(Method::POST, &[resource, id, action]).json(body);
        self.send(request).await?;
        Ok(())
    }
}

/// Query parameters for a list request.
///
/// Sorting travels inside the filter expression; an unfiltered sorted query
/// uses `true` as its predicate.
#[must_use]
pub fn query_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(3);
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params.push(("offset", query.offset.to_string()));

    let predicate = query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty());
    let filter = match (&query.sort_by, predicate) {
        (Some(field), predicate) => Some(format!(
            "{} sort by {field} {}",
            predicate.unwrap_or("true"),
            query.order.as_str()
        )),
        (None, Some(predicate)) => Some(predicate.to_string()),
        (None, None) => None,
    };
    if let Some(filter) = filter {
        params.push(("filter", filter));
    }
    params
}

#[async_trait]
impl ManagementApi for ManagementClient {
    async fn list(&self, resource: &str, query: &ListQuery) -> Result<Page, ApiError> {
        Ok(self.list_page(resource, query).await?)
    }

    async fn get(&self, resource: &str, id: &str) -> Result<Value, ApiError> {
        Ok(self.get_entity(resource, id).await?)
    }

    async fn list_related(
        &self,
        resource: &str,
        id: &str,
        related: &str,
        query: &ListQuery,
    ) -> Result<Page, ApiError> {
        Ok(self.list_related_page(resource, id, related, query).await?)
    }

    async fn create(&self, resource: &str, body: &Value) -> Result<WriteAck, ApiError> {
        Ok(self.create_entity(resource, body).await?)
    }

    async fn update(&self, resource: &str, id: &str, body: &Value) -> Result<WriteAck, ApiError> {
        Ok(self.update_entity(resource, id, body).await?)
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError> {
        Ok(self.delete_entity(resource, id).await?)
    }

    async fn action(
        &self,
        resource: &str,
        id: &str,
        action: &str,
        body: &Value,
    ) -> Result<(), ApiError> {
        Ok(self.post_action(resource, id, action, body).await?)
    }
}

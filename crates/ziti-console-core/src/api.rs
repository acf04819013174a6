//! The seam between the console core and the edge management REST API.
//!
//! Implementations normalize the controller's `{ data, meta }` envelopes
//! before anything reaches the core, so the core never inspects raw response
//! shapes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ConsoleError, ConsoleResult};

/// Sort direction for list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Keyword used by the controller's filter language.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Paging, filter and sort parameters of a list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Page size; `None` lets the controller pick its default.
    pub limit: Option<u32>,
    /// Zero-based row offset.
    pub offset: u32,
    /// Filter predicate in the controller's filter language.
    pub filter: Option<String>,
    /// Field to sort by.
    pub sort_by: Option<String>,
    /// Sort direction.
    pub order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            filter: None,
            sort_by: Some("name".into()),
            order: SortOrder::Asc,
        }
    }
}

impl ListQuery {
    /// Query with a page size.
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Builder: set the filter predicate.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Builder: set the 1-based page number for the current limit.
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        let limit = self.limit.unwrap_or(0);
        self.offset = page.saturating_sub(1).saturating_mul(limit);
        self
    }

    /// Builder: drop sorting (catalog endpoints return plain strings).
    #[must_use]
    pub fn unsorted(mut self) -> Self {
        self.sort_by = None;
        self
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Items on this page.
    pub data: Vec<Value>,
    /// `meta.pagination.totalCount`, or 0 when the controller omitted it.
    pub total_count: u64,
}

impl Page {
    /// Deserialize every item on the page.
    ///
    /// # Errors
    /// Returns `ConsoleError::Json` if any item does not match `T`.
    pub fn items<T: DeserializeOwned>(&self) -> ConsoleResult<Vec<T>> {
        self.data
            .iter()
            .cloned()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(ConsoleError::from)
    }
}

/// Normalized acknowledgement of a create or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteAck {
    /// Id of the written entity, if the controller returned one.
    pub id: Option<String>,
    /// Entity body, if the controller returned more than an id.
    pub data: Option<Value>,
}

/// Edge management API operations used by the console core.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// List a collection (`edge-routers`, `edge-router-role-attributes`, ...).
    async fn list(&self, resource: &str, query: &ListQuery) -> Result<Page, ApiError>;

    /// Fetch one entity by id.
    async fn get(&self, resource: &str, id: &str) -> Result<Value, ApiError>;

    /// List a sub-resource, e.g. `services/{id}/terminators`.
    async fn list_related(
        &self,
        resource: &str,
        id: &str,
        related: &str,
        query: &ListQuery,
    ) -> Result<Page, ApiError>;

    /// Create an entity (POST).
    async fn create(&self, resource: &str, body: &Value) -> Result<WriteAck, ApiError>;

    /// Update an entity (PATCH).
    async fn update(&self, resource: &str, id: &str, body: &Value) -> Result<WriteAck, ApiError>;

    /// Delete an entity.
    async fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError>;

    /// Invoke an entity action (POST `{resource}/{id}/{action}`), e.g.
    /// `edge-routers/{id}/re-enroll`.
    async fn action(
        &self,
        resource: &str,
        id: &str,
        action: &str,
        body: &Value,
    ) -> Result<(), ApiError>;
}

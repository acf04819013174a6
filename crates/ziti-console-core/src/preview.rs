//! Read-only previews of the entities a form's selections currently match.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::DEFAULT_PREVIEW_LIMIT;
use crate::api::{ListQuery, ManagementApi, Page};
use crate::error::ConsoleResult;
use crate::models::{EntityRef, RoleCategory, Semantic, Service};
use crate::named::NamedAttributeMap;
use crate::roles::RoleSelection;

/// Name of the synthetic row appended when a preview is truncated.
pub const MORE_RESULTS: &str = "show more results...";

/// One row of a preview list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    /// Entity id; `None` on the synthetic row.
    pub id: Option<String>,
    /// Display text.
    pub name: String,
    /// Console route for the entity, or for the full list on the synthetic row.
    pub href: String,
    /// Whether this is the synthetic "show more results..." row.
    pub more: bool,
}

/// Percent-encode one query or path value.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl PreviewItem {
    fn entity(id: &str, name: impl Into<String>, route: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.into(),
            href: format!("/{route}/{}", encode_component(id)),
            more: false,
        }
    }

    fn more_results(href: String) -> Self {
        Self {
            id: None,
            name: MORE_RESULTS.to_string(),
            href,
            more: true,
        }
    }
}

/// Value of a list-page search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Free-text value.
    Text(String),
    /// Encoded attribute list.
    Attributes(Vec<String>),
}

/// Filter a list page should reapply when the user follows "show more results...".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Column the filter applies to.
    pub column_id: String,
    /// Filter value.
    pub value: FilterValue,
    /// Chip label.
    pub label: String,
    /// Filter display name.
    pub filter_name: String,
    /// Filter widget kind (`ATTRIBUTE`, `TEXTINPUT`).
    #[serde(rename = "type")]
    pub filter_type: String,
    /// Comparison verb for text filters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
}

/// A preview list plus the controller's total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// Rows, including the synthetic row when truncated.
    pub items: Vec<PreviewItem>,
    /// Total matches reported by the controller.
    pub total: u64,
    /// Filter to hand off to the full list page, when truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<SearchFilter>,
}

impl Preview {
    /// Real entity rows, without the synthetic row.
    pub fn entities(&self) -> impl Iterator<Item = &PreviewItem> {
        self.items.iter().filter(|item| !item.more)
    }

    /// Whether the synthetic row was appended.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.items.iter().any(|item| item.more)
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn quoted_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let items: Vec<String> = values.into_iter().map(quote).collect();
    format!("[{}]", items.join(","))
}

/// Build the filter predicate matching a selection.
///
/// Role attributes combine according to `semantic`; pinned ids are OR-ed in.
/// Returns `None` when there is nothing to match.
#[must_use]
pub fn attribute_predicate(
    role_attributes: &BTreeSet<String>,
    named_ids: &[String],
    semantic: Semantic,
) -> Option<String> {
    let attributes = if role_attributes.is_empty() {
        None
    } else {
        Some(match semantic {
            Semantic::AnyOf => format!(
                "anyOf(roleAttributes) in {}",
                quoted_list(role_attributes.iter().map(String::as_str))
            ),
            Semantic::AllOf => role_attributes
                .iter()
                .map(|attr| format!("roleAttributes contains {}", quote(attr)))
                .collect::<Vec<_>>()
                .join(" and "),
        })
    };
    let ids = if named_ids.is_empty() {
        None
    } else {
        Some(format!(
            "id in {}",
            quoted_list(named_ids.iter().map(String::as_str))
        ))
    };

    match (attributes, ids) {
        (Some(attributes), Some(ids)) => Some(format!("({attributes}) or {ids}")),
        (Some(predicate), None) | (None, Some(predicate)) => Some(predicate),
        (None, None) => None,
    }
}

#[derive(Debug, Deserialize)]
struct TerminatorRow {
    id: String,
    #[serde(default)]
    binding: String,
    #[serde(default)]
    address: String,
}

/// Queries the entities matching role selections and a service's sub-resources.
pub struct AssociatedEntityFetcher {
    api: Arc<dyn ManagementApi>,
    limit: u32,
}

impl std::fmt::Debug for AssociatedEntityFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociatedEntityFetcher")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl AssociatedEntityFetcher {
    /// Create a fetcher with the default preview limit.
    #[must_use]
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            api,
            limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    /// Builder: rows shown before the list is truncated.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Rows shown before the list is truncated.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    fn is_over_limit(&self, page: &Page) -> bool {
        page.total_count > u64::from(self.limit)
    }

    /// Entities of `category` matching a selection.
    ///
    /// Named refs that no longer resolve in `map` are left out of the
    /// predicate. An empty selection returns an empty preview without a request.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    #[instrument(skip(self, selection, map), fields(resource = category.entity_resource()))]
    pub async fn fetch_associated(
        &self,
        category: RoleCategory,
        selection: &RoleSelection,
        map: &NamedAttributeMap,
        semantic: Semantic,
    ) -> ConsoleResult<Preview> {
        let named_ids: Vec<String> = selection
            .named_refs
            .iter()
            .filter_map(|name| map.id_of(name).map(str::to_string))
            .collect();
        let Some(predicate) =
            attribute_predicate(&selection.role_attributes, &named_ids, semantic)
        else {
            debug!("empty selection, skipping preview request");
            return Ok(Preview::default());
        };

        let resource = category.entity_resource();
        let query = ListQuery::with_limit(self.limit).filter(predicate);
        let page = self.api.list(resource, &query).await?;
        let entities: Vec<EntityRef> = page.items()?;

        let mut preview = Preview {
            items: entities
                .iter()
                .map(|entity| PreviewItem::entity(&entity.id, entity.name.as_str(), resource))
                .collect(),
            total: page.total_count,
            handoff: None,
        };

        if self.is_over_limit(&page) {
            let mut encoded: Vec<String> = selection
                .role_attributes
                .iter()
                .map(|attr| format!("%23{}", encode_component(attr)))
                .collect();
            encoded.extend(
                named_ids
                    .iter()
                    .map(|id| format!("%40{}", encode_component(id))),
            );
            preview.items.push(PreviewItem::more_results(format!(
                "/{resource}?roleAttributes={}",
                encoded.join(",")
            )));
            let label: Vec<String> = selection
                .role_attributes
                .iter()
                .map(|attr| format!("#{attr}"))
                .chain(selection.named_refs.iter().map(|name| format!("@{name}")))
                .collect();
            preview.handoff = Some(SearchFilter {
                column_id: "roleAttributes".into(),
                value: FilterValue::Attributes(encoded),
                label: label.join(", "),
                filter_name: format!("{} Attributes", category.label()),
                filter_type: "ATTRIBUTE".into(),
                verb: None,
            });
        }
        debug!(rows = preview.items.len(), total = preview.total, "preview fetched");
        Ok(preview)
    }

    /// Service policies that reference a service.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    #[instrument(skip(self, service), fields(service = %service.name))]
    pub async fn service_policies(&self, service: &Service) -> ConsoleResult<Preview> {
        let Some(id) = service.id.as_deref() else {
            return Ok(Preview::default());
        };
        let query = ListQuery::with_limit(self.limit);
        let page = self
            .api
            .list_related("services", id, "service-policies", &query)
            .await?;
        let policies: Vec<EntityRef> = page.items()?;

        let mut preview = Preview {
            items: policies
                .iter()
                .map(|policy| PreviewItem::entity(&policy.id, policy.name.as_str(), "service-policies"))
                .collect(),
            total: page.total_count,
            handoff: None,
        };

        if self.is_over_limit(&page) {
            let mut encoded: Vec<String> = service
                .role_attributes
                .iter()
                .map(|attr| format!("%23{}", encode_component(attr)))
                .collect();
            encoded.push(format!("%40{}", encode_component(id)));
            preview.items.push(PreviewItem::more_results(format!(
                "/service-policies?serviceRoles={}",
                encoded.join(",")
            )));
            preview.handoff = Some(SearchFilter {
                column_id: "serviceRoles".into(),
                value: FilterValue::Attributes(encoded),
                label: format!("@{}", service.name),
                filter_name: "Service Attributes".into(),
                filter_type: "ATTRIBUTE".into(),
                verb: None,
            });
        }
        Ok(preview)
    }

    /// Terminators hosting a service, shown as `binding:address`.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    #[instrument(skip(self, service), fields(service = %service.name))]
    pub async fn terminators(&self, service: &Service) -> ConsoleResult<Preview> {
        let Some(id) = service.id.as_deref() else {
            return Ok(Preview::default());
        };
        let query = ListQuery::with_limit(self.limit).unsorted();
        let page = self
            .api
            .list_related("services", id, "terminators", &query)
            .await?;
        let rows: Vec<TerminatorRow> = page.items()?;

        let mut preview = Preview {
            items: rows
                .iter()
                .map(|row| {
                    PreviewItem::entity(
                        &row.id,
                        format!("{}:{}", row.binding, row.address),
                        "terminators",
                    )
                })
                .collect(),
            total: page.total_count,
            handoff: None,
        };

        if self.is_over_limit(&page) {
            preview
                .items
                .push(PreviewItem::more_results(format!(
                    "/terminators?service={}",
                    encode_component(id)
                )));
            preview.handoff = Some(SearchFilter {
                column_id: "service".into(),
                value: FilterValue::Text(id.to_string()),
                label: service.name.clone(),
                filter_name: "Service".into(),
                filter_type: "TEXTINPUT".into(),
                verb: Some("=".into()),
            });
        }
        Ok(preview)
    }

    /// Configs attached to a service. Never truncated.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    #[instrument(skip(self, service), fields(service = %service.name))]
    pub async fn configs(&self, service: &Service) -> ConsoleResult<Preview> {
        let Some(id) = service.id.as_deref() else {
            return Ok(Preview::default());
        };
        let page = self
            .api
            .list_related("services", id, "configs", &ListQuery::default())
            .await?;
        let configs: Vec<EntityRef> = page.items()?;
        Ok(Preview {
            items: configs
                .iter()
                .map(|config| PreviewItem::entity(&config.id, config.name.as_str(), "configs"))
                .collect(),
            total: page.total_count,
            handoff: None,
        })
    }
}

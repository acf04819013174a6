//! Named-attribute resolution against the management API.
//!
//! Each category keeps its own map. Refreshes of different categories run
//! independently; overlapping refreshes of the same category are ordered by
//! the ticket taken when the request was issued, and a response older than
//! the map already applied is discarded.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::DEFAULT_PAGE_SIZE;
use crate::api::{ListQuery, ManagementApi};
use crate::error::ConsoleResult;
use crate::models::{EntityRef, RoleCategory};
use crate::named::NamedAttributeMap;

#[derive(Debug, Default)]
struct CategoryState {
    issued: u64,
    applied: u64,
    map: NamedAttributeMap,
}

/// Resolves display names and ids for referenceable entities.
pub struct NamedAttributeResolver {
    api: Arc<dyn ManagementApi>,
    page_size: u32,
    categories: Mutex<HashMap<RoleCategory, CategoryState>>,
}

impl std::fmt::Debug for NamedAttributeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedAttributeResolver")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl NamedAttributeResolver {
    /// Create a resolver with the default listing page size.
    #[must_use]
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            api,
            page_size: DEFAULT_PAGE_SIZE,
            categories: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: set the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Re-list a category and rebuild its map from scratch.
    ///
    /// Pages through the whole collection before applying. Returns the map
    /// now in effect, which is an earlier map if a newer refresh already
    /// landed.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails, or
    /// `ConsoleError::Json` if an entry lacks `id` or `name`.
    #[instrument(skip(self), fields(resource = category.entity_resource()))]
    pub async fn refresh(&self, category: RoleCategory) -> ConsoleResult<NamedAttributeMap> {
        let ticket = {
            let mut categories = self.categories.lock();
            let state = categories.entry(category).or_default();
            state.issued += 1;
            state.issued
        };

        let mut entities: Vec<EntityRef> = Vec::new();
        let mut page_number = 1;
        loop {
            let query = ListQuery::with_limit(self.page_size).page(page_number);
            let page = self.api.list(category.entity_resource(), &query).await?;
            let total = page.total_count;
            let rows: Vec<EntityRef> = page.items()?;
            if rows.is_empty() {
                break;
            }
            entities.extend(rows);
            if entities.len() as u64 >= total {
                break;
            }
            page_number += 1;
        }
        let map = NamedAttributeMap::from_entities(&entities);

        let mut categories = self.categories.lock();
        let state = categories.entry(category).or_default();
        if ticket > state.applied {
            debug!(ticket, names = map.len(), "named attribute map updated");
            state.applied = ticket;
            state.map = map;
        } else {
            debug!(
                ticket,
                applied = state.applied,
                "discarding stale named attribute response"
            );
        }
        Ok(state.map.clone())
    }

    /// Refresh several categories concurrently.
    ///
    /// # Errors
    /// Returns the first failure; the other categories still apply their
    /// responses.
    pub async fn refresh_all(&self, categories: &[RoleCategory]) -> ConsoleResult<()> {
        let results = join_all(categories.iter().map(|category| self.refresh(*category))).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Current map for a category (empty before the first refresh).
    #[must_use]
    pub fn map(&self, category: RoleCategory) -> NamedAttributeMap {
        self.categories
            .lock()
            .get(&category)
            .map(|state| state.map.clone())
            .unwrap_or_default()
    }

    /// Ticket of the response currently applied for a category.
    #[must_use]
    pub fn generation(&self, category: RoleCategory) -> u64 {
        self.categories
            .lock()
            .get(&category)
            .map_or(0, |state| state.applied)
    }

    /// Role attributes currently in use for a category.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    #[instrument(skip(self), fields(resource = category.role_attribute_resource()))]
    pub async fn role_attributes(&self, category: RoleCategory) -> ConsoleResult<Vec<String>> {
        let query = ListQuery::with_limit(self.page_size).unsorted();
        let page = self
            .api
            .list(category.role_attribute_resource(), &query)
            .await?;
        page.items()
    }
}

//! Form controller: load, edit and save one entity.
//!
//! ```text
//! Loading ──▶ Ready ──save──▶ Saving ──▶ Ready
//!                                  └───▶ Closed   (extension asked to close)
//! ```
//!
//! A failed validation or a rejected save returns to `Ready` with the entity
//! as it was before the attempt. Previews never gate `Ready`: `load` and
//! `save` mark them requested and `refresh_previews` fetches them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{join_all, join3};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api::{ManagementApi, WriteAck};
use crate::error::{ConsoleError, ConsoleResult, FieldErrors};
use crate::models::{FormEntity, RoleCategory, Service};
use crate::notify::{Notification, Notifier};
use crate::preview::{AssociatedEntityFetcher, Preview, SearchFilter};
use crate::resolver::NamedAttributeResolver;
use crate::roles::{self, RoleSelection};

/// Lifecycle state of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    /// Entity and named-attribute maps are being fetched.
    Loading,
    /// Editable.
    Ready,
    /// A create or update is in flight.
    Saving,
    /// Saved and dismissed.
    Closed,
}

impl FormState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Saving => "saving",
            Self::Closed => "closed",
        }
    }
}

/// What the form does after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveDirective {
    /// Keep editing.
    #[default]
    Stay,
    /// Close the form and return to the list page.
    Close,
}

/// The record a save produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SavedRecord<E> {
    /// The controller returned an id; this is the entity as saved.
    Entity(E),
    /// The controller acknowledged without an id; the submitted data stands.
    Acknowledged,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome<E> {
    /// What the controller returned.
    pub record: SavedRecord<E>,
    /// Directive from the form extension.
    pub directive: SaveDirective,
}

/// Hooks contributed by console extensions.
#[async_trait]
pub trait FormExtension<E: FormEntity>: Send + Sync {
    /// Extra validation run after the built-in field checks.
    async fn validate(&self, _entity: &E) -> bool {
        true
    }

    /// Called after a successful save with the new baseline.
    async fn form_data_saved(&self, _entity: &E) -> SaveDirective {
        SaveDirective::Stay
    }
}

/// Extension that accepts everything and never closes the form.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtension;

#[async_trait]
impl<E: FormEntity> FormExtension<E> for NoopExtension {}

/// Limits applied by a form controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormOptions {
    /// Page size for named-attribute listings.
    pub page_size: u32,
    /// Rows shown in a preview before it is truncated.
    pub preview_limit: u32,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            page_size: crate::DEFAULT_PAGE_SIZE,
            preview_limit: crate::DEFAULT_PREVIEW_LIMIT,
        }
    }
}

/// Preview region of one role field or sub-resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSlot {
    /// Request in flight or requested.
    pub loading: bool,
    /// Last fetched preview.
    pub preview: Preview,
    /// Last fetch failure.
    pub error: Option<String>,
}

/// Preview key for service policies of a service form.
pub const SERVICE_POLICIES: &str = "servicePolicies";
/// Preview key for terminators of a service form.
pub const TERMINATORS: &str = "terminators";
/// Preview key for configs of a service form.
pub const CONFIGS: &str = "configs";

/// Owns the state of one entity form.
pub struct FormController<E: FormEntity> {
    api: Arc<dyn ManagementApi>,
    resolver: NamedAttributeResolver,
    fetcher: AssociatedEntityFetcher,
    notifier: Arc<dyn Notifier>,
    extension: Arc<dyn FormExtension<E>>,
    state: FormState,
    entity: E,
    baseline: E,
    selections: BTreeMap<&'static str, RoleSelection>,
    errors: FieldErrors,
    previews: BTreeMap<&'static str, PreviewSlot>,
    handoff: Option<SearchFilter>,
}

impl<E: FormEntity> std::fmt::Debug for FormController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormController")
            .field("resource", &E::RESOURCE)
            .field("state", &self.state)
            .field("entity", &self.entity)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<E: FormEntity> FormController<E> {
    /// Create a controller with default limits.
    #[must_use]
    pub fn new(api: Arc<dyn ManagementApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_options(api, notifier, FormOptions::default())
    }

    /// Create a controller with explicit limits.
    #[must_use]
    pub fn with_options(
        api: Arc<dyn ManagementApi>,
        notifier: Arc<dyn Notifier>,
        options: FormOptions,
    ) -> Self {
        let resolver = NamedAttributeResolver::new(Arc::clone(&api)).with_page_size(options.page_size);
        let fetcher = AssociatedEntityFetcher::new(Arc::clone(&api)).with_limit(options.preview_limit);
        let selections = E::role_fields()
            .iter()
            .map(|field| (field.key, RoleSelection::default()))
            .collect();
        Self {
            api,
            resolver,
            fetcher,
            notifier,
            extension: Arc::new(NoopExtension),
            state: FormState::Loading,
            entity: E::default(),
            baseline: E::default(),
            selections,
            errors: FieldErrors::new(),
            previews: BTreeMap::new(),
            handoff: None,
        }
    }

    /// Builder: install extension hooks.
    #[must_use]
    pub fn with_extension(mut self, extension: Arc<dyn FormExtension<E>>) -> Self {
        self.extension = extension;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> FormState {
        self.state
    }

    /// Entity being edited.
    #[must_use]
    pub const fn entity(&self) -> &E {
        &self.entity
    }

    /// Mutable access to the entity being edited.
    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    /// Entity as last loaded or saved.
    #[must_use]
    pub const fn baseline(&self) -> &E {
        &self.baseline
    }

    /// Whether the form edits an existing entity.
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.baseline.id().is_some()
    }

    /// Whether the entity differs from the baseline.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.entity != self.baseline
    }

    /// Field errors from the last validation.
    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Selection for a role field.
    #[must_use]
    pub fn selection(&self, key: &str) -> Option<&RoleSelection> {
        self.selections.get(key)
    }

    /// Mutable selection for a role field.
    pub fn selection_mut(&mut self, key: &str) -> Option<&mut RoleSelection> {
        self.selections.get_mut(key)
    }

    /// Replace the selection of a role field. Returns `false` for unknown keys.
    pub fn set_selection(&mut self, key: &str, selection: RoleSelection) -> bool {
        match self.selections.get_mut(key) {
            Some(slot) => {
                *slot = selection;
                true
            }
            None => false,
        }
    }

    /// Preview region for a key.
    #[must_use]
    pub fn preview(&self, key: &str) -> Option<&PreviewSlot> {
        self.previews.get(key)
    }

    /// Filter handed off by the last truncated preview.
    #[must_use]
    pub const fn handoff(&self) -> Option<&SearchFilter> {
        self.handoff.as_ref()
    }

    /// Named-attribute resolver used by this form.
    #[must_use]
    pub const fn resolver(&self) -> &NamedAttributeResolver {
        &self.resolver
    }

    /// Role attributes available for a category.
    ///
    /// # Errors
    /// Returns `ConsoleError::Api` if the listing fails.
    pub async fn role_attributes(&self, category: RoleCategory) -> ConsoleResult<Vec<String>> {
        self.resolver.role_attributes(category).await
    }

    /// Load an entity for editing, or start a new one when `id` is `None`.
    ///
    /// # Errors
    /// Returns `ConsoleError::NotFound` if the entity does not exist, or
    /// `ConsoleError::Api` if fetching it or any named attribute map fails.
    /// The form stays `Loading`, so a save cannot drop named roles that
    /// were never resolved.
    #[instrument(skip(self), fields(resource = E::RESOURCE))]
    pub async fn load(&mut self, id: Option<&str>) -> ConsoleResult<()> {
        self.state = FormState::Loading;
        self.errors = FieldErrors::new();

        let categories: Vec<RoleCategory> =
            E::role_fields().iter().map(|field| field.category).collect();
        let entity_fut = async {
            match id {
                Some(id) => self.fetch(id).await,
                None => Ok(E::default()),
            }
        };
        let (entity, refreshed) = futures_util::join!(entity_fut, self.resolver.refresh_all(&categories));
        let entity = entity?;
        if let Err(err) = refreshed {
            warn!(error = %err, "named attribute refresh failed, form not editable");
            return Err(err);
        }

        self.entity = entity.clone();
        self.baseline = entity;
        self.derive_selections();
        self.request_previews();
        self.state = FormState::Ready;
        info!(id = ?self.entity.id(), "form ready");
        Ok(())
    }

    async fn fetch(&self, id: &str) -> ConsoleResult<E> {
        let value = self.api.get(E::RESOURCE, id).await.map_err(|err| {
            if err.is_not_found() {
                ConsoleError::NotFound {
                    resource: E::RESOURCE.to_string(),
                    id: id.to_string(),
                }
            } else {
                ConsoleError::Api(err)
            }
        })?;
        Ok(serde_json::from_value(value)?)
    }

    fn derive_selections(&mut self) {
        for field in E::role_fields() {
            let map = self.resolver.map(field.category);
            let selection = roles::decode(self.entity.roles(field.key), &map);
            self.selections.insert(field.key, selection);
        }
    }

    fn request_previews(&mut self) {
        for field in E::role_fields() {
            self.previews.entry(field.key).or_default().loading = true;
        }
    }

    /// Clear field errors and run the built-in field checks.
    pub fn validate(&mut self) -> bool {
        self.errors = FieldErrors::new();
        if self.entity.name().trim().is_empty() {
            self.errors.insert("name", "required");
        }
        self.errors.is_empty()
    }

    /// The entity with current selections encoded into its role fields.
    #[must_use]
    pub fn encoded_entity(&self) -> E {
        let mut entity = self.entity.clone();
        for field in E::role_fields() {
            let selection = self.selections.get(field.key).cloned().unwrap_or_default();
            let map = self.resolver.map(field.category);
            entity.set_roles(field.key, roles::encode(&selection, &map));
        }
        entity
    }

    /// Validate, encode and submit the entity.
    ///
    /// # Errors
    /// - `ConsoleError::InvalidState` unless the form is `Ready`.
    /// - `ConsoleError::Validation` if a check fails; no request is made.
    /// - `ConsoleError::Save` if the controller rejects the write.
    #[instrument(skip(self), fields(resource = E::RESOURCE, id = ?self.entity.id()))]
    pub async fn save(&mut self) -> ConsoleResult<SaveOutcome<E>> {
        if self.state != FormState::Ready {
            return Err(ConsoleError::InvalidState {
                expected: FormState::Ready.as_str(),
                actual: self.state.as_str(),
            });
        }
        self.state = FormState::Saving;

        let trimmed = self.entity.name().trim().to_string();
        self.entity.set_name(trimmed);
        let valid = self.validate();
        let extension_valid = self.extension.validate(&self.entity).await;
        if !extension_valid {
            self.errors.insert("extension", "invalid");
        }
        if !valid || !extension_valid {
            self.notifier.notify(Notification::error(
                "Error",
                "Data Invalid",
                format!(
                    "{} data is invalid. Please update the highlighted fields and try again.",
                    E::LABEL
                ),
            ));
            self.state = FormState::Ready;
            return Err(ConsoleError::Validation(self.errors.clone()));
        }

        match self.submit().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.state = FormState::Ready;
                Err(err)
            }
        }
    }

    async fn submit(&mut self) -> ConsoleResult<SaveOutcome<E>> {
        let submitted = self.encoded_entity();
        let payload = submitted.payload()?;
        let existing_id = submitted.id().map(str::to_string);
        let (verb, past) = if existing_id.is_some() {
            ("Updating", "Updated")
        } else {
            ("Creating", "Created")
        };

        let result = match existing_id.as_deref() {
            Some(id) => self.api.update(E::RESOURCE, id, &payload).await,
            None => self.api.create(E::RESOURCE, &payload).await,
        };
        let ack = match result {
            Ok(ack) => ack,
            Err(err) => {
                warn!(error = %err, "save rejected");
                let action = format!("{verb} {}", E::LABEL);
                self.notifier.notify(Notification::error(
                    "Error",
                    format!("Error {action}"),
                    err.message.clone(),
                ));
                return Err(ConsoleError::Save {
                    action,
                    message: err.message,
                });
            }
        };

        let mut record = saved_record(ack, &submitted)?;
        if E::refetch_after_save() {
            if let SavedRecord::Entity(saved) = &record {
                if let Some(id) = saved.id() {
                    match self.fetch(id).await {
                        Ok(fresh) => record = SavedRecord::Entity(fresh),
                        Err(err) => warn!(error = %err, "re-read after save failed"),
                    }
                }
            }
        }

        let baseline = match &record {
            SavedRecord::Entity(saved) => saved.clone(),
            SavedRecord::Acknowledged => {
                debug!("save acknowledged without id, keeping submitted data");
                submitted
            }
        };
        self.entity = baseline.clone();
        self.baseline = baseline;
        self.derive_selections();

        self.notifier.notify(Notification::success(
            "Success",
            format!("{} {past}", E::LABEL),
            format!("Successfully {} {}", past.to_lowercase(), E::LABEL),
        ));

        let directive = self.extension.form_data_saved(&self.entity).await;
        self.state = match directive {
            SaveDirective::Close => FormState::Closed,
            SaveDirective::Stay => {
                self.request_previews();
                FormState::Ready
            }
        };
        info!(id = ?self.entity.id(), state = self.state.as_str(), "form saved");
        Ok(SaveOutcome { record, directive })
    }

    /// Fetch previews for every role field concurrently.
    ///
    /// Failures are recorded on the slot and logged; they never change the
    /// form state.
    pub async fn refresh_previews(&mut self) {
        let semantic = self.entity.semantic();
        for field in E::role_fields() {
            self.previews.entry(field.key).or_default().loading = true;
        }

        let jobs = E::role_fields().iter().map(|field| {
            let selection = self.selections.get(field.key).cloned().unwrap_or_default();
            let map = self.resolver.map(field.category);
            let fetcher = &self.fetcher;
            async move {
                let result = fetcher
                    .fetch_associated(field.category, &selection, &map, semantic)
                    .await;
                (field.key, result)
            }
        });
        let results = join_all(jobs).await;

        for (key, result) in results {
            self.store_preview(key, result);
        }
    }

    fn store_preview(&mut self, key: &'static str, result: ConsoleResult<Preview>) {
        let slot = self.previews.entry(key).or_default();
        slot.loading = false;
        match result {
            Ok(preview) => {
                if let Some(handoff) = &preview.handoff {
                    self.handoff = Some(handoff.clone());
                }
                slot.error = None;
                slot.preview = preview;
            }
            Err(err) => {
                warn!(key, error = %err, "preview fetch failed");
                slot.error = Some(err.to_string());
            }
        }
    }
}

impl FormController<Service> {
    /// Fetch the service-policy, terminator and config previews of the service.
    pub async fn refresh_service_previews(&mut self) {
        for key in [SERVICE_POLICIES, TERMINATORS, CONFIGS] {
            self.previews.entry(key).or_default().loading = true;
        }
        let service = self.baseline.clone();
        let (policies, terminators, configs) = join3(
            self.fetcher.service_policies(&service),
            self.fetcher.terminators(&service),
            self.fetcher.configs(&service),
        )
        .await;
        self.store_preview(SERVICE_POLICIES, policies);
        self.store_preview(TERMINATORS, terminators);
        self.store_preview(CONFIGS, configs);
    }
}

/// Turn a write acknowledgement into the saved record.
///
/// Fields the controller returned override the submitted ones.
fn saved_record<E: FormEntity>(ack: WriteAck, submitted: &E) -> ConsoleResult<SavedRecord<E>> {
    let Some(id) = ack.id else {
        return Ok(SavedRecord::Acknowledged);
    };
    let mut merged = serde_json::to_value(submitted)?;
    if let (Value::Object(target), Some(Value::Object(returned))) = (&mut merged, ack.data) {
        for (key, value) in returned {
            target.insert(key, value);
        }
    }
    let mut entity: E = serde_json::from_value(merged)?;
    entity.set_id(id);
    Ok(SavedRecord::Entity(entity))
}

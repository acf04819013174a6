//! Ziti admin console core.
//!
//! Policy forms select the entities they apply to with role strings: `#attr`
//! for a role attribute, `@id` for one pinned entity. This crate converts
//! between those strings and what an operator edits, resolves entity names,
//! previews what a selection matches, and drives a form from load to save.
//!
//! HTTP lives behind the [`ManagementApi`] trait; `ziti-console-client`
//! implements it with `reqwest` and `ziti-console-testkit` provides an
//! in-memory fake.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod named;
pub mod notify;
pub mod pages;
pub mod preview;
pub mod resolver;
pub mod roles;

pub use api::{ListQuery, ManagementApi, Page, SortOrder, WriteAck};
pub use config::ConsoleConfig;
pub use error::{ApiError, ConsoleError, ConsoleResult, FieldErrors};
pub use form::{
    FormController, FormExtension, FormOptions, FormState, NoopExtension, SaveDirective,
    SaveOutcome, SavedRecord,
};
pub use models::{
    EdgeRouterPolicy, EntityRef, FormEntity, RoleCategory, RoleField, Semantic, Service,
    ServiceEdgeRouterPolicy,
};
pub use named::{InverseMap, NamedAttributeMap, invert};
pub use notify::{Level, Notification, Notifier, TracingNotifier};
pub use preview::{AssociatedEntityFetcher, Preview, PreviewItem, SearchFilter};
pub use resolver::NamedAttributeResolver;
pub use roles::{EncodedRole, RoleSelection, decode, encode};

/// Page size for named-attribute listings.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Rows shown in a preview before "show more results..." is appended.
pub const DEFAULT_PREVIEW_LIMIT: u32 = 5;

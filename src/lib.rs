//! Client core of the multi-tenant business admin console: a typed REST
//! collection client and the list view-model every screen is built on.
//!
//! - `api`: the collection contract (`CollectionService`) and its reqwest implementation.
//! - `viewmodel`: paginated/filtered/searchable list state with optimistic mutations.
//! - `reconcile`: pure list and counter reconciliation after a mutation.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod table;
pub mod viewmodel;

pub use api::{ApiClient, CollectionService, RestCollection};
pub use error::{CollectionError, CollectionResult, FetchError, ValidationError};
pub use model::{Entity, EntityId};
pub use viewmodel::{CollectionViewModel, LoadOutcome, Phase, RemoveOutcome, ViewOptions};

//! `explorium-client`: blocking HTTP side of the pipeline.
//!
//! Implements the engine's `Matcher` and `Enricher` seams and the paged
//! search fetch against the Explorium REST API, plus webhook CRUD.

pub mod businesses;
pub mod client;
pub mod entity;
pub mod prospects;
pub mod types;
pub mod webhooks;
mod wire;

pub use businesses::BusinessFilters;
pub use client::{ApiClient, ClientError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use entity::{EntityApi, MATCH_BATCH_SIZE};
pub use prospects::{MonthRange, ProspectFilters};
pub use types::{parse_types, EnrichType, BUSINESS_TYPES, PROSPECT_TYPES};
pub use webhooks::WebhookApi;

//! Match, bulk-enrich and search endpoints for one entity kind.
//!
//! [`EntityApi`] is the HTTP side of the engine's [`Matcher`] and
//! [`Enricher`] seams. Each call is a single attempt; the engine wraps it
//! in the retry controller.

use explorium_engine::batch::merge_payload;
use explorium_engine::{
    EntityKind, Enricher, IdResult, MatchCandidate, MatchDescriptor, Matcher, Payload, RemoteError,
    SearchPage,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::client::ApiClient;
use crate::types::{lookup, EnrichType, BUSINESS_TYPES, PROSPECT_TYPES};
use crate::wire::{parse_bulk, parse_match_rows, parse_search_page};
use crate::{businesses, prospects};

/// Largest `*_to_match` list the service accepts.
pub const MATCH_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct EntityApi {
    client: ApiClient,
    kind: EntityKind,
    match_batch_size: usize,
}

impl EntityApi {
    pub fn new(client: ApiClient, kind: EntityKind) -> Self {
        Self { client, kind, match_batch_size: MATCH_BATCH_SIZE }
    }

    pub fn businesses(client: ApiClient) -> Self {
        Self::new(client, EntityKind::Business)
    }

    pub fn prospects(client: ApiClient) -> Self {
        Self::new(client, EntityKind::Prospect)
    }

    pub fn with_match_batch_size(mut self, size: usize) -> Self {
        self.match_batch_size = size.max(1);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn types(&self) -> &'static [EnrichType] {
        match self.kind {
            EntityKind::Business => BUSINESS_TYPES,
            EntityKind::Prospect => PROSPECT_TYPES,
        }
    }

    fn root(&self) -> String {
        format!("/{}", self.kind.plural())
    }

    fn endpoint(&self, type_name: &str) -> Result<&'static str, RemoteError> {
        lookup(self.types(), type_name)
            .map(|t| t.endpoint)
            .ok_or_else(|| RemoteError::Protocol(format!("unknown enrichment type '{type_name}'")))
    }

    pub fn match_params(&self, d: &MatchDescriptor) -> Value {
        match self.kind {
            EntityKind::Business => businesses::match_params(d),
            EntityKind::Prospect => prospects::match_params(d),
        }
    }

    /// One search page. `size` is the total the caller intends to collect.
    pub fn search_page(
        &self,
        filters: &Value,
        size: usize,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, RemoteError> {
        let body = json!({
            "mode": "full",
            "size": size,
            "page_size": page_size,
            "page": page,
            "filters": filters,
        });
        let resp = self.client.post(&self.root(), &body)?;
        parse_search_page(&resp, page)
    }

    /// Single-entity enrichment, one `/enrich` call per type, merged.
    pub fn enrich(&self, id: &str, types: &[String]) -> Result<Payload, RemoteError> {
        let mut payload = Payload::new();
        for type_name in types {
            let path = format!("{}/{}/enrich", self.root(), self.endpoint(type_name)?);
            let resp = self.client.post(&path, &json!({ self.kind.id_field(): id }))?;
            match resp.get("data").cloned().unwrap_or(resp) {
                Value::Object(data) => merge_payload(&mut payload, data),
                Value::Null => {}
                other => {
                    payload.insert(type_name.clone(), other);
                }
            }
        }
        Ok(payload)
    }

    /// Name suggestions for a partial `query`. `field` picks what is
    /// completed (e.g. `company_name`, `job_title`).
    pub fn autocomplete(&self, query: &str, field: &str) -> Result<Value, RemoteError> {
        let path = format!("{}/autocomplete", self.root());
        self.client.get_query(&path, &[("query", query), ("field", field)])
    }

    /// Recent events of `event_types` for the given entity IDs.
    pub fn list_events(&self, ids: &[String], event_types: &[String]) -> Result<Value, RemoteError> {
        let body = json!({
            format!("{}s", self.kind.id_field()): ids,
            "event_types": event_types,
        });
        self.client.post(&format!("{}/events", self.root()), &body)
    }

    /// Subscribe the IDs to `event_types` under `enrollment_key`.
    pub fn enroll_events(
        &self,
        ids: &[String],
        event_types: &[String],
        enrollment_key: &str,
    ) -> Result<Value, RemoteError> {
        let body = json!({
            format!("{}s", self.kind.id_field()): ids,
            "event_types": event_types,
            "enrollment_key": enrollment_key,
        });
        self.client.post(&format!("{}/events/enrollments", self.root()), &body)
    }

    pub fn list_enrollments(&self) -> Result<Value, RemoteError> {
        self.client.get(&format!("{}/events/enrollments", self.root()))
    }

    /// Companies similar to `business_id`.
    pub fn lookalike(&self, business_id: &str) -> Result<Value, RemoteError> {
        self.client.post("/businesses/lookalikes/enrich", &json!({ "business_id": business_id }))
    }

    /// Which of `keywords` appear on the company's website.
    pub fn website_keywords(&self, business_id: &str, keywords: &[String]) -> Result<Value, RemoteError> {
        self.client.post(
            "/businesses/company_website_keywords/enrich",
            &json!({ "business_id": business_id, "parameters": { "keywords": keywords } }),
        )
    }

    /// Aggregated prospect counts at the given companies, optionally grouped.
    pub fn prospect_statistics(
        &self,
        business_ids: &[String],
        group_by: &[String],
    ) -> Result<Value, RemoteError> {
        let mut body = json!({ "filters": { "business_ids": business_ids } });
        if !group_by.is_empty() {
            body["group_by"] = json!(group_by);
        }
        self.client.post("/prospects/statistics", &body)
    }
}

impl Matcher for EntityApi {
    fn max_batch_size(&self) -> usize {
        self.match_batch_size
    }

    fn match_batch(&self, batch: &[&MatchDescriptor]) -> Result<Vec<Vec<MatchCandidate>>, RemoteError> {
        let plural = self.kind.plural();
        let params: Vec<Value> = batch.iter().map(|d| self.match_params(d)).collect();
        let resp = self
            .client
            .post(&format!("/{plural}/match"), &json!({ format!("{plural}_to_match"): params }))?;
        Ok(parse_match_rows(&resp, &format!("matched_{plural}"), self.kind.id_field()))
    }
}

impl Enricher for EntityApi {
    /// `POST /{plural}/{endpoint}/bulk_enrich` for one type.
    fn bulk_enrich(&self, ids: &[String], type_name: &str) -> Result<Vec<IdResult>, RemoteError> {
        let path = format!("{}/{}/bulk_enrich", self.root(), self.endpoint(type_name)?);
        let ids_key = format!("{}s", self.kind.id_field());
        let resp = self.client.post(&path, &json!({ ids_key: ids }))?;
        Ok(parse_bulk(&resp, self.kind.id_field(), ids))
    }

    fn label(&self) -> &str {
        self.kind.plural()
    }
}

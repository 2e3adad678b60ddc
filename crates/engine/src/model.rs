use serde::Serialize;

/// Enrichment payload: the provider's fields for one entity.
pub type Payload = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Business,
    Prospect,
}

impl EntityKind {
    /// Column / field carrying the provider ID.
    pub fn id_field(self) -> &'static str {
        match self {
            Self::Business => "business_id",
            Self::Prospect => "prospect_id",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Business => "businesses",
            Self::Prospect => "prospects",
        }
    }
}

/// One input row: ordered column name → value pairs, as read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub columns: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// Case-insensitive lookup by column name. First match wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|(k, _)| k.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Canonical identifying fields for one entity to resolve.
///
/// Business descriptors use `name`, `domain` and `linkedin_url`. Prospect
/// descriptors use the person fields plus `company_name`, `email` and
/// `linkedin_url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDescriptor {
    pub source_index: usize,
    pub kind: EntityKind,
    /// Provider ID already present on the input row; skips remote matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl MatchDescriptor {
    pub fn new(kind: EntityKind, source_index: usize) -> Self {
        Self {
            source_index,
            kind,
            existing_id: None,
            name: None,
            domain: None,
            linkedin_url: None,
            first_name: None,
            last_name: None,
            full_name: None,
            email: None,
            company_name: None,
        }
    }

    /// Person name: `full_name`, else first and last joined.
    pub fn person_name(&self) -> Option<String> {
        if let Some(full) = &self.full_name {
            return Some(full.clone());
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Email or LinkedIn: enough on its own to identify a person.
    pub fn has_strong_identifier(&self) -> bool {
        self.email.is_some() || self.linkedin_url.is_some()
    }

    /// Reject descriptors that carry only weak identifiers.
    pub fn validate(&self) -> Result<(), String> {
        if self.existing_id.is_some() {
            return Ok(());
        }
        match self.kind {
            EntityKind::Business => {
                if self.name.is_some() || self.domain.is_some() || self.linkedin_url.is_some() {
                    Ok(())
                } else {
                    Err("needs a name, domain or LinkedIn URL".to_string())
                }
            }
            EntityKind::Prospect => {
                if self.has_strong_identifier() {
                    return Ok(());
                }
                match (self.person_name(), &self.company_name) {
                    (Some(_), Some(_)) => Ok(()),
                    (Some(_), None) => {
                        Err("a name alone is ambiguous; add company, email or LinkedIn".to_string())
                    }
                    (None, Some(_)) => Err("a company name needs a person name".to_string()),
                    (None, None) => {
                        Err("needs an email, LinkedIn URL, or name plus company".to_string())
                    }
                }
            }
        }
    }
}

/// One candidate returned by the remote matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub id: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Resolved { id: String, confidence: f64 },
    /// Top candidates (at most three, best first) for suggestion display.
    BelowThreshold { candidates: Vec<MatchCandidate> },
    NoCandidates,
    InvalidDescriptor { reason: String },
    /// The batch carrying this descriptor failed after retries.
    Failed { reason: String },
}

impl MatchOutcome {
    pub fn resolved_id(&self) -> Option<&str> {
        match self {
            Self::Resolved { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// An ID to enrich, tied back to its input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub source_index: usize,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub code: String,
    pub message: String,
}

impl ItemError {
    pub const NOT_FOUND: &'static str = "not_found";
    pub const CHUNK_FAILED: &'static str = "chunk_failed";
    pub const CANCELLED: &'static str = "cancelled";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(id: &str) -> Self {
        Self::new(Self::NOT_FOUND, format!("no data returned for {id}"))
    }

    pub fn chunk_failed(message: impl Into<String>) -> Self {
        Self::new(Self::CHUNK_FAILED, message)
    }

    pub fn cancelled() -> Self {
        Self::new(Self::CANCELLED, "run cancelled before this item was enriched")
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Per-item result of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentItem {
    pub source_index: usize,
    pub id: String,
    pub result: Result<Payload, ItemError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prospect() -> MatchDescriptor {
        MatchDescriptor::new(EntityKind::Prospect, 0)
    }

    #[test]
    fn raw_row_lookup_ignores_case_and_padding() {
        let row = RawRow::new(vec![
            (" Company_Name ".into(), "Acme".into()),
            ("company_name".into(), "Second".into()),
        ]);
        assert_eq!(row.get("company_name"), Some("Acme"));
        assert_eq!(row.get("domain"), None);
    }

    #[test]
    fn business_needs_any_identifier() {
        let mut d = MatchDescriptor::new(EntityKind::Business, 0);
        assert!(d.validate().is_err());
        d.domain = Some("acme.com".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn prospect_name_alone_is_weak() {
        let mut d = prospect();
        d.full_name = Some("Jane Doe".into());
        assert!(d.validate().is_err());
        d.company_name = Some("Acme".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn prospect_company_alone_is_weak() {
        let mut d = prospect();
        d.company_name = Some("Acme".into());
        assert!(d.validate().is_err());
    }

    #[test]
    fn prospect_email_is_strong() {
        let mut d = prospect();
        d.email = Some("jane@acme.com".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn existing_id_is_always_valid() {
        let mut d = prospect();
        d.existing_id = Some("p-1".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn person_name_joins_parts() {
        let mut d = prospect();
        d.first_name = Some("Jane".into());
        assert_eq!(d.person_name().as_deref(), Some("Jane"));
        d.last_name = Some("Doe".into());
        assert_eq!(d.person_name().as_deref(), Some("Jane Doe"));
        d.full_name = Some("J. Doe".into());
        assert_eq!(d.person_name().as_deref(), Some("J. Doe"));
    }
}
